use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Duration, OffsetDateTime};

/// Heartbeats older than this mark a device offline, roughly three missed
/// beats at the firmware's 15s interval.
pub const STALE_THRESHOLD: Duration = Duration::seconds(45);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Server,
    Camera,
    Unknown,
}

/// Last-known state of a connected ESP32 device, keyed by `device_id`.
/// The stored `online` flag is what the device last reported; effective
/// liveness is derived at query time via [`DeviceState::snapshot`].
#[derive(Clone, Debug, Serialize)]
pub struct DeviceState {
    pub device_id: String,
    pub kind: DeviceKind,
    pub ip: String,
    pub firmware: String,
    pub online: bool,
    pub last_heartbeat: Option<OffsetDateTime>,
    pub uptime: u64,
    pub rssi: i32,
    pub free_heap: u64,
    pub data: Value,
}

impl DeviceState {
    pub fn new(device_id: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            device_id: device_id.into(),
            kind,
            ip: String::new(),
            firmware: String::new(),
            online: false,
            last_heartbeat: None,
            uptime: 0,
            rssi: 0,
            free_heap: 0,
            data: Value::Null,
        }
    }

    pub fn is_stale(&self, now: OffsetDateTime) -> bool {
        match self.last_heartbeat {
            Some(at) => now - at > STALE_THRESHOLD,
            None => true,
        }
    }

    pub fn snapshot(&self, now: OffsetDateTime) -> DeviceSnapshot {
        DeviceSnapshot {
            device_id: self.device_id.clone(),
            kind: self.kind,
            online: self.online && !self.is_stale(now),
            ip: self.ip.clone(),
            firmware: self.firmware.clone(),
            uptime: self.uptime,
            rssi: self.rssi,
            free_heap: self.free_heap,
            last_heartbeat: self.last_heartbeat,
            data: self.data.clone(),
        }
    }
}

/// Query-time view of a device with liveness already derived.
#[derive(Clone, Debug, Serialize)]
pub struct DeviceSnapshot {
    pub device_id: String,
    pub kind: DeviceKind,
    pub online: bool,
    pub ip: String,
    pub firmware: String,
    pub uptime: u64,
    pub rssi: i32,
    pub free_heap: u64,
    pub last_heartbeat: Option<OffsetDateTime>,
    pub data: Value,
}
