use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// One entry of the bridge's bounded message log.
#[derive(Clone, Debug, Serialize)]
pub struct MessageRecord {
    pub topic: String,
    pub data: Value,
    pub timestamp: OffsetDateTime,
}

/// Typed view of a device heartbeat. Fields the firmware omits fall back
/// to the wire defaults: identity fields keep their previous value on the
/// device record, telemetry fields overwrite with zero.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct HeartbeatPayload {
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub firmware: Option<String>,
    #[serde(default)]
    pub uptime: u64,
    #[serde(default)]
    pub rssi: i32,
    #[serde(default)]
    pub free_heap: u64,
}
