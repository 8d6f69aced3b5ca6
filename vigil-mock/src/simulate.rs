use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde_json::{Value, json};

/// Wi-Fi signal strength around a per-device baseline, clamped to the range
/// ESP32 firmware actually reports.
pub fn simulated_rssi(base: f64) -> i32 {
    let noise = Normal::new(0.0, 2.5)
        .map(|normal| normal.sample(&mut rand::rng()))
        .unwrap_or(0.0);

    (base + noise).round().clamp(-90.0, -30.0) as i32
}

/// Free heap with a slow sawtooth leak. The firmware reboots itself roughly
/// daily, which resets the counter.
pub fn simulated_free_heap(uptime_secs: u64) -> u64 {
    const BOOT_HEAP: u64 = 180_000;
    const LEAK_PER_SEC: u64 = 2;

    let leaked = (uptime_secs % 86_400) * LEAK_PER_SEC;
    let jitter = rand::rng().random_range(0..2_000);

    BOOT_HEAP.saturating_sub(leaked) + jitter
}

/// Per-activity-tick probability of a motion event. Quiet overnight, busy
/// through the day.
pub fn motion_probability(day_fraction: f64) -> f64 {
    if (0.3..=0.9).contains(&day_fraction) {
        0.25
    } else {
        0.02
    }
}

/// One fake ESP32 node publishing heartbeats.
pub struct SimulatedDevice {
    device_id: String,
    ip: String,
    firmware: String,
    rssi_base: f64,
    uptime_secs: u64,
}

impl SimulatedDevice {
    pub fn new(device_id: &str, ip: &str, firmware: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            ip: ip.to_string(),
            firmware: firmware.to_string(),
            rssi_base: rand::rng().random_range(-70.0..-50.0),
            uptime_secs: 0,
        }
    }

    /// Advance the device clock by one beat and build the payload.
    pub fn heartbeat(&mut self, interval_secs: u64) -> Value {
        self.uptime_secs += interval_secs;

        json!({
            "device": self.device_id,
            "ip": self.ip,
            "firmware": self.firmware,
            "uptime": self.uptime_secs,
            "rssi": simulated_rssi(self.rssi_base),
            "free_heap": simulated_free_heap(self.uptime_secs),
        })
    }
}
