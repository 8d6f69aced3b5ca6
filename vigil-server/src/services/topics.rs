use rumqttc::QoS;

/// Wire contract shared with the ESP32 firmware: all topics live under a
/// fixed prefix, payloads are UTF-8 JSON objects.
pub const TOPIC_PREFIX: &str = "vision-ai/";

// Server node topics.
pub const TOPIC_JARVIS_CMD: &str = "vision-ai/jarvis/cmd";
pub const TOPIC_JARVIS_STATE: &str = "vision-ai/jarvis/state";
pub const TOPIC_JARVIS_EVENT: &str = "vision-ai/jarvis/event";
pub const TOPIC_JARVIS_DOOR: &str = "vision-ai/jarvis/door";
pub const TOPIC_JARVIS_MOTION: &str = "vision-ai/jarvis/motion";
pub const TOPIC_JARVIS_RELAY: &str = "vision-ai/jarvis/relay";
pub const TOPIC_JARVIS_SENSOR: &str = "vision-ai/jarvis/sensor";
pub const TOPIC_JARVIS_ALERT: &str = "vision-ai/jarvis/alert";
pub const TOPIC_JARVIS_LOCK: &str = "vision-ai/jarvis/lock";
pub const TOPIC_JARVIS_SCHED: &str = "vision-ai/jarvis/schedule";
pub const TOPIC_JARVIS_HEARTBEAT: &str = "vision-ai/jarvis/heartbeat";

// Camera node topics.
pub const TOPIC_CAM_STATUS: &str = "vision-ai/camera/status";
pub const TOPIC_CAM_MOTION: &str = "vision-ai/camera/motion";
pub const TOPIC_CAM_FACE: &str = "vision-ai/camera/face";
pub const TOPIC_JARVIS_CAM_CMD: &str = "vision-ai/jarvis/camera/cmd";
pub const TOPIC_JARVIS_CAM_EVENT: &str = "vision-ai/jarvis/camera/event";
pub const TOPIC_JARVIS_CAM_PERSON: &str = "vision-ai/jarvis/camera/person";
pub const TOPIC_JARVIS_CAM_ALERT: &str = "vision-ai/jarvis/camera/alert";
pub const TOPIC_JARVIS_CAM_HEARTBEAT: &str = "vision-ai/jarvis/camera/heartbeat";
pub const TOPIC_JARVIS_INTRUDER: &str = "vision-ai/jarvis/intruder";
pub const TOPIC_JARVIS_FACE_ID: &str = "vision-ai/jarvis/face/identified";
pub const TOPIC_JARVIS_PATROL: &str = "vision-ai/jarvis/patrol";
pub const TOPIC_AI_INFERENCE: &str = "vision-ai/ai/inference";

/// Full subscription list. Everything rides QoS 1 except the high-volume
/// inference stream.
pub fn subscriptions() -> Vec<(&'static str, QoS)> {
    vec![
        (TOPIC_JARVIS_EVENT, QoS::AtLeastOnce),
        (TOPIC_JARVIS_DOOR, QoS::AtLeastOnce),
        (TOPIC_JARVIS_MOTION, QoS::AtLeastOnce),
        (TOPIC_JARVIS_RELAY, QoS::AtLeastOnce),
        (TOPIC_JARVIS_SENSOR, QoS::AtLeastOnce),
        (TOPIC_JARVIS_ALERT, QoS::AtLeastOnce),
        (TOPIC_JARVIS_LOCK, QoS::AtLeastOnce),
        (TOPIC_JARVIS_SCHED, QoS::AtLeastOnce),
        (TOPIC_JARVIS_HEARTBEAT, QoS::AtLeastOnce),
        (TOPIC_CAM_STATUS, QoS::AtLeastOnce),
        (TOPIC_CAM_MOTION, QoS::AtLeastOnce),
        (TOPIC_CAM_FACE, QoS::AtLeastOnce),
        (TOPIC_JARVIS_CAM_EVENT, QoS::AtLeastOnce),
        (TOPIC_JARVIS_CAM_PERSON, QoS::AtLeastOnce),
        (TOPIC_JARVIS_CAM_ALERT, QoS::AtLeastOnce),
        (TOPIC_JARVIS_CAM_HEARTBEAT, QoS::AtLeastOnce),
        (TOPIC_JARVIS_INTRUDER, QoS::AtLeastOnce),
        (TOPIC_JARVIS_FACE_ID, QoS::AtLeastOnce),
        (TOPIC_JARVIS_PATROL, QoS::AtLeastOnce),
        (TOPIC_AI_INFERENCE, QoS::AtMostOnce),
    ]
}

/// Routing category resolved by exact topic match at the deserialization
/// boundary. Topics that are subscribed but carry no bridge-side behavior
/// (schedule, camera event/face/alert) resolve to `None` and only hit the
/// message log, matching the firmware contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    ServerHeartbeat,
    CameraHeartbeat,
    Door,
    Intruder,
    Person,
    FaceIdentified,
    Alert,
    Lock,
    Motion,
    Relay,
    Sensor,
    Patrol,
    GenericEvent,
    Inference,
    CameraStatus,
}

impl Route {
    pub fn of(topic: &str) -> Option<Self> {
        match topic {
            TOPIC_JARVIS_HEARTBEAT => Some(Self::ServerHeartbeat),
            TOPIC_JARVIS_CAM_HEARTBEAT => Some(Self::CameraHeartbeat),
            TOPIC_JARVIS_DOOR => Some(Self::Door),
            TOPIC_JARVIS_INTRUDER => Some(Self::Intruder),
            TOPIC_JARVIS_CAM_PERSON => Some(Self::Person),
            TOPIC_JARVIS_FACE_ID => Some(Self::FaceIdentified),
            TOPIC_JARVIS_ALERT => Some(Self::Alert),
            TOPIC_JARVIS_LOCK => Some(Self::Lock),
            TOPIC_JARVIS_MOTION | TOPIC_CAM_MOTION => Some(Self::Motion),
            TOPIC_JARVIS_RELAY => Some(Self::Relay),
            TOPIC_JARVIS_SENSOR => Some(Self::Sensor),
            TOPIC_JARVIS_PATROL => Some(Self::Patrol),
            TOPIC_JARVIS_EVENT => Some(Self::GenericEvent),
            TOPIC_AI_INFERENCE => Some(Self::Inference),
            TOPIC_CAM_STATUS => Some(Self::CameraStatus),
            _ => None,
        }
    }
}
