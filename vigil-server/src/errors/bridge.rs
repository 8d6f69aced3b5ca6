use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("not connected to mqtt broker")]
    NotConnected,

    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("mqtt client error: {0}")]
    Client(#[from] rumqttc::ClientError),
}
