use std::time::Duration;

use thiserror::Error;

/// Failures from the camera, recognizer and recorder collaborators.
/// All of these are absorbed by the presence loop; none are fatal.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("camera error: {0}")]
    Camera(String),

    #[error("face recognition error: {0}")]
    Recognition(String),

    #[error("recorder error: {0}")]
    Recorder(String),

    #[error("{0} timed out after {1:?}")]
    Timeout(&'static str, Duration),
}
