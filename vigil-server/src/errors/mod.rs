pub mod bridge;
pub mod vision;

pub use bridge::BridgeError;
pub use vision::VisionError;
