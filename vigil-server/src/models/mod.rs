mod device;
mod message;
mod presence;

pub use device::*;
pub use message::*;
pub use presence::*;
