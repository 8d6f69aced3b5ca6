mod settings;

pub use settings::{Broker, Logger, Presence, Settings};
