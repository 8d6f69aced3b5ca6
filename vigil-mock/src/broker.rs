use std::error::Error;
use std::sync::{Arc, Mutex};
use std::thread;

use rumqttd::local::{LinkRx, LinkTx};
use rumqttd::{Broker, Config};

/// Embedded MQTT broker for local development. Configured through the same
/// TOML shape rumqttd ships, with the listener address filled in.
pub struct MockBroker {
    broker: Arc<Mutex<Broker>>,
}

impl MockBroker {
    pub fn new(host: &str, port: u16) -> Result<Self, Box<dyn Error>> {
        let config: Config = toml::from_str(&format!(
            r#"
            id = 0

            [router]
            max_connections = 10010
            max_outgoing_packet_count = 200
            max_segment_size = 104857600
            max_segment_count = 10

            [v4.1]
            name = "v4-1"
            listen = "{host}:{port}"
            next_connection_delay_ms = 10

            [v4.1.connections]
            connection_timeout_ms = 60000
            max_payload_size = 20480
            max_inflight_count = 100
            dynamic_filters = true
            "#
        ))?;

        Ok(Self {
            broker: Arc::new(Mutex::new(Broker::new(config))),
        })
    }

    /// Run the broker on its own thread. Call after every needed
    /// [`MockBroker::link`], the router lock is held for the process lifetime.
    pub fn start(&self) {
        let broker = Arc::clone(&self.broker);

        thread::spawn(move || {
            if let Err(e) = broker.lock().unwrap().start() {
                tracing::error!("broker stopped: {e}");
            }
        });
    }

    /// Open an in-process link subscribed to the given filters.
    pub fn link(&self, filters: &[&str]) -> Result<(LinkTx, LinkRx), Box<dyn Error>> {
        let (mut link_tx, link_rx) = self.broker.lock().unwrap().link("vigil-mock")?;
        for filter in filters {
            link_tx.subscribe(*filter)?;
        }

        Ok((link_tx, link_rx))
    }
}
