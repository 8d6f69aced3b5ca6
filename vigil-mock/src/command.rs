use std::error::Error;

use rumqttd::Notification;
use rumqttd::local::LinkTx;
use serde_json::{Value, from_slice};
use tokio::sync::mpsc;

use vigil_server::services::{TOPIC_JARVIS_CAM_CMD, TOPIC_JARVIS_CMD};

use crate::broker::MockBroker;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    Server,
    Camera,
}

/// A decoded command envelope picked off one of the command topics.
#[derive(Debug)]
pub struct CommandMessage {
    pub target: Target,
    pub command: String,
    pub params: Value,
}

pub struct CommandHandler {
    pub cmd_tx: mpsc::Sender<CommandMessage>,
    pub cmd_rx: mpsc::Receiver<CommandMessage>,
}

impl CommandHandler {
    pub fn new() -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        CommandHandler { cmd_tx, cmd_rx }
    }

    /// Link into the broker, start it, and feed decoded commands into
    /// `cmd_rx` so the fleet loop can acknowledge them.
    pub fn start_command_processor(
        &self,
        broker: &MockBroker,
    ) -> Result<LinkTx, Box<dyn Error>> {
        let (link_tx, mut link_rx) = broker.link(&[TOPIC_JARVIS_CMD, TOPIC_JARVIS_CAM_CMD])?;
        broker.start();

        tokio::spawn({
            let cmd_tx_owned = self.cmd_tx.to_owned();
            async move {
                loop {
                    let notification = match link_rx.recv().unwrap() {
                        Some(v) => v,
                        None => continue,
                    };

                    match notification {
                        Notification::Forward(forward) => {
                            let target = if forward.publish.topic.as_ref()
                                == TOPIC_JARVIS_CAM_CMD.as_bytes()
                            {
                                Target::Camera
                            } else {
                                Target::Server
                            };

                            if let Ok(params) = from_slice::<Value>(&forward.publish.payload) {
                                let command = params
                                    .get("command")
                                    .and_then(Value::as_str)
                                    .unwrap_or("unknown")
                                    .to_string();
                                tracing::debug!("Receive: {target:?} {command} {params}");

                                cmd_tx_owned
                                    .send(CommandMessage { target, command, params })
                                    .await
                                    .unwrap();
                            }
                        }
                        v => tracing::debug!("{v:?}"),
                    }
                }
            }
        });

        Ok(link_tx)
    }
}
