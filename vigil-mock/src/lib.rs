use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rumqttd::local::LinkTx;
use serde_json::{Value, json, to_vec};
use time::OffsetDateTime;

use vigil_server::services::{
    TOPIC_CAM_MOTION, TOPIC_JARVIS_CAM_EVENT, TOPIC_JARVIS_CAM_HEARTBEAT, TOPIC_JARVIS_DOOR,
    TOPIC_JARVIS_HEARTBEAT, TOPIC_JARVIS_LOCK, TOPIC_JARVIS_PATROL, TOPIC_JARVIS_RELAY,
    TOPIC_JARVIS_SENSOR,
};

use crate::broker::MockBroker;
use crate::command::{CommandHandler, CommandMessage, Target};
use crate::settings::Settings;
use crate::simulate::{SimulatedDevice, motion_probability};

mod broker;
mod command;
pub mod settings;
mod simulate;

pub async fn run(settings: &Arc<Settings>) {
    let fleet = settings.fleet.clone();

    let broker = MockBroker::new(&settings.broker.host, settings.broker.port)
        .expect("Fail to create broker");
    let mut command_handler = CommandHandler::new();
    let mut link_tx = command_handler
        .start_command_processor(&broker)
        .expect("Fail to link into broker");

    let mut server = SimulatedDevice::new(&fleet.server_id, "192.168.1.40", "3.1.0");
    let mut camera = SimulatedDevice::new(&fleet.camera_id, "192.168.1.41", "2.4.7");
    let mut door_open = false;

    let mut heartbeat = tokio::time::interval(Duration::from_secs(fleet.heartbeat_interval_secs));
    let mut activity = tokio::time::interval(Duration::from_secs(fleet.activity_interval_secs));

    loop {
        tokio::select! {
            Some(command) = command_handler.cmd_rx.recv() => {
                if let Err(e) = acknowledge(&mut link_tx, command) {
                    tracing::error!("command acknowledge failed: {e}");
                }
            }
            _ = heartbeat.tick() => {
                let result = publish_message(
                    &mut link_tx,
                    TOPIC_JARVIS_HEARTBEAT,
                    server.heartbeat(fleet.heartbeat_interval_secs),
                )
                .and_then(|()| {
                    publish_message(
                        &mut link_tx,
                        TOPIC_JARVIS_CAM_HEARTBEAT,
                        camera.heartbeat(fleet.heartbeat_interval_secs),
                    )
                });
                if let Err(e) = result {
                    tracing::error!("heartbeat publish failed: {e}");
                }
            }
            _ = activity.tick() => {
                if let Err(e) = publish_activity(&mut link_tx, &mut door_open) {
                    tracing::error!("activity publish failed: {e}");
                }
            }
        }
    }
}

/// Random household activity: motion during the day, the odd door swing,
/// and an occasional environment sample.
fn publish_activity(
    client: &mut LinkTx,
    door_open: &mut bool,
) -> Result<(), Box<dyn Error>> {
    let now = OffsetDateTime::now_utc();
    let seconds_since_midnight = u64::from(now.time().hour()) * 3600
        + u64::from(now.time().minute()) * 60
        + u64::from(now.time().second());
    let day_fraction = seconds_since_midnight as f64 / 86400.0;

    let mut rng = rand::rng();

    if rng.random::<f64>() < motion_probability(day_fraction) {
        publish_message(client, TOPIC_CAM_MOTION, json!({ "pir": true }))?;
    }

    if rng.random::<f64>() < 0.05 {
        *door_open = !*door_open;
        let state = if *door_open { "open" } else { "closed" };
        publish_message(client, TOPIC_JARVIS_DOOR, json!({ "state": state }))?;
    }

    if rng.random::<f64>() < 0.2 {
        publish_message(
            client,
            TOPIC_JARVIS_SENSOR,
            json!({
                "temp": ((20.0 + rng.random_range(-2.0..2.0_f64)) * 10.0).round() / 10.0,
                "humidity": rng.random_range(40..60),
            }),
        )?;
    }

    Ok(())
}

/// Answer a bridge command the way the firmware would.
fn acknowledge(client: &mut LinkTx, command: CommandMessage) -> Result<(), Box<dyn Error>> {
    let CommandMessage { target, command, params } = command;

    match (target, command.as_str()) {
        (Target::Server, "relay") => publish_message(
            client,
            TOPIC_JARVIS_RELAY,
            json!({
                "relay": params.get("relay").cloned().unwrap_or(Value::Null),
                "state": params.get("state").cloned().unwrap_or(Value::Null),
            }),
        ),
        (Target::Server, "lock") => {
            publish_message(client, TOPIC_JARVIS_LOCK, json!({ "state": "locked" }))
        }
        (Target::Server, "unlock") => {
            publish_message(client, TOPIC_JARVIS_LOCK, json!({ "state": "unlocked" }))
        }
        (Target::Camera, "capture") => publish_message(
            client,
            TOPIC_JARVIS_CAM_EVENT,
            json!({
                "event": "capture_done",
                "context": params.get("context").cloned().unwrap_or(Value::Null),
            }),
        ),
        (Target::Camera, "patrol_start") => {
            publish_message(client, TOPIC_JARVIS_PATROL, json!({ "state": "started" }))
        }
        (Target::Camera, "patrol_stop") => {
            publish_message(client, TOPIC_JARVIS_PATROL, json!({ "state": "stopped" }))
        }
        (target, other) => {
            tracing::debug!("unacknowledged command for {target:?}: {other}");
            Ok(())
        }
    }
}

fn publish_message(
    client: &mut LinkTx,
    topic: &str,
    payload: Value,
) -> Result<(), Box<dyn Error>> {
    tracing::debug!("Send: {topic} {payload}");
    client.publish(topic.to_string(), to_vec(&payload)?)?;

    Ok(())
}
