use std::sync::{Arc, Mutex};

use time::macros::datetime;

use vigil_server::models::{FaceRole, PresenceState, RecognizedFace};
use vigil_server::services::mock::{MockRecorder, ScriptedVision};
use vigil_server::services::{PresenceConfig, PresenceEvent, PresenceMonitor};

fn owner() -> RecognizedFace {
    RecognizedFace::new(FaceRole::Owner, "Alice", 0.96)
}

fn unknown() -> RecognizedFace {
    RecognizedFace::new(FaceRole::Unknown, "Unknown", 0.38)
}

#[tokio::test]
async fn test_intruder_then_owner_arrival_clears_the_alarm() {
    let vision = Arc::new(ScriptedVision::default());
    let recorder = Arc::new(MockRecorder::default());
    let mut monitor = PresenceMonitor::new(
        PresenceConfig::default(),
        vision.clone(),
        vision.clone(),
        recorder.clone(),
    );

    let events = Arc::new(Mutex::new(Vec::new()));
    for name in ["owner_entered", "intruder_detected", "presence_changed"] {
        let events = events.clone();
        monitor
            .on(name, move |event: &PresenceEvent| {
                events.lock().unwrap().push(event.clone());
                Ok(())
            })
            .await;
    }

    let start = datetime!(2024-06-10 20:00:00 UTC);
    let script = [
        vec![unknown()],
        vec![unknown()],
        vec![unknown()],
        vec![owner()],
        vec![owner()],
        vec![owner()],
    ];
    for (i, faces) in script.into_iter().enumerate() {
        vision.push(Some(faces));
        monitor
            .tick(start + time::Duration::seconds(i as i64))
            .await
            .unwrap();
    }

    let state = monitor.state();
    assert_eq!(state.presence, PresenceState::OwnerPresent);
    assert!(state.owner_detected);
    assert!(!state.intruder_active);
    assert_eq!(state.owner_name.as_deref(), Some("Alice"));

    // One intruder while the room was unattended, recorded and then closed
    // out when the owner arrived.
    assert_eq!(monitor.intruder_count(), 1);
    assert_eq!(recorder.start_count(), 1);
    assert_eq!(recorder.stop_count(), 1);
    assert_eq!(vision.snapshot_count(), 1);

    let names: Vec<&str> = {
        let events = events.lock().unwrap();
        events.iter().map(PresenceEvent::name).collect()
    };
    assert_eq!(
        names,
        vec![
            "intruder_detected",
            "presence_changed",
            "owner_entered",
            "presence_changed",
        ]
    );
}

#[tokio::test]
async fn test_failing_handler_does_not_break_monitoring() {
    let vision = Arc::new(ScriptedVision::default());
    let recorder = Arc::new(MockRecorder::default());
    let mut monitor = PresenceMonitor::new(
        PresenceConfig::default(),
        vision.clone(),
        vision.clone(),
        recorder,
    );

    monitor
        .on("owner_entered", |_: &PresenceEvent| Err("greeting speaker offline".into()))
        .await;
    let greeted = Arc::new(Mutex::new(0u32));
    let greeted_clone = greeted.clone();
    monitor
        .on("owner_entered", move |_: &PresenceEvent| {
            *greeted_clone.lock().unwrap() += 1;
            Ok(())
        })
        .await;

    let start = datetime!(2024-06-10 08:00:00 UTC);
    for i in 0..3 {
        vision.push(Some(vec![owner()]));
        monitor
            .tick(start + time::Duration::seconds(i))
            .await
            .unwrap();
    }

    assert_eq!(monitor.state().presence, PresenceState::OwnerPresent);
    assert_eq!(*greeted.lock().unwrap(), 1);
    assert_eq!(monitor.events().errors(), 1);
}
