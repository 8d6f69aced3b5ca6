use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use tokio::sync::{Mutex, watch};
use tokio::time::timeout;

use crate::configs;
use crate::errors::VisionError;
use crate::models::{FaceRole, IntruderRecord, PresenceState, RecognizedFace, RoomState};
use crate::services::event_registry::HandlerRegistry;
use crate::services::vision::{FaceRecognizer, Frame, FrameSource, Recorder};

const VIDEO_STAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day]_[hour][minute][second]");

/// Faces the recognizer could not match are reported under this name.
const UNKNOWN_NAME: &str = "Unknown";

#[derive(Clone, Debug)]
pub struct PresenceConfig {
    pub owner_name: String,
    pub detection_interval: Duration,
    pub stability_count: u32,
    pub greeting_cooldown: time::Duration,
    pub collaborator_timeout: Duration,
    pub intruder_dir: PathBuf,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            owner_name: String::from("Owner"),
            detection_interval: Duration::from_secs(1),
            stability_count: 3,
            greeting_cooldown: time::Duration::seconds(1800),
            collaborator_timeout: Duration::from_secs(5),
            intruder_dir: PathBuf::from("recordings/intruders"),
        }
    }
}

impl From<&configs::Presence> for PresenceConfig {
    fn from(presence: &configs::Presence) -> Self {
        Self {
            owner_name: presence.owner_name.clone(),
            detection_interval: Duration::from_secs(presence.detection_interval_secs),
            stability_count: presence.stability_count,
            greeting_cooldown: time::Duration::seconds(presence.greeting_cooldown_secs as i64),
            collaborator_timeout: Duration::from_secs(presence.collaborator_timeout_secs),
            intruder_dir: PathBuf::from(&presence.intruder_dir),
        }
    }
}

/// Events emitted once per settled transition, keyed by name for the
/// handler registry.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceEvent {
    OwnerEntered {
        name: Option<String>,
        should_greet: bool,
        time: OffsetDateTime,
    },
    OwnerLeft {
        time: OffsetDateTime,
    },
    IntruderDetected {
        photo_path: Option<PathBuf>,
        video_path: Option<PathBuf>,
        num_faces: usize,
        time: OffsetDateTime,
    },
    RoomEmpty {
        time: OffsetDateTime,
    },
    PresenceChanged {
        previous: PresenceState,
        current: PresenceState,
        num_faces: usize,
    },
}

impl PresenceEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::OwnerEntered { .. } => "owner_entered",
            Self::OwnerLeft { .. } => "owner_left",
            Self::IntruderDetected { .. } => "intruder_detected",
            Self::RoomEmpty { .. } => "room_empty",
            Self::PresenceChanged { .. } => "presence_changed",
        }
    }
}

/// Converts the per-frame recognizer output into a debounced occupancy
/// state and fires side-effecting events exactly once per transition.
///
/// Classification priority per tick is empty, then owner, then unknown:
/// a tick containing both the owner and an unknown face counts toward the
/// owner run. This mirrors the deployed detection behavior and is kept
/// pending product review rather than corrected here.
pub struct PresenceMonitor {
    camera: Arc<dyn FrameSource>,
    recognizer: Arc<dyn FaceRecognizer>,
    recorder: Arc<dyn Recorder>,
    registry: Arc<HandlerRegistry<PresenceEvent>>,
    config: PresenceConfig,
    state: RoomState,
    monitoring: bool,
    intruder_records: Vec<IntruderRecord>,
    recording_intruder: bool,
    recording_started: Option<OffsetDateTime>,
    last_greeting: Option<OffsetDateTime>,
    consecutive_empty: u32,
    consecutive_owner: u32,
    consecutive_unknown: u32,
}

impl PresenceMonitor {
    pub fn new(
        config: PresenceConfig,
        camera: Arc<dyn FrameSource>,
        recognizer: Arc<dyn FaceRecognizer>,
        recorder: Arc<dyn Recorder>,
    ) -> Self {
        tracing::info!("room presence monitor initialized");

        Self {
            camera,
            recognizer,
            recorder,
            registry: Arc::new(HandlerRegistry::new()),
            config,
            state: RoomState::default(),
            monitoring: false,
            intruder_records: Vec::new(),
            recording_intruder: false,
            recording_started: None,
            last_greeting: None,
            consecutive_empty: 0,
            consecutive_owner: 0,
            consecutive_unknown: 0,
        }
    }

    /// Register a callback for one of `owner_entered`, `owner_left`,
    /// `intruder_detected`, `room_empty`, `presence_changed`.
    pub async fn on<F>(&self, event: &str, handler: F)
    where
        F: Fn(&PresenceEvent) -> Result<(), crate::services::HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.registry.register(event, handler).await;
    }

    pub fn events(&self) -> Arc<HandlerRegistry<PresenceEvent>> {
        self.registry.clone()
    }

    pub fn state(&self) -> RoomState {
        self.state.clone()
    }

    pub fn intruder_records(&self) -> Vec<IntruderRecord> {
        self.intruder_records.clone()
    }

    pub fn intruder_count(&self) -> usize {
        self.intruder_records.len()
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    /// Fixed-interval monitoring loop. Stops after the in-flight tick once
    /// the stop signal flips.
    pub async fn run(monitor: Arc<Mutex<PresenceMonitor>>, mut stop: watch::Receiver<bool>) {
        let interval = {
            let mut monitor = monitor.lock().await;
            monitor.monitoring = true;
            monitor.config.detection_interval
        };
        let mut ticker = tokio::time::interval(interval);

        tracing::info!("room presence monitoring started");

        loop {
            tokio::select! {
                _ = stop.changed() => break,
                _ = ticker.tick() => {
                    let result = {
                        let mut monitor = monitor.lock().await;
                        monitor.tick(OffsetDateTime::now_utc()).await
                    };
                    if let Err(e) = result {
                        tracing::error!("presence monitor error: {e}");
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        }

        monitor.lock().await.monitoring = false;
        tracing::info!("room presence monitoring stopped");
    }

    /// One detection tick. Upstream failures skip the tick without touching
    /// any counter; the caller logs and retries on the next interval.
    pub async fn tick(&mut self, now: OffsetDateTime) -> Result<(), VisionError> {
        let budget = self.config.collaborator_timeout;

        let frame = timeout(budget, self.camera.latest_frame())
            .await
            .map_err(|_| VisionError::Timeout("frame capture", budget))??;
        let Some(frame) = frame else {
            return Ok(());
        };

        let recognized = timeout(budget, self.recognizer.recognize(&frame))
            .await
            .map_err(|_| VisionError::Timeout("face recognition", budget))??;

        self.evaluate(&frame, &recognized, now).await;

        Ok(())
    }

    async fn evaluate(&mut self, frame: &Frame, faces: &[RecognizedFace], now: OffsetDateTime) {
        let num_faces = faces.len();
        let owner_found = faces.iter().any(|f| f.role == FaceRole::Owner);
        let unknown_found = faces
            .iter()
            .any(|f| f.role != FaceRole::Owner && f.name == UNKNOWN_NAME);

        // Run-length counters. When the owner and an unknown face share a
        // tick the unknown run is left intact rather than reset.
        if num_faces == 0 {
            self.consecutive_empty += 1;
            self.consecutive_owner = 0;
            self.consecutive_unknown = 0;
        } else if owner_found {
            self.consecutive_owner += 1;
            self.consecutive_empty = 0;
            if !unknown_found {
                self.consecutive_unknown = 0;
            }
        } else if unknown_found {
            self.consecutive_unknown += 1;
            self.consecutive_empty = 0;
            self.consecutive_owner = 0;
        }

        let previous = self.state.presence;

        if self.consecutive_empty >= self.config.stability_count {
            if self.state.presence != PresenceState::Empty {
                self.state.presence = PresenceState::Empty;
                self.state.owner_detected = false;
                self.state.num_faces = 0;
                self.state.empty_since = Some(now);
                self.on_room_empty(now).await;
            }
        } else if self.consecutive_owner >= self.config.stability_count {
            self.state.num_faces = num_faces;
            self.state.last_detection_time = Some(now);

            if num_faces > 1 && unknown_found {
                self.state.presence = PresenceState::MultiplePeople;
                self.state.owner_detected = true;
            } else if !self.state.owner_detected {
                self.state.presence = PresenceState::OwnerPresent;
                self.state.owner_detected = true;
                self.state.owner_name = faces
                    .iter()
                    .find(|f| f.role == FaceRole::Owner)
                    .map(|f| f.name.clone())
                    .or_else(|| Some(self.config.owner_name.clone()));
                self.on_owner_entered(now).await;
            }
        } else if self.consecutive_unknown >= self.config.stability_count
            && !self.state.owner_detected
            && self.state.presence != PresenceState::UnknownPerson
        {
            self.state.presence = PresenceState::UnknownPerson;
            self.state.num_faces = num_faces;
            self.state.last_detection_time = Some(now);
            self.state.intruder_active = true;
            self.on_intruder_detected(frame, num_faces, now).await;
        }

        if self.state.presence != previous {
            self.emit(PresenceEvent::PresenceChanged {
                previous,
                current: self.state.presence,
                num_faces,
            })
            .await;
        }
    }

    async fn on_owner_entered(&mut self, now: OffsetDateTime) {
        let should_greet = match self.last_greeting {
            Some(at) => now - at > self.config.greeting_cooldown,
            None => true,
        };

        if self.recording_intruder {
            self.stop_intruder_recording(now).await;
        }
        self.state.intruder_active = false;

        tracing::info!(owner = ?self.state.owner_name, "owner entered the room");
        self.emit(PresenceEvent::OwnerEntered {
            name: self.state.owner_name.clone(),
            should_greet,
            time: now,
        })
        .await;

        if should_greet {
            self.last_greeting = Some(now);
        }
    }

    async fn on_room_empty(&mut self, now: OffsetDateTime) {
        if self.recording_intruder {
            self.stop_intruder_recording(now).await;
        }
        self.state.intruder_active = false;

        tracing::info!("room is now empty");
        self.emit(PresenceEvent::RoomEmpty { time: now }).await;
        self.emit(PresenceEvent::OwnerLeft { time: now }).await;
    }

    async fn on_intruder_detected(
        &mut self,
        frame: &Frame,
        num_faces: usize,
        now: OffsetDateTime,
    ) {
        tracing::warn!("intruder detected in room");

        let budget = self.config.collaborator_timeout;
        let photo_path = match timeout(budget, self.recognizer.capture_snapshot(frame)).await {
            Ok(Ok(path)) => Some(path),
            Ok(Err(e)) => {
                tracing::error!("intruder snapshot failed: {e}");
                None
            }
            Err(_) => {
                tracing::error!("intruder snapshot timed out");
                None
            }
        };

        let video_path = if self.recording_intruder {
            None
        } else {
            self.start_intruder_recording(now).await
        };

        self.intruder_records.push(IntruderRecord {
            timestamp: now,
            photo_path: photo_path.clone().unwrap_or_default(),
            video_path: video_path.clone(),
            duration_seconds: 0.0,
            activity_summary: None,
        });

        self.emit(PresenceEvent::IntruderDetected {
            photo_path,
            video_path,
            num_faces,
            time: now,
        })
        .await;
    }

    async fn start_intruder_recording(&mut self, now: OffsetDateTime) -> Option<PathBuf> {
        let stamp = now
            .format(VIDEO_STAMP)
            .unwrap_or_else(|_| now.unix_timestamp().to_string());
        let path = self.config.intruder_dir.join(format!("intruder_{stamp}.avi"));

        match timeout(
            self.config.collaborator_timeout,
            self.recorder.start_recording(&path),
        )
        .await
        {
            Ok(Ok(actual)) => {
                self.recording_intruder = true;
                self.recording_started = Some(now);
                tracing::info!("started intruder recording: {}", actual.display());
                Some(actual)
            }
            Ok(Err(e)) => {
                tracing::error!("failed to start intruder recording: {e}");
                None
            }
            Err(_) => {
                tracing::error!("intruder recording start timed out");
                None
            }
        }
    }

    async fn stop_intruder_recording(&mut self, now: OffsetDateTime) {
        if !self.recording_intruder {
            return;
        }

        match timeout(
            self.config.collaborator_timeout,
            self.recorder.stop_recording(),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("failed to stop intruder recording: {e}"),
            Err(_) => tracing::error!("intruder recording stop timed out"),
        }

        let duration = self
            .recording_started
            .map(|at| (now - at).as_seconds_f64())
            .unwrap_or(0.0);
        self.recording_intruder = false;
        self.recording_started = None;

        tracing::info!("stopped intruder recording, duration {duration:.1}s");

        if let Some(last) = self.intruder_records.last_mut() {
            last.duration_seconds = duration;
        }
    }

    async fn emit(&self, event: PresenceEvent) {
        self.registry.dispatch(event.name(), &event).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use time::macros::datetime;

    use crate::services::vision::mock::{MockRecorder, ScriptedVision};

    use super::*;

    fn owner() -> RecognizedFace {
        RecognizedFace::new(FaceRole::Owner, "Alice", 0.97)
    }

    fn unknown() -> RecognizedFace {
        RecognizedFace::new(FaceRole::Unknown, "Unknown", 0.42)
    }

    fn setup() -> (PresenceMonitor, Arc<ScriptedVision>, Arc<MockRecorder>) {
        let vision = Arc::new(ScriptedVision::default());
        let recorder = Arc::new(MockRecorder::default());
        let monitor = PresenceMonitor::new(
            PresenceConfig::default(),
            vision.clone(),
            vision.clone(),
            recorder.clone(),
        );
        (monitor, vision, recorder)
    }

    async fn capture(monitor: &PresenceMonitor, event: &str) -> Arc<StdMutex<Vec<PresenceEvent>>> {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let seen_clone = seen.clone();
        monitor
            .on(event, move |event: &PresenceEvent| {
                seen_clone.lock().unwrap().push(event.clone());
                Ok(())
            })
            .await;
        seen
    }

    /// Feeds one scripted tick per entry, 1s apart starting at `start`.
    async fn drive(
        monitor: &mut PresenceMonitor,
        vision: &ScriptedVision,
        start: OffsetDateTime,
        ticks: Vec<Option<Vec<RecognizedFace>>>,
    ) {
        for (i, tick) in ticks.into_iter().enumerate() {
            vision.push(tick);
            monitor
                .tick(start + time::Duration::seconds(i as i64))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_single_anomalous_tick_does_not_transition() {
        let (mut monitor, vision, _) = setup();
        let changed = capture(&monitor, "presence_changed").await;
        let intruders = capture(&monitor, "intruder_detected").await;

        // Two unknown ticks, an empty frame resetting the run, two more.
        drive(
            &mut monitor,
            &vision,
            datetime!(2024-05-01 12:00:00 UTC),
            vec![
                Some(vec![unknown()]),
                Some(vec![unknown()]),
                Some(vec![]),
                Some(vec![unknown()]),
                Some(vec![unknown()]),
            ],
        )
        .await;

        assert_eq!(monitor.state().presence, PresenceState::Empty);
        assert!(changed.lock().unwrap().is_empty());
        assert!(intruders.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_frame_skips_tick_without_resetting_run() {
        let (mut monitor, vision, _) = setup();
        let intruders = capture(&monitor, "intruder_detected").await;

        drive(
            &mut monitor,
            &vision,
            datetime!(2024-05-01 12:00:00 UTC),
            vec![
                Some(vec![unknown()]),
                Some(vec![unknown()]),
                None,
                Some(vec![unknown()]),
            ],
        )
        .await;

        assert_eq!(monitor.state().presence, PresenceState::UnknownPerson);
        assert_eq!(intruders.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_presence_changed_fires_once_per_settled_transition() {
        let (mut monitor, vision, _) = setup();
        let changed = capture(&monitor, "presence_changed").await;
        let intruders = capture(&monitor, "intruder_detected").await;

        drive(
            &mut monitor,
            &vision,
            datetime!(2024-05-01 12:00:00 UTC),
            vec![Some(vec![unknown()]); 8],
        )
        .await;

        assert_eq!(monitor.state().presence, PresenceState::UnknownPerson);
        assert_eq!(changed.lock().unwrap().len(), 1);
        assert_eq!(intruders.lock().unwrap().len(), 1);
        assert_eq!(monitor.intruder_count(), 1);
    }

    #[tokio::test]
    async fn test_greeting_cooldown_suppresses_second_greeting() {
        let (mut monitor, vision, _) = setup();
        let entries = capture(&monitor, "owner_entered").await;

        let start = datetime!(2024-05-01 12:00:00 UTC);
        drive(
            &mut monitor,
            &vision,
            start,
            vec![
                Some(vec![owner()]),
                Some(vec![owner()]),
                Some(vec![owner()]),
                Some(vec![]),
                Some(vec![]),
                Some(vec![]),
                Some(vec![owner()]),
                Some(vec![owner()]),
                Some(vec![owner()]),
            ],
        )
        .await;

        let entries = entries.lock().unwrap().clone();
        assert_eq!(entries.len(), 2);
        assert!(matches!(
            entries[0],
            PresenceEvent::OwnerEntered { should_greet: true, .. }
        ));
        // Second entry lands well inside the 1800s cooldown.
        assert!(matches!(
            entries[1],
            PresenceEvent::OwnerEntered { should_greet: false, .. }
        ));
    }

    #[tokio::test]
    async fn test_intruder_suppressed_while_owner_present() {
        let (mut monitor, vision, _) = setup();
        let intruders = capture(&monitor, "intruder_detected").await;

        drive(
            &mut monitor,
            &vision,
            datetime!(2024-05-01 12:00:00 UTC),
            vec![
                Some(vec![owner()]),
                Some(vec![owner()]),
                Some(vec![owner()]),
                Some(vec![unknown()]),
                Some(vec![unknown()]),
                Some(vec![unknown()]),
                Some(vec![unknown()]),
            ],
        )
        .await;

        // Owner never left, so the unknown run must not raise an intruder.
        assert!(intruders.lock().unwrap().is_empty());
        assert!(!monitor.state().intruder_active);
    }

    #[tokio::test]
    async fn test_owner_with_unknown_face_settles_multiple_people() {
        let (mut monitor, vision, _) = setup();
        let changed = capture(&monitor, "presence_changed").await;
        let intruders = capture(&monitor, "intruder_detected").await;

        drive(
            &mut monitor,
            &vision,
            datetime!(2024-05-01 12:00:00 UTC),
            vec![Some(vec![owner(), unknown()]); 4],
        )
        .await;

        assert_eq!(monitor.state().presence, PresenceState::MultiplePeople);
        assert!(monitor.state().owner_detected);
        assert!(intruders.lock().unwrap().is_empty());
        assert_eq!(changed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_room_empty_stops_recording_and_backfills_duration() {
        let (mut monitor, vision, recorder) = setup();
        let empties = capture(&monitor, "room_empty").await;
        let left = capture(&monitor, "owner_left").await;

        drive(
            &mut monitor,
            &vision,
            datetime!(2024-05-01 12:00:00 UTC),
            vec![
                Some(vec![unknown()]),
                Some(vec![unknown()]),
                Some(vec![unknown()]),
                Some(vec![]),
                Some(vec![]),
                Some(vec![]),
            ],
        )
        .await;

        assert_eq!(monitor.state().presence, PresenceState::Empty);
        assert!(!monitor.state().intruder_active);
        assert!(monitor.state().empty_since.is_some());
        assert_eq!(recorder.start_count(), 1);
        assert_eq!(recorder.stop_count(), 1);
        assert_eq!(empties.lock().unwrap().len(), 1);
        assert_eq!(left.lock().unwrap().len(), 1);

        // Recording ran from tick 2 to tick 5, three seconds apart.
        let records = monitor.intruder_records();
        assert_eq!(records.len(), 1);
        assert!((records[0].duration_seconds - 3.0).abs() < f64::EPSILON);
    }
}
