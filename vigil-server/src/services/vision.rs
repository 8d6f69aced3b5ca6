use std::path::{Path, PathBuf};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::errors::VisionError;
use crate::models::RecognizedFace;

/// A single captured camera frame. Opaque to the presence machine; decoding
/// and inference happen behind the collaborator traits.
#[derive(Clone, Debug)]
pub struct Frame {
    pub data: Vec<u8>,
    pub captured_at: OffsetDateTime,
}

impl Frame {
    pub fn new(data: Vec<u8>, captured_at: OffsetDateTime) -> Self {
        Self { data, captured_at }
    }
}

/// Camera collaborator. `None` means no fresh frame is available and the
/// presence tick is skipped entirely.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn latest_frame(&self) -> Result<Option<Frame>, VisionError>;
}

/// Face recognition collaborator.
#[async_trait]
pub trait FaceRecognizer: Send + Sync {
    async fn recognize(&self, frame: &Frame) -> Result<Vec<RecognizedFace>, VisionError>;

    /// Persist an intruder snapshot from the frame, returning the stored path.
    async fn capture_snapshot(&self, frame: &Frame) -> Result<PathBuf, VisionError>;
}

/// Video recorder collaborator.
#[async_trait]
pub trait Recorder: Send + Sync {
    /// Start recording to `path`, returning the path actually used.
    async fn start_recording(&self, path: &Path) -> Result<PathBuf, VisionError>;

    async fn stop_recording(&self) -> Result<(), VisionError>;
}

#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    /// Scripted camera + recognizer pair: each entry is one tick, `None`
    /// meaning the camera had no frame.
    pub struct ScriptedVision {
        script: Mutex<VecDeque<Option<Vec<RecognizedFace>>>>,
        current: Mutex<Vec<RecognizedFace>>,
        snapshots: AtomicU32,
    }

    impl ScriptedVision {
        pub fn new(ticks: Vec<Option<Vec<RecognizedFace>>>) -> Self {
            Self {
                script: Mutex::new(ticks.into()),
                current: Mutex::new(Vec::new()),
                snapshots: AtomicU32::new(0),
            }
        }

        pub fn push(&self, tick: Option<Vec<RecognizedFace>>) {
            self.script.lock().unwrap().push_back(tick);
        }

        pub fn snapshot_count(&self) -> u32 {
            self.snapshots.load(Ordering::Relaxed)
        }
    }

    impl Default for ScriptedVision {
        fn default() -> Self {
            Self::new(Vec::new())
        }
    }

    #[async_trait]
    impl FrameSource for ScriptedVision {
        async fn latest_frame(&self) -> Result<Option<Frame>, VisionError> {
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Some(faces)) => {
                    *self.current.lock().unwrap() = faces;
                    Ok(Some(Frame::new(Vec::new(), OffsetDateTime::now_utc())))
                }
                Some(None) | None => Ok(None),
            }
        }
    }

    #[async_trait]
    impl FaceRecognizer for ScriptedVision {
        async fn recognize(&self, _frame: &Frame) -> Result<Vec<RecognizedFace>, VisionError> {
            Ok(self.current.lock().unwrap().clone())
        }

        async fn capture_snapshot(&self, _frame: &Frame) -> Result<PathBuf, VisionError> {
            let n = self.snapshots.fetch_add(1, Ordering::Relaxed);
            Ok(PathBuf::from(format!("snapshots/intruder_{n}.jpg")))
        }
    }

    /// Recorder that remembers what it was asked to do.
    #[derive(Default)]
    pub struct MockRecorder {
        pub started: Mutex<Vec<PathBuf>>,
        pub stopped: AtomicU32,
    }

    impl MockRecorder {
        pub fn start_count(&self) -> usize {
            self.started.lock().unwrap().len()
        }

        pub fn stop_count(&self) -> u32 {
            self.stopped.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl Recorder for MockRecorder {
        async fn start_recording(&self, path: &Path) -> Result<PathBuf, VisionError> {
            self.started.lock().unwrap().push(path.to_path_buf());
            Ok(path.to_path_buf())
        }

        async fn stop_recording(&self) -> Result<(), VisionError> {
            self.stopped.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }
}
