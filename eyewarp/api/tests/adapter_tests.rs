use anyhow::{bail, Result};
use api::{
    DetectorAdapter, EyePair, LandmarkDetector, LandmarkSet, LogLevel, ModuleLogger, RgbaImage,
    Rotation, WarpParameters,
};
use glam::Vec2;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

extern "C" fn silent(_level: LogLevel, _target: *const i8, _message: *const i8) {}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn logger() -> ModuleLogger {
    ModuleLogger::new(silent, "test".to_string())
}

#[derive(Default)]
struct Recorder {
    timestamps: Mutex<Vec<i64>>,
    released: AtomicUsize,
}

enum Reply {
    Points(usize),
    Nothing,
    Error,
    PanicOnce,
}

struct FakeDetector {
    reply: Reply,
    recorder: Arc<Recorder>,
}

impl LandmarkDetector for FakeDetector {
    fn initialize(&mut self, logger: ModuleLogger) -> Result<()> {
        logger.debug("fake ready");
        Ok(())
    }

    fn detect(&mut self, _image: &RgbaImage, timestamp_ms: i64) -> Result<Option<LandmarkSet>> {
        let calls = {
            let mut timestamps = self.recorder.timestamps.lock().unwrap();
            timestamps.push(timestamp_ms);
            timestamps.len()
        };
        match self.reply {
            Reply::Points(n) => Ok(Some(LandmarkSet::new(vec![Vec2::splat(0.5); n]))),
            Reply::Nothing => Ok(None),
            Reply::Error => bail!("graph crashed"),
            Reply::PanicOnce if calls == 1 => panic!("graph aborted"),
            Reply::PanicOnce => Ok(Some(LandmarkSet::new(vec![Vec2::splat(0.5); 478]))),
        }
    }

    fn release(&mut self) {
        self.recorder.released.fetch_add(1, Ordering::SeqCst);
    }
}

fn make_adapter(reply: Reply) -> (DetectorAdapter, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let detector = FakeDetector {
        reply,
        recorder: recorder.clone(),
    };
    let mut adapter = DetectorAdapter::new("fake", Box::new(detector));
    adapter.initialize(logger()).unwrap();
    (adapter, recorder)
}

mod adapter {
    use super::*;

    #[test]
    fn passes_landmarks_through() {
        let (mut adapter, _) = make_adapter(Reply::Points(478));
        let landmarks = adapter.detect(&RgbaImage::new(2, 2), 0).unwrap();
        assert_eq!(landmarks.len(), 478);
    }

    #[test]
    fn empty_result_is_no_face() {
        let (mut adapter, _) = make_adapter(Reply::Points(0));
        assert!(adapter.detect(&RgbaImage::new(2, 2), 0).is_none());

        let (mut adapter, _) = make_adapter(Reply::Nothing);
        assert!(adapter.detect(&RgbaImage::new(2, 2), 0).is_none());
    }

    #[test]
    fn errors_fail_closed() {
        init_logging();
        let (mut adapter, _) = make_adapter(Reply::Error);
        assert!(adapter.detect(&RgbaImage::new(2, 2), 0).is_none());
        assert!(adapter.detect(&RgbaImage::new(2, 2), 40).is_none());
        assert_eq!(adapter.failures(), 2);
    }

    #[test]
    fn panic_fails_closed_and_recovers() {
        init_logging();
        let (mut adapter, recorder) = make_adapter(Reply::PanicOnce);
        let image = RgbaImage::new(2, 2);

        assert!(adapter.detect(&image, 0).is_none());
        assert_eq!(adapter.failures(), 1);

        let landmarks = adapter.detect(&image, 40).unwrap();
        assert_eq!(landmarks.len(), 478);
        assert_eq!(adapter.failures(), 1);
        assert_eq!(*recorder.timestamps.lock().unwrap(), vec![0, 40]);

        drop(adapter);
        assert_eq!(recorder.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn timestamp_bump_saturates() {
        let (mut adapter, recorder) = make_adapter(Reply::Nothing);
        let image = RgbaImage::new(2, 2);
        adapter.detect(&image, i64::MAX);
        adapter.detect(&image, i64::MAX);
        assert_eq!(
            *recorder.timestamps.lock().unwrap(),
            vec![i64::MAX, i64::MAX]
        );
    }

    #[test]
    fn timestamps_are_strictly_increasing() {
        let (mut adapter, recorder) = make_adapter(Reply::Nothing);
        let image = RgbaImage::new(2, 2);
        for ts in [100, 100, 90, 150, 150] {
            adapter.detect(&image, ts);
        }
        assert_eq!(
            *recorder.timestamps.lock().unwrap(),
            vec![100, 101, 102, 150, 151]
        );
    }

    #[test]
    fn release_is_idempotent() {
        let (mut adapter, recorder) = make_adapter(Reply::Nothing);
        adapter.release();
        adapter.release();
        assert!(adapter.is_released());
        assert!(adapter.detect(&RgbaImage::new(2, 2), 0).is_none());
        drop(adapter);
        assert_eq!(recorder.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_releases() {
        let (adapter, recorder) = make_adapter(Reply::Nothing);
        drop(adapter);
        assert_eq!(recorder.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn initialize_after_release_fails() {
        let (mut adapter, _) = make_adapter(Reply::Nothing);
        adapter.release();
        assert!(adapter.initialize(logger()).is_err());
    }
}

mod model {
    use super::*;

    #[test]
    fn default_anchors() {
        let eyes = EyePair::default();
        assert_eq!(eyes.left.center, Vec2::new(0.3, 0.5));
        assert_eq!(eyes.right.center, Vec2::new(0.7, 0.5));
        assert_eq!(eyes.radius(), 0.08);
        assert_eq!(WarpParameters::default().strength, 0.5);
    }

    #[test]
    fn rotation_from_degrees() {
        assert_eq!(Rotation::from_degrees(90), Some(Rotation::Deg90));
        assert_eq!(Rotation::from_degrees(-90), Some(Rotation::Deg270));
        assert_eq!(Rotation::from_degrees(450), Some(Rotation::Deg90));
        assert_eq!(Rotation::from_degrees(45), None);
        assert!(Rotation::Deg270.is_transposed());
        assert!(!Rotation::Deg180.is_transposed());
    }

    #[test]
    fn pixel_buffer_length_is_checked() {
        assert_eq!(api::PixelBuffer::required_len(4, 2), 12);
        assert!(api::PixelBuffer::from_bytes(4, 2, vec![0; 12]).is_some());
        assert!(api::PixelBuffer::from_bytes(4, 2, vec![0; 11]).is_none());
        let buffer = api::PixelBuffer::zeroed(4, 2);
        assert_eq!(buffer.luma().len(), 8);
        assert_eq!(buffer.chroma().len(), 4);
    }

    #[test]
    fn landmark_set_is_a_json_array() {
        let set = LandmarkSet::new(vec![Vec2::new(0.25, 0.5)]);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, "[[0.25,0.5]]");
    }
}
