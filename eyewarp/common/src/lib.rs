pub use api::{
    EyeAnchor, EyePair, FramePayload, LandmarkSet, PixelBuffer, Plane, RawFrame, RgbaImage,
    Rotation, WarpParameters,
};

pub mod config;
pub mod convert;
mod error;
pub mod eye_mapper;
mod mailbox;
pub mod scheduler;
mod smoothing;
pub mod warp;

pub use config::{load_config, CaptureConfig, ModuleConfig, WarpConfig};
pub use error::PipelineError;
pub use mailbox::Mailbox;
pub use scheduler::{FrameScheduler, JobPermit};
pub use smoothing::{ExpFilter, TemporalSmoother, SMOOTHING_ALPHA};
