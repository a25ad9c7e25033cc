pub mod plugins;
pub mod renderer;
pub mod session;
pub mod source;

pub use renderer::{EyeWarpRenderer, Throughput};
pub use session::{process_frame, PreviewFrame, Session, StatsSnapshot};
pub use source::{CapturedFrame, FrameSource, SyntheticCamera};
