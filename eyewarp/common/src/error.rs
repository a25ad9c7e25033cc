/// Failures a single pipeline step can report. Each one is contained to the
/// frame or update that produced it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),
    #[error("Landmark detector unavailable: {0}")]
    DetectionUnavailable(String),
    #[error("Non-finite value in {0}")]
    NumericAnomaly(&'static str),
}
