use crate::decoder::DecodeError;

/// Frame-fatal errors. Per-tag problems (duplicates, unknown ids, failed
/// solves) never surface here; they are logged and reported through
/// `FrameDiagnostics`.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("invalid camera intrinsics (fx={fx}, fy={fy}, cx={cx}, cy={cy})")]
    InvalidIntrinsics { fx: f64, fy: f64, cx: f64, cy: f64 },

    #[error(transparent)]
    Decode(#[from] DecodeError),
}
