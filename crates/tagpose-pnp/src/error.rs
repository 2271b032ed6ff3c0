/// Errors returned by the pose solver.
///
/// Every variant is a per-item failure: callers are expected to skip the
/// affected tag or bundle rather than abort a frame.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PnpError {
    #[error("pose solve requires at least {required} 2D-3D correspondences, got {actual}")]
    InsufficientCorrespondences { required: usize, actual: usize },

    #[error("mismatched correspondence lengths: {object} object points vs {image} image points")]
    MismatchedLengths { object: usize, image: usize },

    #[error("non-finite input coordinates")]
    NonFiniteInput,

    #[error("invalid camera intrinsics (fx={fx}, fy={fy})")]
    InvalidIntrinsics { fx: f64, fy: f64 },

    #[error("object points are coincident or collinear")]
    DegenerateObjectPoints,

    #[error("image points are coincident or collinear")]
    DegenerateImagePoints,

    #[error("linear initialisation failed: {0}")]
    InitializationFailed(&'static str),

    #[error("solver produced a non-finite pose")]
    NonFiniteSolution,

    #[error("{count} point(s) end up at non-positive depth")]
    PointsBehindCamera { count: usize },

    #[error("reprojection RMSE {rmse:.3} px exceeds limit {limit:.3} px")]
    ReprojectionTooLarge { rmse: f64, limit: f64 },

    #[error("invalid solver parameter {name} = {value}")]
    InvalidParams { name: &'static str, value: f64 },
}
