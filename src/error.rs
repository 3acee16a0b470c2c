/// Result alias carrying the crate-wide [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the animation core.
///
/// Construction-time problems are fatal to the component that reported
/// them; no partially initialized object is returned alongside an error.
/// Per-frame operations never produce these; they clamp, hold the
/// previous value, or skip instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid init parameters (channel count, band count, cutoff/rate
    /// relationship, canvas dimensions).
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Failed to set up FFT plans or working buffers.
    #[error("resource allocation failed: {0}")]
    Resource(String),

    /// A pose table failed to load or validate.
    #[error("pose library error: {0}")]
    PoseLibrary(String),
}

impl Error {
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn poses<T: Into<String>>(msg: T) -> Self {
        Self::PoseLibrary(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::PoseLibrary(value.to_string())
    }
}
