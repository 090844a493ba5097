use crate::elevation::ElevationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GradientError {
    #[error("expected one color per stop ({stops} stops, {colors} colors)")]
    StopColorMismatch { stops: usize, colors: usize },

    #[error("gradient stops must be strictly ascending")]
    UnsortedStops,

    #[error("gradient stop {0} is not below 100%")]
    StopOutOfRange(f64),

    #[error("reading way source: {0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error(transparent)]
    Elevation(#[from] ElevationError),
}

impl GradientError {
    /// Wraps a decoder error raised by a [`BatchSource`](crate::BatchSource)
    /// implementation.
    pub fn source(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Source(Box::new(err))
    }
}
