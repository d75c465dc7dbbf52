/// Convenience result type used across montage.
pub type MontageResult<T> = Result<T, MontageError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum MontageError {
    /// An operation needed an open reader (or timeline) but it was closed.
    #[error("reader closed: {0}")]
    ReaderClosed(String),

    /// A backing resource could not be located or decoded, or cached data is inconsistent.
    #[error("invalid file: {0}")]
    InvalidFile(String),

    /// A frame number outside `1..=max` was requested.
    #[error("out of bounds frame {requested} (valid frames are 1..={max})")]
    OutOfBoundsFrame {
        /// Requested frame number.
        requested: u64,
        /// Last valid frame number.
        max: u64,
    },

    /// A keyframe point index outside the point list was requested.
    #[error("out of bounds point {index} (keyframe has {count} points)")]
    OutOfBoundsPoint {
        /// Requested point index.
        index: usize,
        /// Number of points in the keyframe.
        count: usize,
    },

    /// Malformed or semantically invalid configuration document.
    #[error("invalid json in {context}: {message}")]
    InvalidJson {
        /// Object and operation that rejected the document.
        context: String,
        /// Parser or validation message.
        message: String,
    },

    /// A value was queried from a keyframe without points.
    #[error("keyframe has no points")]
    NoPoints,

    /// Invalid user-provided parameters.
    #[error("validation error: {0}")]
    Validation(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MontageError {
    /// Build a [`MontageError::ReaderClosed`] value.
    pub fn reader_closed(msg: impl Into<String>) -> Self {
        Self::ReaderClosed(msg.into())
    }

    /// Build a [`MontageError::InvalidFile`] value.
    pub fn invalid_file(msg: impl Into<String>) -> Self {
        Self::InvalidFile(msg.into())
    }

    /// Build a [`MontageError::InvalidJson`] value.
    pub fn invalid_json(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidJson {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Build a [`MontageError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`MontageError::OutOfBoundsFrame`] value.
    pub fn out_of_bounds_frame(requested: u64, max: u64) -> Self {
        Self::OutOfBoundsFrame { requested, max }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
