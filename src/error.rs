//! Error types for the fast-reflection-removal crate.

/// Errors that can occur during reflection removal and image I/O.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A tuning parameter lies outside its valid `[0, 1]` range.
    #[error("parameter '{name}' must be between 0 and 1 (included), got {value}")]
    ParameterRange {
        /// Parameter name (`h`, `lmbd` or `mu`).
        name: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// The input image contains a value outside `[0, 1]`.
    #[error("image value {value} at {index:?} is outside [0, 1]")]
    ImageRange {
        /// The first offending value.
        value: f64,
        /// Multi-dimensional index of the offending value.
        index: Vec<usize>,
    },

    /// The input image does not have the expected (row, column, channel) layout.
    #[error("invalid image shape: {0}")]
    ImageShape(String),

    /// A division by zero would occur in the solver or the final rescale.
    #[error("numeric degeneracy: {0}")]
    NumericDegeneracy(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An error occurred during image decoding or encoding.
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
