use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },
    #[error("*.scan file type not recognized (magic code {code})")]
    UnrecognizedFormat { code: f64 },
    #[error("*.scan file version {version} is not supported")]
    UnsupportedVersion { version: f64 },
    #[error("Scan file is corrupted or incomplete: {0}")]
    Corrupt(String),
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("Invalid string: {0}")]
    InvalidString(String),
    #[error(
        "Requested {requested} output dimension(s), but the scan file has {significant} significant dimension(s)"
    )]
    DimensionMismatch { requested: usize, significant: usize },
    #[error("Not enough memory to hold {values} measurement values")]
    OutOfMemory { values: usize },
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl ScanError {
    pub(crate) fn io(source: std::io::Error, context: impl Into<String>) -> Self {
        ScanError::Io {
            source,
            context: context.into(),
        }
    }

    /// Fatal errors that leave the file unreadable, as opposed to caller mistakes.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            ScanError::UnrecognizedFormat { .. } | ScanError::UnsupportedVersion { .. }
        )
    }
}
