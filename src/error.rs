use std::path::PathBuf;
use thiserror::Error;

/// Reasons a single LabelMe record cannot be converted.
///
/// None of these abort a batch: the driver logs the error, counts the record
/// as failed and moves on to the next file.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse JSON ({}): {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("rectangle '{label}' has {count} points, expected 2")]
    MalformedRectangle { label: String, count: usize },

    #[error("label file {} is already produced by another record", .path.display())]
    DuplicateOutput { path: PathBuf },
}

impl ConvertError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConvertError::Io {
            path: path.into(),
            source,
        }
    }
}
