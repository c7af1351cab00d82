//! Error types for the herd-ledger library.
//!
//! The photo fitter and the workbook store raise [`HerdError`]; callers at the
//! boundary turn them into user-facing messages.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in the herd-ledger core.
#[derive(Error, Debug)]
pub enum HerdError {
    /// The uploaded photo could not be decoded as an image
    #[error("Image could not be decoded: {0}")]
    Decode(#[from] image::ImageError),

    /// The JPEG encoder rejected the image
    #[error("Photo could not be encoded: {0}")]
    Encode(String),

    /// The workbook directory does not exist yet
    #[error("Workbook not found at {}", .0.display())]
    StoreNotFound(PathBuf),

    /// A sheet file is missing from an existing workbook
    #[error("Sheet '{sheet}' not found in workbook {}", .path.display())]
    SheetNotFound {
        /// Sheet name
        sheet: &'static str,
        /// Workbook directory
        path: PathBuf,
    },

    /// Row index is the header, past the end, or blank
    #[error("Row {row} not found in sheet '{sheet}'")]
    RowNotFound {
        /// Sheet name
        sheet: &'static str,
        /// 1-based physical row
        row: usize,
    },

    /// A stored row could not be parsed
    #[error("Malformed row {row} in sheet '{sheet}': {reason}")]
    MalformedRow {
        /// Sheet name
        sheet: &'static str,
        /// 1-based physical row
        row: usize,
        /// What was wrong with it
        reason: String,
    },

    /// Submitted form data was missing or invalid
    #[error("Validation error: {0}")]
    Validation(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Sheet reading/writing errors
    #[error("Sheet format error: {0}")]
    Csv(#[from] csv::Error),
}

impl HerdError {
    /// Short, stable name of the error kind, used in logs and metrics labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::Encode(_) => "encode",
            Self::StoreNotFound(_) => "store_not_found",
            Self::SheetNotFound { .. } => "sheet_not_found",
            Self::RowNotFound { .. } => "row_not_found",
            Self::MalformedRow { .. } => "malformed_row",
            Self::Validation(_) => "validation",
            Self::Io(_) => "io",
            Self::Csv(_) => "csv",
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Convenience type alias for Result with `HerdError`
pub type Result<T> = std::result::Result<T, HerdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_message() {
        let err = HerdError::RowNotFound { sheet: "Records", row: 999 };
        assert_eq!(err.to_string(), "Row 999 not found in sheet 'Records'");
        assert_eq!(err.kind(), "row_not_found");
    }

    #[test]
    fn test_io_conversion() {
        let err: HerdError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.kind(), "io");
    }
}
