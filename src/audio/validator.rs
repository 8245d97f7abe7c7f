//! # Upload Format Validation
//!
//! First gate of the pipeline. Looks only at the declared filename, so a bad
//! upload is rejected before anything is written to disk or decoded.

use thiserror::Error;

/// Extensions accepted for upload (compared lowercase).
pub const ALLOWED_EXTENSIONS: [&str; 6] = ["ogg", "oga", "mp3", "wav", "opus", "m4a"];

/// Why an upload was turned away.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("empty filename")]
    EmptyFilename,

    #[error("unsupported format")]
    UnsupportedFormat { extension: Option<String> },
}

/// Checks declared filenames against the extension allow-list.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatValidator;

impl FormatValidator {
    /// Validate a declared filename.
    ///
    /// ## Returns:
    /// - **Ok(String)**: the lowercase extension, ready for naming temp files
    /// - **Err(ValidationError)**: missing name, missing extension or an
    ///   extension outside [`ALLOWED_EXTENSIONS`]
    pub fn validate(&self, filename: Option<&str>) -> Result<String, ValidationError> {
        let filename = match filename {
            Some(name) if !name.is_empty() => name,
            _ => return Err(ValidationError::EmptyFilename),
        };

        let extension = match filename.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => ext.to_lowercase(),
            _ => return Err(ValidationError::UnsupportedFormat { extension: None }),
        };

        if ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            Ok(extension)
        } else {
            Err(ValidationError::UnsupportedFormat {
                extension: Some(extension),
            })
        }
    }

    /// Whether an already-validated extension needs no conversion.
    pub fn is_canonical(extension: &str) -> bool {
        extension.eq_ignore_ascii_case("wav")
    }
}
