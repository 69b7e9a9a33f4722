//! Error taxonomy for the scanning core.
//!
//! Failures are recovered at the lowest layer that still has a fallback;
//! only conditions with no remaining fallback reach the caller.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    /// No camera device found, or device enumeration failed.
    #[error("no usable camera: {detail}")]
    CameraUnavailable { detail: String },

    /// The OS refused camera access.
    #[error("camera access denied: {detail}. Grant camera permission to this application, or continue with manual entry")]
    PermissionDenied { detail: String },

    /// The capture backend itself cannot run in this environment. Not a
    /// permission problem; granting access will not help.
    #[error("camera backend unusable on this system: {detail}. Install or enable a supported capture backend")]
    BackendUnsupported { detail: String },

    /// A single-frame capture attempt found no code. Soft; retry any time.
    #[error("no code detected in the captured frame")]
    DecodeNotFound,

    /// Confirm was requested while expected boxes remain unmatched.
    #[error("cannot confirm receipt: {matched} of {total} boxes acknowledged")]
    ReconcileIncomplete { matched: usize, total: usize },

    /// The transfer manifest could not be parsed.
    #[error("invalid transfer manifest: {0}")]
    ManifestInvalid(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ScanError {
    /// True for failures the session survives by degrading to manual entry.
    pub fn manual_entry_applies(&self) -> bool {
        matches!(
            self,
            ScanError::CameraUnavailable { .. }
                | ScanError::PermissionDenied { .. }
                | ScanError::BackendUnsupported { .. }
        )
    }

    /// True for soft failures the caller can simply retry.
    pub fn is_soft(&self) -> bool {
        matches!(self, ScanError::DecodeNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_entry_classification() {
        let err = ScanError::CameraUnavailable {
            detail: "no video devices".to_string(),
        };
        assert!(err.manual_entry_applies());
        assert!(!ScanError::DecodeNotFound.manual_entry_applies());
    }

    #[test]
    fn test_backend_message_distinct_from_permission() {
        let backend = ScanError::BackendUnsupported {
            detail: "no capture API".to_string(),
        };
        let permission = ScanError::PermissionDenied {
            detail: "denied by OS".to_string(),
        };
        assert!(backend.to_string().contains("backend"));
        assert!(!backend.to_string().contains("permission denied"));
        assert!(permission.to_string().contains("access denied"));
    }

    #[test]
    fn test_soft_errors() {
        assert!(ScanError::DecodeNotFound.is_soft());
        assert!(!ScanError::ReconcileIncomplete { matched: 1, total: 3 }.is_soft());
    }
}
