use crate::error::{AtelierLinkError, Result};
use serde::{Deserialize, Serialize};

/// Envelope returned by every Atelier REST endpoint.
///
/// ```json
/// {"success": true, "data": {...}}
/// {"success": false, "error": "project not found"}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiResponse<T> {
    /// Whether the operation succeeded server-side.
    pub success: bool,
    /// Payload; present on success for data-bearing endpoints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Server-supplied error message; present on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Unwrap the payload.
    ///
    /// Errors when `success` is false **or** `data` is absent.
    pub fn extract_data(self) -> Result<T> {
        if !self.success {
            return Err(AtelierLinkError::ApiError(
                self.error.unwrap_or_else(|| "request failed".to_string()),
            ));
        }
        self.data.ok_or_else(|| {
            AtelierLinkError::SerializationError(
                "Response marked success but carried no data".to_string(),
            )
        })
    }

    /// Assert success without requiring a payload.
    ///
    /// Errors only when `success` is false.
    pub fn check_success(self) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(AtelierLinkError::ApiError(
                self.error.unwrap_or_else(|| "request failed".to_string()),
            ))
        }
    }
}
