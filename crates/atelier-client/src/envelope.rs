//! The `{ code, message?, data? }` envelope every backend endpoint returns.

use atelier_core::JobItem;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Response envelope. `code == 0` means success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Application status code
    pub code: i64,

    /// Human-readable message, mostly present on failures
    #[serde(default, alias = "msg")]
    pub message: Option<String>,

    /// Payload
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Returns true when the backend reported success.
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }

    /// Check the code, discarding any payload.
    pub fn into_ack(self) -> Result<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(ClientError::application(self.code, self.message))
        }
    }

    /// Check the code and return the payload, which must be present.
    pub fn into_data(self, endpoint: &str) -> Result<T> {
        if !self.is_ok() {
            return Err(ClientError::application(self.code, self.message));
        }
        self.data.ok_or_else(|| ClientError::Decode {
            endpoint: endpoint.to_string(),
            message: "missing data".to_string(),
        })
    }
}

/// Payload shape of the status and submit endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemList {
    /// Returned records
    #[serde(default)]
    pub list: Vec<JobItem>,
}
