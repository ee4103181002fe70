use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::label::LabelId;
use crate::viewer::RequestId;

/// Errors returned by [`crate::viewer::ImageViewer`] operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViewerError {
    #[error("No request {0} is in flight")]
    UnknownRequest(RequestId),

    #[error("No label with id {0}")]
    UnknownLabel(LabelId),

    #[error("Viewer was unmounted")]
    Unmounted,

    #[error("Image has not finished loading")]
    ImageNotLoaded,
}

/// Failure of a label request, as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestError {
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Server rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl RequestError {
    pub fn network(message: impl Into<String>) -> Self {
        RequestError::Network {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ViewerError>;
