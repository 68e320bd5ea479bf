//! Request-level errors
//!
//! Every failure is terminal for its request. Storage and render failures
//! expose their error text in the response body.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};

use crate::http;
use crate::render::RenderError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("invalid page path")]
    InvalidPath,

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    #[error("failed to read request body: {0}")]
    BadRequest(String),
}

impl PageError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidPath => StatusCode::NOT_FOUND,
            // Handlers turn a missing page into a redirect or an empty form,
            // so any storage error reaching here is a server failure
            Self::Storage(_) | Self::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn into_response(self) -> Response<Full<Bytes>> {
        match self.status() {
            StatusCode::NOT_FOUND => http::build_404_response(),
            StatusCode::PAYLOAD_TOO_LARGE => http::build_413_response(),
            StatusCode::INTERNAL_SERVER_ERROR => http::build_500_response(&self.to_string()),
            status => http::response::build_text_response(status, self.to_string()),
        }
    }
}
