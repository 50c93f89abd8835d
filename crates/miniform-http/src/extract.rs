//! axum integration: extracting [`FormData`] from a request.
//!
//! `GET` and `HEAD` requests read the query string; other methods read the
//! body. The upload limit comes from
//! [`Settings::upload_max_memory_size`](miniform_core::Settings).

use axum::extract::{FromRequest, Request};
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::{header, Method, StatusCode};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use miniform_core::{MiniformError, SETTINGS};
use serde_json::json;

use crate::form_data::FormData;
use crate::querydict::QueryDict;

/// Files per request the body limit leaves room for.
const BODY_LIMIT_FACTOR: usize = 4;

/// Why a request could not be turned into [`FormData`].
#[derive(Debug)]
pub struct FormRejection {
    pub status: StatusCode,
    pub message: String,
}

impl FormRejection {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<MiniformError> for FormRejection {
    fn from(err: MiniformError) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for FormRejection {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl<S> FromRequest<S> for FormData
where
    S: Send + Sync,
{
    type Rejection = FormRejection;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        if req.method() == Method::GET || req.method() == Method::HEAD {
            return Ok(QueryDict::parse(req.uri().query().unwrap_or_default()).into());
        }

        let max_size = SETTINGS.get_or_default().upload_max_memory_size;
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                FormRejection::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, "Missing Content-Type header")
            })?;

        let limit = max_size.saturating_mul(BODY_LIMIT_FACTOR);
        let body = Limited::new(req.into_body(), limit)
            .collect()
            .await
            .map_err(|e| {
                if e.is::<LengthLimitError>() {
                    FormRejection::new(
                        StatusCode::PAYLOAD_TOO_LARGE,
                        format!("Request body exceeds {limit} bytes"),
                    )
                } else {
                    FormRejection::new(StatusCode::BAD_REQUEST, format!("Failed to read body: {e}"))
                }
            })?
            .to_bytes();

        let data = FormData::parse(&content_type, &body, max_size).map_err(|e| {
            tracing::debug!(error = %e, "rejected form submission");
            FormRejection::from(e)
        })?;
        Ok(data)
    }
}
