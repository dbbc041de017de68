use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Serialize;
use thiserror::Error;

use crate::codec::CodecError;
use crate::controller::ControllerError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("session not found")]
    SessionNotFound,
    #[error("unknown style: {0}")]
    UnknownStyle(String),
    #[error("upload rejected: {0}")]
    NotAnImage(#[from] CodecError),
    #[error("{0}")]
    Precondition(#[from] ControllerError),
    #[error("no generated image for {0}")]
    NoImage(String),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::SessionNotFound | ApiError::UnknownStyle(_) | ApiError::NoImage(_) => StatusCode::NOT_FOUND,
            ApiError::NotAnImage(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Precondition(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::SessionNotFound => "SessionNotFound",
            ApiError::UnknownStyle(_) => "UnknownStyle",
            ApiError::NotAnImage(_) => "NotAnImage",
            ApiError::Precondition(_) => "Precondition",
            ApiError::NoImage(_) => "NoImage",
            ApiError::Internal(_) => "Internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(msg) = &self {
            tracing::error!("❌ {}", msg);
        }
        let body = ErrorBody { error: self.kind(), message: self.to_string() };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(ApiError::SessionNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::from(CodecError::Unrecognised).status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(ApiError::from(ControllerError::NoSourceImage).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::Internal("boom".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn message_includes_cause() {
        let err = ApiError::from(CodecError::NotAnImage("text/plain".into()));
        assert_eq!(err.to_string(), "upload rejected: declared content type text/plain is not an image");
    }
}
