use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OmrError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to initialize text recognition engine: {0}")]
    InitializationError(String),

    #[error("Text recognition failed: {0}")]
    Recognition(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Image too large: {size} bytes (max: {max} bytes)")]
    ImageTooLarge { size: usize, max: usize },

    #[error("Upload exceeds the {max} byte limit")]
    UploadTooLarge { max: usize },

    #[error("Missing file in request")]
    MissingFile,

    #[error("Unknown engine: {0}")]
    UnknownEngine(String),

    #[error("No answer key has been installed")]
    NoAnswerKey,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for OmrError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            OmrError::Decode(_) => (StatusCode::UNPROCESSABLE_ENTITY, "DECODE_ERROR"),
            OmrError::InitializationError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INIT_ERROR"),
            OmrError::Recognition(_) => (StatusCode::INTERNAL_SERVER_ERROR, "RECOGNITION_ERROR"),
            OmrError::InvalidConfig(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            OmrError::ImageTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "IMAGE_TOO_LARGE"),
            OmrError::UploadTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "IMAGE_TOO_LARGE"),
            OmrError::MissingFile => (StatusCode::BAD_REQUEST, "MISSING_FILE"),
            OmrError::UnknownEngine(_) => (StatusCode::BAD_REQUEST, "UNKNOWN_ENGINE"),
            OmrError::NoAnswerKey => (StatusCode::CONFLICT, "NO_ANSWER_KEY"),
            OmrError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            OmrError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}
