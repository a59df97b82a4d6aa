use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use hourlymotion_ledger::Error as LedgerError;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Missing {0} query parameter")]
    MissingParameter(&'static str),

    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::BadRequest(format!("invalid JSON body: {}", err))
    }
}

impl ResponseError for GatewayError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        let error_message = self.to_string();

        HttpResponse::build(status_code).json(json!({
            "error": {
                "code": status_code.as_u16(),
                "message": error_message,
                "type": self.error_type()
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Ledger(LedgerError::Validation(_)) => StatusCode::BAD_REQUEST,
            GatewayError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::MissingParameter(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl GatewayError {
    fn error_type(&self) -> &str {
        match self {
            GatewayError::Ledger(LedgerError::Validation(_)) => "validation_error",
            GatewayError::Ledger(LedgerError::CorruptRecord { .. }) => "corrupt_record",
            GatewayError::Ledger(_) => "storage_error",
            GatewayError::BadRequest(_) => "bad_request",
            GatewayError::MissingParameter(_) => "validation_error",
            GatewayError::NotFound(_) => "not_found",
            GatewayError::Internal(_) => "internal_error",
        }
    }
}
