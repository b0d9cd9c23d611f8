use super::request_id::RequestId;
use crate::error::{AccountError, ErrorCode, TransferError};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::any::Any;

const INTERNAL_MESSAGE: &str = "Internal Server Error";

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// JSON body of every non-2xx response.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub request_id: String,
    pub error: ErrorBody,
}

/// A failed request, ready to be rendered.
#[derive(Debug)]
pub struct ApiError {
    request_id: RequestId,
    code: ErrorCode,
    message: String,
}

impl ApiError {
    pub fn new(request_id: RequestId, code: ErrorCode, message: impl Into<String>) -> Self {
        let message = match code {
            ErrorCode::Internal => INTERNAL_MESSAGE.to_string(),
            _ => message.into(),
        };
        Self {
            request_id,
            code,
            message,
        }
    }

    pub fn invalid_request(request_id: RequestId, message: impl Into<String>) -> Self {
        Self::new(request_id, ErrorCode::InvalidRequest, message)
    }

    pub fn transfer(request_id: RequestId, err: TransferError) -> Self {
        Self::new(request_id, err.code(), err.to_string())
    }

    pub fn account(request_id: RequestId, err: AccountError) -> Self {
        Self::new(request_id, err.code(), err.to_string())
    }

    pub fn status(&self) -> StatusCode {
        status_for(self.code)
    }
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::SameAccount
        | ErrorCode::InvalidAmount
        | ErrorCode::InvalidAccountIds
        | ErrorCode::InvalidBalance
        | ErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorCode::InsufficientBalance | ErrorCode::AccountExists => StatusCode::CONFLICT,
        ErrorCode::BalanceOutOfRange => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCode::AccountNotFound => StatusCode::NOT_FOUND,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            request_id: self.request_id.0,
            error: ErrorBody {
                code: self.code.as_str().to_string(),
                message: self.message,
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Marks the response built for a panicking handler, so the request layer can
/// render it with the request id.
#[derive(Debug, Clone, Copy)]
pub struct HandlerPanicked;

/// Panic handler for `CatchPanicLayer`.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload");
    tracing::error!(panic = detail, "handler panicked");

    let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
    response.extensions_mut().insert(HandlerPanicked);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExecutionError, StoreError, ValidationError};

    fn id() -> RequestId {
        RequestId("req-1".to_string())
    }

    #[test]
    fn test_validation_maps_to_bad_request() {
        let err = ApiError::transfer(id(), ValidationError::SameAccount.into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code, ErrorCode::SameAccount);
    }

    #[test]
    fn test_insufficient_funds_maps_to_conflict() {
        let err = ApiError::transfer(
            id(),
            ExecutionError::InsufficientFunds {
                id: 1,
                available: Default::default(),
                requested: rust_decimal::Decimal::ONE,
            }
            .into(),
        );
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_internal_message_is_generic() {
        let err = ApiError::account(
            id(),
            AccountError::StoreFailure(StoreError::backend("disk on fire")),
        );
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, INTERNAL_MESSAGE);
    }

    #[test]
    fn test_panic_response_is_marked() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.extensions().get::<HandlerPanicked>().is_some());
    }
}
