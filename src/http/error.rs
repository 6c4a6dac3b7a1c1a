use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use validator::ValidationErrors;

use crate::app::ServiceError;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    fields: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<BTreeMap<String, Vec<String>>>,
}

impl AppError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            fields: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn unprocessable(errors: &ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let messages = errors
                    .iter()
                    .map(|error| match &error.message {
                        Some(message) => message.to_string(),
                        None => format!("{} is invalid", field),
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();

        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: "the given data was invalid".to_string(),
            fields: Some(fields),
        }
    }

    /// Maps a service failure to a response; `context` is the client-facing
    /// message for internal errors, whose cause is only logged.
    pub fn from_service(err: ServiceError, context: &'static str) -> Self {
        match err {
            ServiceError::Validation(errors) => Self::unprocessable(&errors),
            ServiceError::InvalidCredentials => Self::unauthorized("invalid credentials"),
            ServiceError::NotApproved => Self::forbidden("user is awaiting approval"),
            ServiceError::Forbidden(message) => Self::forbidden(message),
            ServiceError::NotFound(what) => Self::not_found(format!("{} not found", what)),
            ServiceError::Conflict(message) => Self::conflict(message),
            ServiceError::Internal(err) => {
                tracing::error!(error = ?err, "{}", context);
                Self::internal(context)
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(err) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, err.body_text())
            }
            JsonRejection::JsonSyntaxError(_) => Self::bad_request("malformed JSON body"),
            JsonRejection::MissingJsonContentType(_) => Self::new(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "expected request with `Content-Type: application/json`",
            ),
            other => Self::new(other.status(), other.body_text()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
            fields: self.fields,
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::error::field_error;

    #[test]
    fn validation_errors_list_messages_per_field() {
        let mut errors = ValidationErrors::new();
        errors.add("email", field_error("unique", "email has already been taken"));
        let err = AppError::from_service(ServiceError::Validation(errors), "failed");

        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        let fields = err.fields.unwrap();
        assert_eq!(fields["email"], vec!["email has already been taken".to_string()]);
    }

    #[test]
    fn internal_errors_hide_the_cause() {
        let err = AppError::from_service(
            ServiceError::Internal(anyhow::anyhow!("connection refused")),
            "failed to load feed",
        );
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "failed to load feed");
    }
}
