//! JSON envelope for API errors.
//!
//! ```json
//! {"success": false, "error": {"code": "NOT_FOUND", "message": "...", "details": [...]}}
//! ```

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::domain::foundation::ErrorCode;
use crate::domain::recurring::{BillingError, FieldError};

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorBody,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.error.details = Some(details);
        self
    }
}

/// `{"success": true, "data": ...}`
#[derive(Debug, Clone, Serialize)]
pub struct DataResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> DataResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

/// API error type that converts billing errors to HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub BillingError);

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(BillingError::validation("body", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self(BillingError::validation("path", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(BillingError::validation("query", rejection.body_text()))
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self(BillingError::ValidationFailed(field_errors(&errors)))
    }
}

/// Flattens validator output into one entry per invalid field.
pub fn field_errors(errors: &validator::ValidationErrors) -> Vec<FieldError> {
    let mut out = Vec::new();
    collect_field_errors("", errors, &mut out);
    out.sort_by(|a, b| a.field.cmp(&b.field));
    out
}

fn collect_field_errors(prefix: &str, errors: &validator::ValidationErrors, out: &mut Vec<FieldError>) {
    use validator::ValidationErrorsKind;

    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                let message = list
                    .iter()
                    .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("{} is invalid", path));
                out.push(FieldError::new(path, message));
            }
            ValidationErrorsKind::Struct(nested) => collect_field_errors(&path, nested, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_field_errors(&format!("{}[{}]", path, index), nested, out);
                }
            }
        }
    }
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::ValidationFailed
        | ErrorCode::InvalidIntervalUnit
        | ErrorCode::InvalidPlanType
        | ErrorCode::MissingEventField => StatusCode::BAD_REQUEST,
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::InvalidStatus | ErrorCode::InvalidStateTransition | ErrorCode::DuplicateCharge => {
            StatusCode::CONFLICT
        }
        ErrorCode::TokenFetchFailed
        | ErrorCode::AgreementCreationFailed
        | ErrorCode::AgreementLookupFailed
        | ErrorCode::ChargeCreationFailed
        | ErrorCode::ProviderError => StatusCode::BAD_GATEWAY,
        ErrorCode::DatabaseError | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.code();
        let status = status_for(code);

        let body = match &self.0 {
            BillingError::ValidationFailed(fields) => {
                ErrorResponse::new(code.to_string(), self.0.to_string())
                    .with_details(serde_json::to_value(fields).unwrap_or(Value::Null))
            }
            BillingError::Infrastructure(_) => {
                tracing::error!(error = %self.0, "request failed on infrastructure error");
                ErrorResponse::new(code.to_string(), "Internal server error")
            }
            other => {
                if status.is_server_error() {
                    tracing::error!(error = %other, code = %code, "request failed");
                }
                ErrorResponse::new(code.to_string(), other.to_string())
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use validator::Validate;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn not_found_maps_to_404_envelope() {
        let response = ApiError(BillingError::not_found("Agreement", "agr_9")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn validation_lists_every_field() {
        let err = BillingError::ValidationFailed(vec![
            FieldError::new("email", "must be a valid email"),
            FieldError::new("amount", "must be positive"),
        ]);
        let response = ApiError(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "VALIDATION_FAILED");
        assert_eq!(json["error"]["details"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn infrastructure_message_is_not_leaked() {
        let response =
            ApiError(BillingError::Infrastructure("password auth failed".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "Internal server error");
    }

    #[test]
    fn provider_failures_are_bad_gateway() {
        assert_eq!(status_for(ErrorCode::TokenFetchFailed), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(ErrorCode::InvalidStatus), StatusCode::CONFLICT);
    }

    #[derive(Validate)]
    struct Signup {
        #[validate(email(message = "must be a valid email"))]
        email: String,
        #[validate(length(min = 1, message = "is required"))]
        name: String,
    }

    #[test]
    fn validator_errors_flatten_per_field() {
        let errors = Signup {
            email: "nope".to_string(),
            name: String::new(),
        }
        .validate()
        .unwrap_err();

        let fields = field_errors(&errors);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].field, "email");
        assert_eq!(fields[0].message, "must be a valid email");
        assert_eq!(fields[1].field, "name");
    }
}
