use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::auth::AuthError;
use crate::error::StoreError;

pub const NOT_FOUND_MESSAGE: &str = "Usuario no encontrado";
pub const ID_TAKEN_MESSAGE: &str = "Error: El usuario con ID ya existe";

/// Anything a handler can fail with, rendered as `{"mensaje": ...}`.
#[derive(Debug)]
pub enum ApiError {
    Store(StoreError),
    Validation(String),
    Unauthorized(String),
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Issue(_) => ApiError::Internal(err.to_string()),
            _ => ApiError::Unauthorized(err.to_string()),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::Store(StoreError::Validation(_) | StoreError::IdTaken(_))
            | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::Unavailable { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Store(StoreError::ActorCommunication(_)) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Store(StoreError::NotFound(_)) => json!({ "mensaje": NOT_FOUND_MESSAGE }),
            ApiError::Store(StoreError::Conflict(detail)) => json!({
                "mensaje": "Error: El usuario ya existe",
                "detalle": detail,
            }),
            ApiError::Store(StoreError::IdTaken(_)) => json!({ "mensaje": ID_TAKEN_MESSAGE }),
            ApiError::Store(StoreError::Validation(detail)) | ApiError::Validation(detail) => {
                json!({ "mensaje": detail })
            }
            ApiError::Store(err @ StoreError::Unavailable { .. }) => {
                error!(error = %err, "Store unavailable");
                json!({ "mensaje": "Almacenamiento no disponible" })
            }
            ApiError::Store(err @ StoreError::ActorCommunication(_)) => {
                error!(error = %err, "Store actor unreachable");
                json!({ "mensaje": "Error interno" })
            }
            ApiError::Unauthorized(detail) => json!({ "mensaje": detail }),
            ApiError::Internal(detail) => {
                error!(error = %detail, "Internal error");
                json!({ "mensaje": "Error interno" })
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_is_stable() {
        let cases = [
            (ApiError::Store(StoreError::NotFound(1)), 404),
            (ApiError::Store(StoreError::Conflict("x".into())), 409),
            (ApiError::Store(StoreError::Validation("x".into())), 400),
            (ApiError::Store(StoreError::IdTaken(3)), 400),
            (ApiError::Validation("x".into()), 400),
            (ApiError::Store(StoreError::unavailable("/tmp/x", "gone")), 503),
            (ApiError::Store(StoreError::ActorCommunication("x".into())), 500),
            (ApiError::from(AuthError::MissingToken), 401),
            (ApiError::from(AuthError::Issue("x".into())), 500),
        ];
        for (err, code) in cases {
            assert_eq!(err.status().as_u16(), code, "{err:?}");
        }
    }
}
