//! HTTP/JSON surface over the user store.
//!
//! Routes: `/usuarios` CRUD and `/healthz` always; `/login`, `/openapi.json` and
//! `/apidocs` only when the authenticated variant is configured, in which case
//! every `/usuarios` route also requires a bearer token.

pub mod docs;
pub mod error;

use std::future::IntoFuture;
use std::io;
use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{DefaultBodyLimit, Path, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

use crate::app_system::UserSystem;
use crate::auth::JwtAuth;
use crate::clients::UserClient;
use crate::config::{AuthConfig, ServeConfig};
use crate::domain::{User, UserCreate, UserPatch};
use crate::store::RecordStore;

use self::error::ApiError;

pub const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: io::Error,
    },
    #[error("server failed: {0}")]
    Server(io::Error),
    #[error("server shutdown timed out")]
    ShutdownTimeout,
    #[error("{0}")]
    System(String),
}

#[derive(Clone)]
pub struct AppState {
    users: UserClient,
    /// Only the basic variant lets callers choose an id on create.
    allow_caller_ids: bool,
}

#[derive(Clone)]
struct LoginState {
    users: UserClient,
    jwt: Arc<JwtAuth>,
}

/// Build the router. `auth` selects the authenticated variant.
pub fn router(users: UserClient, auth: Option<&AuthConfig>) -> Router {
    let jwt = auth.map(|config| Arc::new(JwtAuth::new(&config.secret, config.token_ttl)));
    let state = AppState {
        users: users.clone(),
        allow_caller_ids: jwt.is_none(),
    };

    let usuarios = Router::new()
        .route("/usuarios", get(list_users).post(create_user))
        .route(
            "/usuarios/:id",
            get(get_user)
                .put(update_user)
                .patch(update_user)
                .delete(delete_user),
        );

    let mut app = Router::new().route("/healthz", get(healthz));
    app = match (jwt, auth) {
        (Some(jwt), Some(config)) => app
            .merge(usuarios.route_layer(middleware::from_fn_with_state(
                jwt.clone(),
                require_token,
            )))
            .route("/login", post(login).with_state(LoginState { users, jwt }))
            .route("/openapi.json", get(docs::openapi))
            .route("/apidocs", get(docs::swagger_ui))
            .layer(cors_layer(config)),
        _ => app.merge(usuarios),
    };

    app.layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &AuthConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.cors_origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(config.cors_origins.clone()))
    }
}

/// Run the server until Ctrl-C/SIGTERM, then drain the store actor.
pub async fn serve(config: ServeConfig) -> Result<(), ServeError> {
    let store = RecordStore::new(&config.file, config.uniqueness());
    let system = UserSystem::start(store);
    let app = router(system.user_client.clone(), config.auth.as_ref());

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|source| ServeError::Bind {
            addr: config.bind,
            source,
        })?;
    info!(
        bind = %config.bind,
        file = %config.file.display(),
        authenticated = config.auth.is_some(),
        "Serving user API"
    );

    // The server future owns the router and with it clones of the user
    // client; it has to be gone before the actor can drain.
    {
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let server = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .into_future();
        tokio::pin!(server);

        tokio::select! {
            result = &mut server => {
                result.map_err(ServeError::Server)?;
            }
            _ = shutdown_signal() => {
                info!("Shutdown requested");
                let _ = shutdown_tx.send(());
                match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                    Ok(result) => result.map_err(ServeError::Server)?,
                    Err(_) => return Err(ServeError::ShutdownTimeout),
                }
            }
        };
    }

    system.shutdown().await.map_err(ServeError::System)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

async fn require_token(State(jwt): State<Arc<JwtAuth>>, request: Request, next: Next) -> Response {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    match jwt.validate_header(header) {
        Ok(claims) => {
            tracing::debug!(subject = %claims.sub, "Token accepted");
            next.run(request).await
        }
        Err(err) => {
            warn!(error = %err, "Token rejected");
            ApiError::from(err).into_response()
        }
    }
}

// =============================================================================
// REQUEST SHAPES
// =============================================================================

#[derive(Debug, Deserialize)]
struct CreateUserRequest {
    id: Option<u64>,
    nombre: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateUserRequest {
    nombre: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: Option<String>,
}

fn required(field: &str, value: Option<String>) -> Result<String, ApiError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ApiError::Validation(format!("Falta el campo '{field}'"))),
    }
}

fn optional(field: &str, value: Option<String>) -> Result<Option<String>, ApiError> {
    match value {
        Some(value) if value.trim().is_empty() => {
            Err(ApiError::Validation(format!("El campo '{field}' no puede estar vacío")))
        }
        other => Ok(other),
    }
}

impl CreateUserRequest {
    fn into_payload(self, allow_id: bool) -> Result<UserCreate, ApiError> {
        if self.id.is_some() && !allow_id {
            return Err(ApiError::Validation(
                "El id lo asigna el servidor".to_string(),
            ));
        }
        Ok(UserCreate {
            id: self.id,
            name: required("nombre", self.nombre)?,
            email: required("email", self.email)?,
        })
    }
}

impl UpdateUserRequest {
    fn into_patch(self) -> Result<UserPatch, ApiError> {
        let patch = UserPatch {
            name: optional("nombre", self.nombre)?,
            email: optional("email", self.email)?,
        };
        if patch.is_empty() {
            return Err(ApiError::Validation(
                "Se requiere 'nombre' o 'email'".to_string(),
            ));
        }
        Ok(patch)
    }
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| {
            ApiError::Validation(format!("Cuerpo JSON inválido: {}", rejection.body_text()))
        })
}

fn user_id(path: Result<Path<u64>, PathRejection>) -> Result<u64, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|_| ApiError::Validation("El id debe ser un entero".to_string()))
}

// =============================================================================
// HANDLERS
// =============================================================================

async fn healthz() -> Response {
    Json(json!({ "ok": true })).into_response()
}

#[instrument(skip(state))]
async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.users.list_users().await?))
}

#[instrument(skip(state, path))]
async fn get_user(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
) -> Result<Json<User>, ApiError> {
    let id = user_id(path)?;
    match state.users.get_user(id).await? {
        Some(user) => Ok(Json(user)),
        None => Err(crate::error::StoreError::NotFound(id).into()),
    }
}

#[instrument(skip(state, payload))]
async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let payload = body(payload)?.into_payload(state.allow_caller_ids)?;
    let id = state.users.create_user(payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "mensaje": "Usuario agregado", "id": id })),
    )
        .into_response())
}

#[instrument(skip(state, path, payload))]
async fn update_user(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let id = user_id(path)?;
    let patch = body(payload)?.into_patch()?;
    let user = state.users.update_user(id, patch).await?;
    Ok(Json(json!({ "mensaje": "Usuario actualizado", "usuario": user })).into_response())
}

#[instrument(skip(state, path))]
async fn delete_user(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
) -> Result<Response, ApiError> {
    let id = user_id(path)?;
    state.users.delete_user(id).await?;
    Ok(Json(json!({ "mensaje": "Usuario eliminado" })).into_response())
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<LoginState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let email = required("email", body(payload)?.email)?;
    match state.users.find_user_by_email(&email).await? {
        Some(user) => {
            info!(user_id = user.id, "Login accepted");
            let token = state.jwt.issue(&user.email)?;
            Ok(Json(json!({ "token": token })).into_response())
        }
        None => Err(ApiError::Unauthorized("Email no registrado".to_string())),
    }
}
