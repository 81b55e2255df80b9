use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;
use tracing::{error, info};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::User;
use crate::routes::form::{FormBody, FormResponse};
use crate::services::auth_service;
use crate::state::AppState;
use crate::validation::{LoginForm, RegisterForm};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_entry).post(login))
        .route("/register", post(register))
}

/// Where unauthenticated requests are sent.
pub async fn login_entry() -> Json<serde_json::Value> {
    info!("GET /login - Login entry point");
    Json(json!({
        "message": "Autenticação necessária.",
        "login": "POST /login",
        "register": "POST /register",
    }))
}

pub async fn register(
    State(state): State<AppState>,
    FormBody(form): FormBody<RegisterForm>,
) -> Response {
    info!("POST /register - Registering user");
    match auth_service::register(state.users.as_ref(), form.clone()).await {
        Ok(user) => token_response(&state, user),
        Err(e) => rejection(e, &form),
    }
}

pub async fn login(
    State(state): State<AppState>,
    FormBody(form): FormBody<LoginForm>,
) -> Response {
    info!("POST /login - Authenticating user");
    match auth_service::authenticate(state.users.as_ref(), form.clone()).await {
        Ok(user) => token_response(&state, user),
        Err(e) => rejection(e, &form),
    }
}

fn token_response(state: &AppState, user: User) -> Response {
    // Token expiry is checked against the system clock, so sign with it too.
    match state.tokens.issue(user.id, Utc::now()) {
        Ok(token) => Json(json!({ "token": token, "user": AuthUser::from(user) })).into_response(),
        Err(e) => {
            error!("Failed to issue token for user {}: {}", user.id, e);
            e.into_response()
        }
    }
}

fn rejection<T: serde::Serialize>(err: AppError, form: &T) -> Response {
    match err {
        AppError::Validation(errors) => FormResponse::invalid(errors, form).into_response(),
        other => {
            error!("Authentication request failed: {}", other);
            other.into_response()
        }
    }
}
