use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::routes::form::{FormBody, FormFailure, FormResponse};
use crate::services::client_service;
use crate::state::AppState;
use crate::validation::{StoreClientForm, UpdateClientForm};

const LISTING: &str = "/clients";

const CREATE: FormFailure = FormFailure {
    field: "client",
    denied: "Você não tem permissão para criar este cliente.",
    failed: "Erro ao criar cliente. Tente novamente.",
};

const UPDATE: FormFailure = FormFailure {
    field: "client",
    denied: "Você não tem permissão para editar este cliente.",
    failed: "Erro ao atualizar cliente. Tente novamente.",
};

const DELETE: FormFailure = FormFailure {
    field: "client",
    denied: "Você não tem permissão para excluir este cliente.",
    failed: "Erro ao excluir cliente. Tente novamente.",
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_clients).post(create_client))
        .route(
            "/:id",
            axum::routing::patch(update_client)
                .post(update_client)
                .delete(delete_client),
        )
}

pub async fn list_clients(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Value>, AppError> {
    info!("GET /clients - Listing clients of user {}", user.id);
    let clients = client_service::list_by_owner(state.clients.as_ref(), user.id)
        .await
        .map_err(|e| {
            error!("Failed to list clients for user {}: {}", user.id, e);
            e
        })?;
    Ok(Json(json!({ "clients": clients })))
}

pub async fn create_client(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
    FormBody(form): FormBody<StoreClientForm>,
) -> FormResponse {
    info!("POST /clients - Creating client for user {}", user.id);
    let input = match form.clone().validate(user.id) {
        Ok(input) => input,
        Err(errors) => return FormResponse::invalid(errors, &form),
    };

    match client_service::create(state.clients.as_ref(), input).await {
        Ok(_) => FormResponse::back(&headers, LISTING, "Cliente criado com sucesso!"),
        Err(e) => FormResponse::invalid(CREATE.errors(e), &form),
    }
}

pub async fn update_client(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    FormBody(form): FormBody<UpdateClientForm>,
) -> FormResponse {
    info!("PATCH /clients/{} - Updating client", id);
    if let Err(e) = client_service::ensure_owned(state.clients.as_ref(), user.id, id).await {
        return FormResponse::invalid(UPDATE.errors(e), &form);
    }

    let changes = match form.clone().validate() {
        Ok(changes) => changes,
        Err(errors) => return FormResponse::invalid(errors, &form),
    };

    match client_service::update(state.clients.as_ref(), id, changes).await {
        Ok(_) => FormResponse::back(&headers, LISTING, "Cliente atualizado com sucesso!"),
        Err(e) => FormResponse::invalid(UPDATE.errors(e), &form),
    }
}

pub async fn delete_client(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> FormResponse {
    info!("DELETE /clients/{} - Deleting client", id);
    let result = match client_service::ensure_owned(state.clients.as_ref(), user.id, id).await {
        Ok(_) => client_service::delete(state.clients.as_ref(), id).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => FormResponse::back(&headers, LISTING, "Cliente excluído com sucesso!"),
        Err(e) => FormResponse::invalid(DELETE.errors(e), &json!({ "id": id })),
    }
}
