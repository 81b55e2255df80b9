use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::{AppError, FieldErrors};
use crate::models::Investment;
use crate::routes::form::{FormBody, FormFailure, FormResponse};
use crate::services::{asset_service, client_service, investment_service};
use crate::state::AppState;
use crate::validation::{StoreInvestmentForm, UpdateInvestmentForm};

const LISTING: &str = "/investments";

const CREATE: FormFailure = FormFailure {
    field: "investment",
    denied: "Você não tem permissão para criar este investimento.",
    failed: "Erro ao criar investimento. Tente novamente.",
};

const UPDATE: FormFailure = FormFailure {
    field: "investment",
    denied: "Você não tem permissão para editar este investimento.",
    failed: "Erro ao atualizar investimento. Tente novamente.",
};

const DELETE: FormFailure = FormFailure {
    field: "investment",
    denied: "Você não tem permissão para excluir este investimento.",
    failed: "Erro ao excluir investimento. Tente novamente.",
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_investments).post(create_investment))
        .route(
            "/:id",
            axum::routing::patch(update_investment)
                .post(update_investment)
                .delete(delete_investment),
        )
}

/// `?client=&page=`. Blank or malformed values mean "no filter" and
/// "first page".
#[derive(Debug, Default, Deserialize)]
pub struct ListFilters {
    pub client: Option<String>,
    pub page: Option<String>,
}

impl ListFilters {
    fn client_id(&self) -> Option<Uuid> {
        self.client.as_deref().and_then(|c| Uuid::parse_str(c.trim()).ok())
    }

    fn page(&self) -> Option<u32> {
        self.page.as_deref().and_then(|p| p.trim().parse().ok())
    }
}

fn invalid_selection(field: &str) -> String {
    format!("O campo {} selecionado é inválido.", field)
}

/// Paginated investments plus everything the listing page needs around them.
pub async fn list_investments(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filters): Query<ListFilters>,
) -> Result<Json<Value>, AppError> {
    info!("GET /investments - Listing investments of user {}", user.id);
    let client_filter = filters.client_id();

    let log_failure = |e: AppError| {
        error!("Failed to load investments for user {}: {}", user.id, e);
        e
    };

    let investments = investment_service::list_by_owner(
        state.investments.as_ref(),
        user.id,
        state.page_size,
        client_filter,
        filters.page(),
    )
    .await
    .map_err(log_failure)?;
    let stats = investment_service::get_stats(
        state.investments.as_ref(),
        user.id,
        client_filter,
        state.today(),
    )
    .await
    .map_err(log_failure)?;
    let clients = client_service::list_for_select(state.clients.as_ref(), user.id)
        .await
        .map_err(log_failure)?;
    let assets = asset_service::list_for_select(state.assets.as_ref())
        .await
        .map_err(log_failure)?;

    Ok(Json(json!({
        "investments": investments,
        "clients": clients,
        "assets": assets,
        "stats": stats,
        "filters": { "client": client_filter.map(|id| id.to_string()) },
    })))
}

/// Field errors for a referenced asset that does not exist or a client the
/// user does not own.
async fn check_references(
    state: &AppState,
    user_id: Uuid,
    client_id: Option<Uuid>,
    asset_id: Option<Uuid>,
) -> Result<FieldErrors, AppError> {
    let mut errors = FieldErrors::new();
    if let Some(asset_id) = asset_id {
        if !asset_service::exists(state.assets.as_ref(), asset_id).await? {
            errors.add("asset_id", invalid_selection("asset_id"));
        }
    }
    if let Some(client_id) = client_id {
        match client_service::ensure_owned(state.clients.as_ref(), user_id, client_id).await {
            Ok(_) => {}
            Err(AppError::Forbidden) | Err(AppError::NotFound) => {
                errors.add("client_id", invalid_selection("client_id"));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(errors)
}

/// The investment if it belongs to one of `user_id`'s active clients.
async fn owned_investment(state: &AppState, user_id: Uuid, id: Uuid) -> Result<Investment, AppError> {
    let investment = investment_service::get_by_id(state.investments.as_ref(), id).await?;
    client_service::ensure_owned(state.clients.as_ref(), user_id, investment.client_id).await?;
    Ok(investment)
}

pub async fn create_investment(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
    FormBody(form): FormBody<StoreInvestmentForm>,
) -> FormResponse {
    info!("POST /investments - Creating investment for user {}", user.id);
    let (client_id, asset_id) = form.references();
    let references = match check_references(&state, user.id, client_id, asset_id).await {
        Ok(errors) => errors,
        Err(e) => return FormResponse::invalid(CREATE.errors(e), &form),
    };

    let input = match form.clone().validate(state.today()) {
        Ok(input) if references.is_empty() => input,
        Ok(_) => return FormResponse::invalid(references, &form),
        Err(mut errors) => {
            errors.merge(references);
            return FormResponse::invalid(errors, &form);
        }
    };

    match investment_service::create(state.investments.as_ref(), input, state.today()).await {
        Ok(_) => FormResponse::back(&headers, LISTING, "Investimento criado com sucesso!"),
        Err(e) => FormResponse::invalid(CREATE.errors(e), &form),
    }
}

pub async fn update_investment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    FormBody(form): FormBody<UpdateInvestmentForm>,
) -> FormResponse {
    info!("PATCH /investments/{} - Updating investment", id);
    if let Err(e) = owned_investment(&state, user.id, id).await {
        return FormResponse::invalid(UPDATE.errors(e), &form);
    }

    let (client_id, asset_id) = form.references();
    let references = match check_references(&state, user.id, client_id, asset_id).await {
        Ok(errors) => errors,
        Err(e) => return FormResponse::invalid(UPDATE.errors(e), &form),
    };

    let changes = match form.clone().validate(state.today()) {
        Ok(changes) if references.is_empty() => changes,
        Ok(_) => return FormResponse::invalid(references, &form),
        Err(mut errors) => {
            errors.merge(references);
            return FormResponse::invalid(errors, &form);
        }
    };

    match investment_service::update(state.investments.as_ref(), id, changes, state.today()).await {
        Ok(_) => FormResponse::back(&headers, LISTING, "Investimento atualizado com sucesso!"),
        Err(e) => FormResponse::invalid(UPDATE.errors(e), &form),
    }
}

pub async fn delete_investment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> FormResponse {
    info!("DELETE /investments/{} - Deleting investment", id);
    let result = match owned_investment(&state, user.id, id).await {
        Ok(_) => investment_service::delete(state.investments.as_ref(), id).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => FormResponse::back(&headers, LISTING, "Investimento excluído com sucesso!"),
        Err(e) => FormResponse::invalid(DELETE.errors(e), &json!({ "id": id })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_filters_are_ignored() {
        let filters = ListFilters {
            client: Some(String::new()),
            page: Some("abc".into()),
        };
        assert_eq!(filters.client_id(), None);
        assert_eq!(filters.page(), None);
    }

    #[test]
    fn test_filters_parse() {
        let id = Uuid::new_v4();
        let filters = ListFilters {
            client: Some(id.to_string()),
            page: Some("3".into()),
        };
        assert_eq!(filters.client_id(), Some(id));
        assert_eq!(filters.page(), Some(3));
    }
}
