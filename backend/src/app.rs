use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::routes::{auth, clients, health, investments};
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::<AppState>::new()
        .merge(health::router())
        .merge(auth::router())
        .route("/dashboard", get(investments::list_investments))
        .nest("/clients", clients::router())
        .nest("/investments", investments::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
