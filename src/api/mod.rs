//! HTTP/JSON surface for the booking client.

pub mod dto;
pub mod error;
mod routes;

use std::sync::Arc;

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::engine::Engine;
use crate::history::HistoryStore;

pub use error::{ApiError, ApiResult};

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub history: Arc<dyn HistoryStore>,
    pub version: String,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, history: Arc<dyn HistoryStore>) -> Self {
        Self {
            engine,
            history,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

pub fn create_router(state: AppState, cors: bool) -> Router {
    let mut router = Router::new()
        .route("/health", get(routes::health))
        .route("/api/gestao", get(routes::list_slots))
        .route("/api/clientes", get(routes::list_appointments))
        .route("/api/servicos", get(routes::list_services))
        .route("/api/cadastro", post(routes::create_appointment))
        .route(
            "/api/agendamentos/:id",
            put(routes::update_appointment).delete(routes::delete_appointment),
        )
        .route("/api/disponibilidade", get(routes::available_slots))
        .route("/api/datas", get(routes::candidate_dates))
        .route("/api/concluidos", get(routes::list_archived))
        .route_layer(middleware::from_fn(count_requests))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }
    router
}

async fn count_requests(req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_default();
    let response = next.run(req).await;
    metrics::counter!(
        crate::observability::HTTP_REQUESTS_TOTAL,
        "route" => route,
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);
    response
}
