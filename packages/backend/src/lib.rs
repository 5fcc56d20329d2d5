pub mod config;
pub mod logging;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::services::study::StudyService;
use crate::state::AppState;
use crate::store::{Store, StoreError};

pub async fn build_state(config: Config) -> Result<AppState, StoreError> {
    let store = Store::connect(config.database_url.as_deref()).await?;
    Ok(AppState::new(StudyService::new(store, config)))
}

pub fn create_app(state: AppState) -> axum::Router {
    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
