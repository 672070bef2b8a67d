pub mod extract;
pub mod openapi;
pub mod tenants;

use axum::Router;

use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().merge(tenants::routes())
}
