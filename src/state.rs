use crate::{config::Config, middleware::auth::IdentityVerifier, websocket::bus::RoomBus};
use sqlx::{Pool, Postgres};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Postgres>,
    pub rooms: Arc<dyn RoomBus>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub config: Arc<Config>,
}
