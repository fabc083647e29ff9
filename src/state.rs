use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::{DbPool, OrmConn},
    mail::Mailer,
    storage::AssetStore,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: Arc<OrmConn>,
    pub config: Arc<AppConfig>,
    pub assets: Arc<dyn AssetStore>,
    pub mailer: Arc<dyn Mailer>,
}
