pub mod migrate;
pub mod seed;
pub mod user;

use std::sync::Arc;

use anyhow::{bail, Context};

use crate::config::{config, StoreBackend};
use crate::database::{open_store, DocumentStore};

/// The configured store, refusing the in-memory one since nothing would persist
pub async fn persistent_store() -> anyhow::Result<Arc<dyn DocumentStore>> {
    let config = config();
    if config.database.backend == StoreBackend::Memory {
        bail!("this command needs STORE_BACKEND=postgres and DATABASE_URL");
    }
    open_store(&config.database).await.context("failed to open record store")
}
