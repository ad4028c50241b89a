pub mod api;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod schema;
pub mod store;
pub mod vault;

pub use api::{create_router, AppContext, AppState, CallerContext};
pub use error::{EngineError, Result};
pub use logic::{
    CredentialMigrator, DefinitionRegenerator, FieldOverrideResolver, LifecycleGate,
    ProductResourceGuard, Reconciler, ScopeTable,
};
pub use model::*;
pub use store::{DescriptorStore, LifecycleStore, MemoryStore, Store};
pub use vault::{Base64Vault, CredentialVault};

use std::sync::Arc;

/// Build the default application state: in-memory store and the development
/// vault. Integration tests and the binary share this wiring.
pub fn default_state() -> AppState<MemoryStore> {
    Arc::new(AppContext::new(
        Arc::new(MemoryStore::new()),
        Arc::new(Base64Vault),
    ))
}

/// Run the HTTP server with the default wiring. Blocks until the listener
/// shuts down.
pub async fn run_server() -> anyhow::Result<()> {
    use axum::serve;
    use tokio::net::TcpListener;

    dotenvy::dotenv().ok();

    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();

    let config = crate::config::AppConfig::load()?;

    let state = default_state();
    let app = create_router().with_state(state);

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    log::info!("api-registry listening on http://{bind_address}");

    serve(listener, app).await?;

    Ok(())
}
