//! veil-server: the binary entrypoint that wires config, storage, and
//! adapters together behind the run/trace HTTP surface (§4.12).

mod config;
mod routes;

use std::collections::HashMap;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use veil_engine::{
    AdapterSet, HttpGenericAdapter, HttpKvAdapter, HttpLlmAdapter, HttpMpcGraphAdapter,
    HttpMpcSingleAdapter, HttpTransferAdapter, MemoryCreditLedger, MemoryRunStore, MemoryWorkflowStore,
    RunExecutor,
};

use crate::config::Config;
use crate::routes::{router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    tracing::info!(addr = %config.bind_addr, "starting veil-server");

    let adapters = Arc::new(AdapterSet {
        mpc_single: Arc::new(HttpMpcSingleAdapter::new(config.mpc_single_base_url.clone(), config.adapter_timeout)),
        mpc_graph: Arc::new(HttpMpcGraphAdapter::new(config.mpc_graph_base_url.clone(), config.adapter_timeout)),
        llm: Arc::new(HttpLlmAdapter::new(config.llm_base_url.clone(), config.adapter_timeout)),
        transfer: Arc::new(HttpTransferAdapter::new(config.transfer_base_url.clone(), config.adapter_timeout)),
        kv: Arc::new(HttpKvAdapter::new(config.kv_base_url.clone(), config.adapter_timeout)),
        http: Arc::new(HttpGenericAdapter::new(config.adapter_timeout)),
    });

    // The in-memory stores are the primary, fully-tested backing; swap in
    // `veil_store`'s Postgres implementations (behind its `postgres`
    // feature) for a persistent deployment.
    let blocks = Arc::new(tokio::sync::RwLock::new(HashMap::new()));
    let workflow_store = Arc::new(MemoryWorkflowStore::new(blocks));
    let run_store = Arc::new(MemoryRunStore::new());
    let credit_ledger = Arc::new(MemoryCreditLedger::new());

    let executor = Arc::new(RunExecutor {
        workflow_store,
        run_store,
        credit_ledger,
        adapters,
        connectors: Arc::new(HashMap::new()),
    });

    let app = router(AppState { executor });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("listening");
    axum::serve(listener, app).await?;

    Ok(())
}
