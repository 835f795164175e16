use std::sync::Arc;

use kg_workers::config::{
    InferenceConfig, LexiconConfig, SinkConfig, WeaviateConfig, WorkerConfig,
};
use kg_workers::handlers::{EchoHandler, MapDescriptionHandler, ParagraphHandler};
use kg_workers::manager::ManagerClient;
use kg_workers::worker::{HandlerRegistry, WorkerPool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let worker_config = WorkerConfig::from_env()?;
    let inference = InferenceConfig::from_env()?;
    let weaviate = WeaviateConfig::from_env()?;
    let sink = SinkConfig::from_env()?;
    let lexicon = LexiconConfig::from_env();

    tracing::info!(
        manager = %worker_config.manager_host,
        pool_count = worker_config.pool_count,
        model = %inference.model_name,
        "kg-workers v{}",
        env!("CARGO_PKG_VERSION")
    );

    let registry = Arc::new(
        HandlerRegistry::builder()
            .register(Arc::new(ParagraphHandler::new(
                inference.clone(),
                weaviate,
                sink.clone(),
            )))
            .register(Arc::new(MapDescriptionHandler::new(
                inference, sink, lexicon,
            )))
            .register(Arc::new(EchoHandler))
            .build(),
    );

    let manager = Arc::new(ManagerClient::new(worker_config.manager_host.clone()));
    let pool = WorkerPool::new(manager, registry, &worker_config);
    pool.run().await?;

    Ok(())
}
