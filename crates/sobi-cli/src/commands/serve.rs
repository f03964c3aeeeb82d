//! Server command implementation

use anyhow::Result;
use sobi_core::{Config, TaskType};

pub async fn cmd_serve(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    println!("🚀 Starting sobi web server...");
    println!(
        "   Listening: http://{}:{}",
        config.server.host, config.server.port
    );
    println!(
        "   LLM backend: {:?} ({})",
        config.llm.backend, config.llm.base_url
    );
    for task in [
        TaskType::Classification,
        TaskType::Analytics,
        TaskType::Recommendation,
    ] {
        println!("   - {}: {}", task.as_str(), config.models.for_task(task));
    }
    println!(
        "   Batches: {} items, {} in flight",
        config.pipeline.batch_size, config.pipeline.max_concurrency
    );
    if !config.server.allowed_origins.is_empty() {
        println!(
            "   CORS origins: {}",
            config.server.allowed_origins.join(", ")
        );
    }
    println!();
    println!("   Press Ctrl+C to stop");

    sobi_server::serve(config).await
}
