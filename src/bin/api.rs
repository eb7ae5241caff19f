use financial_document_analyzer::{
    api::start_server,
    config::Settings,
    llm::GroqClient,
    pipeline::{create_default_pipeline, PipelineRunner},
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    // Fail fast: a missing credential must never be discovered mid-request.
    let settings = Settings::from_env()?;

    info!("Financial Document Analyzer - API Server");
    info!("Port: {}", settings.port);
    info!("Model: {}", settings.model);

    // Create components
    let generator = Arc::new(GroqClient::new(
        settings.groq_api_key.clone(),
        settings.base_url.clone(),
        settings.model.clone(),
    )?);
    let pipeline = create_default_pipeline(generator)?;
    let runner = Arc::new(PipelineRunner::new(pipeline));

    info!("Pipeline initialized");
    info!("Starting API server...");

    // Start API server
    start_server(runner, settings.data_dir.clone(), settings.port).await?;

    Ok(())
}
