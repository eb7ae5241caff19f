use financial_document_analyzer::{
    api::DEFAULT_QUERY,
    config::Settings,
    llm::GroqClient,
    pipeline::create_default_pipeline,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let mut args = std::env::args().skip(1);
    let file_path = args.next().ok_or("Usage: analyzer <file.pdf> [query...]")?;
    let query_words: Vec<String> = args.collect();
    let query = if query_words.is_empty() {
        DEFAULT_QUERY.to_string()
    } else {
        query_words.join(" ")
    };

    let settings = Settings::from_env()?;

    let generator = Arc::new(GroqClient::new(
        settings.groq_api_key.clone(),
        settings.base_url.clone(),
        settings.model.clone(),
    )?);
    let pipeline = create_default_pipeline(generator)?;

    info!(file_path = %file_path, query = %query, "Running analysis pipeline");

    match pipeline.run(&query, &file_path).await {
        Ok(run) => {
            println!("\n=== ANALYSIS RESULT ===");
            println!("Run ID: {}", run.run_id);
            for (i, stage) in run.stage_results.iter().enumerate() {
                println!(
                    "  {}: {} ({}) - {} ms",
                    i + 1,
                    stage.stage_name,
                    stage.role_name,
                    stage.execution_time_ms
                );
            }
            println!("\n{}", run.final_output);
            Ok(())
        }
        Err(e) => {
            eprintln!("Analysis failed: {}", e);
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}
