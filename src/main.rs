use std::sync::Arc;

use comunia::api::{api_router, ApiContext};
use comunia::auth::HttpAuthProvider;
use comunia::config::{self, Config};
use comunia::db::sqlite::open_database;
use comunia::events::EventBus;
use comunia::llm::HttpLlmClient;
use comunia::pipeline::extraction::ocr::TesseractOcr;
use comunia::pipeline::extraction::pdf::PdfTextExtractor;
use comunia::pipeline::extraction::vision::LlmVisionExtractor;
use comunia::pipeline::extraction::DocumentExtractor;
use comunia::pipeline::processor::TokenPricing;
use comunia::pipeline::DocumentPipeline;
use comunia::storage::LocalBlobStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    comunia::init_tracing();
    let cfg = Config::from_env();

    tracing::info!(
        version = config::APP_VERSION,
        db = %cfg.db_path.display(),
        "Comunia starting"
    );

    if let Some(parent) = cfg.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = open_database(&cfg.db_path)?;

    let llm: Arc<HttpLlmClient> = Arc::new(HttpLlmClient::new(
        &cfg.ai_base_url,
        &cfg.ai_model,
        cfg.ai_timeout_secs,
    ));
    let blob_store = Arc::new(LocalBlobStore::new(cfg.blob_root.clone()));

    let extractor = DocumentExtractor::new(
        Box::new(PdfTextExtractor),
        Box::new(TesseractOcr::new(cfg.ocr_timeout_secs)),
        Box::new(LlmVisionExtractor::new(llm.clone())),
    );
    let pipeline = Arc::new(DocumentPipeline::new(
        Box::new(extractor),
        llm,
        blob_store.clone(),
        TokenPricing {
            prompt_per_million: cfg.prompt_token_price,
            completion_per_million: cfg.completion_token_price,
        },
    ));

    let ctx = ApiContext::new(
        conn,
        blob_store,
        pipeline,
        Arc::new(HttpAuthProvider::new(&cfg.auth_base_url, 30)),
        EventBus::new(),
    );

    let listener = tokio::net::TcpListener::bind(cfg.bind_addr).await?;
    tracing::info!(addr = %cfg.bind_addr, "Listening");
    axum::serve(listener, api_router(ctx)).await?;
    Ok(())
}
