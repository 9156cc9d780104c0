use clap::Parser;
use forge_server::http::{self, AppState};
use forge_server::sandbox::DevSandbox;
use forge_server::service::{ServiceConfig, SessionService};
use forge_session::{GenaiInference, MemoryConversationStore, SqliteConversationStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "forge-server")]
struct Args {
    #[arg(long, env = "FORGE_HTTP_ADDR", default_value = "127.0.0.1:8080")]
    http_addr: String,

    /// Conversation database path; omit for in-memory storage.
    #[arg(long, env = "FORGE_STORAGE_PATH")]
    storage_path: Option<PathBuf>,

    #[arg(long, env = "FORGE_MODEL", default_value = "gpt-4o-mini")]
    model: String,

    /// Fallback models, tried in order after the primary.
    #[arg(long, env = "FORGE_FALLBACK_MODELS", value_delimiter = ',')]
    fallback_models: Vec<String>,

    /// Domain the dev sandbox serves previews under.
    #[arg(long, env = "FORGE_PREVIEW_DOMAIN", default_value = "preview.localhost")]
    preview_domain: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let conversation_store: Arc<dyn forge_session::ConversationStore> = match &args.storage_path {
        Some(path) => match SqliteConversationStore::open(path) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                eprintln!("failed to open conversation store {}: {e}", path.display());
                std::process::exit(2);
            }
        },
        None => Arc::new(MemoryConversationStore::new()),
    };

    let inference = GenaiInference::new(genai::Client::default(), args.model.clone())
        .with_fallback_models(args.fallback_models.clone());

    let mut config = ServiceConfig::new(
        Arc::new(DevSandbox::new(args.preview_domain.clone())),
        Arc::new(inference),
        conversation_store,
    );
    config.hostname = args.http_addr.clone();

    let service = Arc::new(SessionService::new(config));
    let app = http::router(AppState { service });

    let listener = tokio::net::TcpListener::bind(&args.http_addr)
        .await
        .expect("failed to bind http listener");
    tracing::info!(addr = %args.http_addr, "forge server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .expect("http server crashed");
}
