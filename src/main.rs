use clap::Parser;
use dotenvy::dotenv;
use flat_upload::api::middleware::request_id::REQUEST_ID_HEADER;
use flat_upload::config::UploadConfig;
use flat_upload::infrastructure::storage;
use flat_upload::{AppState, create_app};
use std::net::IpAddr;
use std::path::PathBuf;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory uploaded files are written to (overrides UPLOAD_DIR)
    #[arg(short, long)]
    upload_dir: Option<PathBuf>,

    /// Address to bind (overrides HOST)
    #[arg(long)]
    host: Option<IpAddr>,

    /// Port for the HTTP server (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flat_upload=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting flat-upload...");

    let mut config = UploadConfig::from_env();
    if let Some(dir) = args.upload_dir {
        config.upload_dir = dir;
    }
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    info!(
        "🛡️  Upload Config: Max Size={}, Strict Status={}",
        config
            .max_file_size
            .map(|size| format!("{}MB", size / 1024 / 1024))
            .unwrap_or_else(|| "unlimited".to_string()),
        config.strict_status
    );

    let storage_service = storage::setup_storage(&config).await?;
    let addr = config.socket_addr();

    let state = AppState {
        storage: storage_service,
        config,
    };

    let app = create_app(state).layer(
        TraceLayer::new_for_http()
            .make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(&REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            })
            .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                info!("📥 {} {}", request.method(), request.uri());
            })
            .on_response(
                |response: &axum::http::Response<_>,
                 latency: std::time::Duration,
                 _span: &tracing::Span| {
                    info!(
                        "📤 Finished in {:?} with status {}",
                        latency,
                        response.status()
                    );
                },
            ),
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("✅ Server ready at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("🛑 Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}
