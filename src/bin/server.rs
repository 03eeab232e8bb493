use bloom_blacklist::api::create_router;
use bloom_blacklist::server::serve;
use bloom_blacklist::{AppState, ServerConfig, StorageKind};
use clap::Parser;
use std::sync::Arc;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

/// URL blacklist server: `blacklist-server <port> <array_size> <r1> [r2 ...]`
///
/// Anything not given on the command line comes from the environment
/// (or a `.env` file).
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TCP port for the line protocol
    port: Option<u16>,

    /// Number of bits in the Bloom filter
    #[arg(requires = "repeats")]
    array_size: Option<usize>,

    /// Hash repeat counts, one per hash function
    repeats: Vec<u32>,

    /// Directory holding the persisted state
    #[arg(long)]
    data_dir: Option<String>,

    /// Storage backend: files or redb
    #[arg(long)]
    storage: Option<StorageKind>,

    /// Also serve the HTTP API on this port
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let args = Args::parse();

    // load configuration from environment variables, positional args win
    let mut config = ServerConfig::from_env()?;
    if let Some(port) = args.port {
        config.server_port = port;
    }
    if let Some(array_size) = args.array_size {
        config.array_size = array_size;
        config.hash_repeats = args.repeats;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(storage) = args.storage {
        config.storage = storage;
    }
    if args.http_port.is_some() {
        config.http_port = args.http_port;
    }

    let engine = match config.open_engine() {
        Ok(engine) => engine,
        Err(e) => {
            error!(error = %e, "Failed to open blacklist state");
            return Err(e.into());
        }
    };
    let state = Arc::new(AppState { engine });

    let tcp_addr = config.tcp_addr();
    let listener = tokio::net::TcpListener::bind(&tcp_addr).await?;

    info!(
        r#"
    URL blacklist server starting

    Filter configuration:
       • Array size: {:>12} bits
       • Repeat counts: {:?}
       • Storage: {:?} in {}
       • Run mode: {:?}

    Listening:
       • Line protocol: tcp://{}
       • HTTP API:      {}

    Performance Mode: {}
    "#,
        config.array_size,
        config.hash_repeats,
        config.storage,
        config.data_dir,
        state.engine.run_mode(),
        tcp_addr,
        config
            .http_addr()
            .map(|addr| format!("http://{addr} (Swagger UI at /swagger-ui/)"))
            .unwrap_or_else(|| "disabled".to_string()),
        if cfg!(debug_assertions) {
            "DEBUG"
        } else {
            "RELEASE"
        }
    );

    if let Some(http_addr) = config.http_addr() {
        // Create router with logging middleware
        let app = create_router(Arc::clone(&state)).layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        version = ?request.version(),
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::info!(
                            status = %response.status(),
                            latency = ?latency,
                            "response generated"
                        );
                    },
                ),
        );
        let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(http_listener, app).await {
                error!(error = %e, "HTTP API stopped");
            }
        });
    }

    info!("Starting line server on {}", tcp_addr);
    serve(listener, state).await?;
    Ok(())
}
