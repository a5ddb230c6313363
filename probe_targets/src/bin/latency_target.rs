use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let addr = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("LATENCY_TARGET_ADDR").ok())
        .unwrap_or_else(|| "0.0.0.0:8081".to_string());

    info!("Starting latency target on {}", addr);
    info!("Endpoints:");
    info!("  GET /              - Immediate 200");
    info!("  GET /delay/:ms     - 200 after a delay (?jitter=ms adds random extra)");
    info!("  GET /status/:code  - Respond with the given status");
    info!("  GET /health        - Health check");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, probe_targets::router()).await?;

    Ok(())
}
