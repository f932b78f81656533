use robovac::server;
use robovac::Runner;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

const TICK: Duration = Duration::from_millis(200);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let runner = Arc::new(Runner::new(TICK));
    let app = server::router(runner);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    tracing::info!("server running at http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app).await.expect("server error");
}
