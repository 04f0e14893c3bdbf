use snakepit::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), SnakepitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let addr = std::env::var("SNAKEPIT_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    SnakepitServer::builder().bind(&addr).build().await?.run().await
}
