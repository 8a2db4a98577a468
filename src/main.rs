use foodgram::{make_router, run_app, Config};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(error) => {
            error!("Error: {error:#}");
            std::process::exit(1);
        }
    };
    info!("Server starting on {}", config.bind_address);
    if let Err(error) = run_app(make_router(), config).await {
        error!("Error: {error:#}");
        std::process::exit(1);
    }
}
