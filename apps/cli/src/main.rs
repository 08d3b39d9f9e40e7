mod client;
mod flow;
mod prompt;

use clap::Parser;
use tracing_subscriber::prelude::*;

use client::ApiClient;

#[derive(Parser)]
#[command(name = "redub-cli", about = "Interactive terminal client for the redub job service")]
struct Cli {
    #[arg(long, env = "REDUB_API_BASE_URL", default_value = "http://localhost:8080")]
    base_url: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let client = ApiClient::new(cli.base_url);
    flow::run(&client).await;
}
