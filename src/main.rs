mod cli;
mod config;
mod document;
mod error;
mod model;
mod providers;
mod runner;
mod setup;
mod sync;
mod tags;
mod util;

use std::env;

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let command = cli::parse_args(&args)?;
    cli::run(command).await
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TESTSYNC_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "testsync=debug,info"
        } else {
            "testsync=info,warn"
        })
    });

    let format = env::var("TESTSYNC_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}
