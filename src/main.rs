// ABOUTME: CLI entry point for schemafetcher
// ABOUTME: Sets up logging and environment, then hands off to command dispatch

use schemafetcher::commands::{self, Runtime};
use schemafetcher::credentials::{TerminalPrompt, DATABASE_URL_ENV};
use schemafetcher::process::SystemRunner;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is normal; variables already set take precedence
    let _ = dotenv::dotenv();

    // Initialize logging - default to INFO level if RUST_LOG not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let runtime = Runtime {
        runner: &SystemRunner,
        prompt: &TerminalPrompt,
        env_database_url: std::env::var(DATABASE_URL_ENV).ok(),
    };

    ExitCode::from(commands::run(std::env::args_os(), &runtime).await)
}
