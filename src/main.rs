//! Trivia session server - entry point
//!
//! Starts the TCP listener and session registry, accepting connections
//! until interrupted; Ctrl-C tears down every live session.

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use quizwire::{handle_connection, Config, ExactMatchJudge, SampleBoardProvider, SessionRegistry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=quizwire=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quizwire=info")),
        )
        .init();

    let config = Config::parse();

    // Stand-in collaborators; a deployment wires real content-generation
    // and judging services behind the same traits.
    let registry = Arc::new(SessionRegistry::new(
        config.clone(),
        Arc::new(SampleBoardProvider::new(config.value_multiplier)),
        Arc::new(ExactMatchJudge),
    ));

    let listener = TcpListener::bind(&config.bind).await?;
    info!("Trivia session server listening on {}", config.bind);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        info!("New connection from {}", addr);
                        let registry = Arc::clone(&registry);

                        // Spawn handler task for each connection
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, registry).await {
                                error!("Connection handler error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                registry.shutdown().await;
                break;
            }
        }
    }

    Ok(())
}
