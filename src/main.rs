//! turnselect HTTP server
//!
//! Starts an Axum web server that answers "which TURN relay should this
//! session use?" from live relay health scores.

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use turnselect::{
    cli::{Cli, Command, generate_config_template},
    config::Config,
    handlers::{self, AppState},
    telemetry,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Config { output }) => {
            match output {
                Some(path) => {
                    std::fs::write(&path, generate_config_template())?;
                    println!("Wrote configuration template to {}", path);
                }
                None => print!("{}", generate_config_template()),
            }
            return Ok(());
        }
        Some(Command::Check) => {
            let config = Config::from_file(&cli.config)?;
            let servers = config.servers()?;
            for server in &servers {
                println!("{}\t{}", server.name(), server.host());
            }
            println!("{} TURN server(s) configured", servers.len());
            return Ok(());
        }
        None => {}
    }

    let config = Arc::new(Config::from_file(&cli.config)?);

    telemetry::init(&config.observability.log_level);

    tracing::info!(
        "Starting turnselect server on {}:{}",
        config.server.host,
        config.server.port
    );

    let state = AppState::new(config.clone())?;
    let app = handlers::router(state);

    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .unwrap_or_else(|_| std::net::IpAddr::from([0, 0, 0, 0])),
        config.server.port,
    ));

    tracing::info!("Listening on {}", addr);
    tracing::info!("Best relay available at http://{}/v1/turn/best", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
