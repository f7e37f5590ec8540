//! `gazelog serve` - run the WebSocket logging server

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use gazelog_server::{GazelogServer, ServerConfig};
use tracing::info;

use crate::config::{ConfigLoader, GazelogConfig};

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Host to bind to (overrides config)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// CSV file to append completed records to
    #[arg(long)]
    pub csv_path: Option<PathBuf>,

    /// Robot label whose move durations are shortened by two seconds
    #[arg(long)]
    pub special_condition: Option<String>,
}

impl ServeArgs {
    /// Apply command-line overrides on top of the loaded config
    fn server_config(self, config: &GazelogConfig) -> ServerConfig {
        let mut server = config.server_config();
        if let Some(host) = self.host {
            server.host = host;
        }
        if let Some(port) = self.port {
            server.port = port;
        }
        if let Some(csv_path) = self.csv_path {
            server.csv_path = csv_path;
        }
        if let Some(condition) = self.special_condition {
            server.special_condition = condition;
        }
        server
    }
}

pub async fn run(args: ServeArgs) -> Result<()> {
    let config = ConfigLoader::load()?;
    let server_config = args.server_config(&config);

    info!(
        csv = %server_config.csv_path.display(),
        special_condition = %server_config.special_condition,
        "Starting gazelog server on {}",
        server_config.addr()
    );

    GazelogServer::with_csv_sink(server_config)
        .await?
        .run()
        .await?;

    Ok(())
}
