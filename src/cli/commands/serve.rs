use anyhow::Result;
use clap::Args;

use crate::models::Config;
use crate::server::run_server;

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(long, help = "Address to bind (overrides server.host)")]
    pub host: Option<String>,

    #[arg(long, short = 'p', help = "Port to listen on (overrides server.port)")]
    pub port: Option<u16>,

    #[arg(long, help = "Skip indexing the built-in study material")]
    pub no_seed: bool,
}

pub async fn handle_serve(args: ServeArgs) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;

    let seed_corpus = config.server.seed_corpus && !args.no_seed;
    run_server(config, seed_corpus)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))
}
