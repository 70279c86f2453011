use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

use crate::{dispatcher::Variant, server::ServerConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Socket address the relay should bind to. Use port 0 for an ephemeral port.
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Directory served for every path other than /ws and /stats.
    #[arg(long, default_value = "static")]
    pub static_dir: PathBuf,

    /// What non-selected peers receive: a fixed greeting, or the sender's message.
    #[arg(long, value_enum, default_value_t = Variant::Greeting)]
    pub variant: Variant,

    /// Seed for marker selection, for reproducible runs.
    #[arg(long)]
    pub seed: Option<u64>,
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        Self {
            listen: cli.listen,
            static_dir: cli.static_dir,
            variant: cli.variant,
            seed: cli.seed,
        }
    }
}
