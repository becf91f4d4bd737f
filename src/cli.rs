use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mediabox")]
#[command(about = "Media download service with engine fallback", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server and worker pool
    Server(ServerArgs),
    /// Print the engines that would be tried for a URL
    Select(SelectArgs),
    /// Check that every supported engine can run on this host
    Check(ConfigArgs),
}

#[derive(clap::Args, Debug)]
pub struct ConfigArgs {
    /// Configuration file (overrides MEDIABOX_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Address to bind the HTTP server to (overrides server.bind_addr)
    #[arg(long)]
    pub address: Option<SocketAddr>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(clap::Args, Debug)]
pub struct SelectArgs {
    /// Media URL
    pub url: String,

    /// Preferred engine
    #[arg(long)]
    pub engine: Option<String>,

    #[command(flatten)]
    pub config: ConfigArgs,
}
