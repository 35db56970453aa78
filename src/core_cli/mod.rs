use clap::Parser;

use crate::constants::DEFAULT_FTP_PORT;

/// Command-line arguments for the server daemon
#[derive(Parser, Debug)]
#[command(name = "ferroftpd", about = "An FTP server written in Rust.")]
pub struct ServerCli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "/etc/ferroftpd.conf")]
    pub config: String,

    /// Override the configured listen port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Write log output to this file instead of stderr
    #[arg(short, long)]
    pub log: Option<String>,
}

/// Command-line arguments for the interactive client
#[derive(Parser, Debug)]
#[command(name = "ferroftp", about = "An interactive FTP client written in Rust.")]
pub struct ClientCli {
    /// FQDN or IP address of the remote host to connect to
    pub host: String,

    /// Port to connect to
    #[arg(default_value_t = DEFAULT_FTP_PORT)]
    pub port: u16,

    /// Write log output to this file instead of stderr
    #[arg(short, long)]
    pub log: Option<String>,
}
