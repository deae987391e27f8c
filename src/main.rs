// Author: Lukas Bower
// Purpose: CLI entry point for the nine-vault file server.

use anyhow::Result;
use clap::Parser;
use nine_vault::Fsys;

/// In-memory 9P2000 file server.
///
/// nine-vault serves a hierarchical file tree kept entirely in process
/// memory; no external storage is used. File data is allocated in 2 MiB
/// blocks. The root is owned by the host owner with mode 0755, and the
/// server seeds /adm/ctl, /adm/group and /<hostowner> at start-up.
#[derive(Debug, Parser)]
#[command(name = "nine-vault", version)]
struct Args {
    /// Service listen address.
    #[arg(long, default_value = "localhost:5640")]
    addr: String,

    /// Stream-oriented network.
    #[arg(long = "net", default_value = "tcp")]
    network: String,

    /// Host owner; defaults to $USER.
    #[arg(long)]
    hostowner: Option<String>,

    /// Log every 9P2000 message.
    #[arg(short = 'D', long)]
    chatty: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let filter = if args.chatty { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let owner = args
        .hostowner
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_default();
    let fs = Fsys::new(&owner);
    fs.listen(&args.network, &args.addr)?;
    Ok(())
}
