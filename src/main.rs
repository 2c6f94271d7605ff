use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tagging_rugby::{ConfigBuilder, logging, tui, utils};

/// tagging-rugby - tag a match video from the terminal while it plays in mpv
#[derive(Parser)]
#[command(name = "tagging-rugby")]
#[command(about = "Record notes, tackles and clips against a rugby video")]
#[command(version)]
struct Cli {
    /// The video file to annotate
    #[arg(value_name = "VIDEO")]
    video: PathBuf,

    /// Database file (default: {data_dir}/tagging-rugby/tagging.db)
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// mpv IPC socket path
    #[arg(long, value_name = "PATH")]
    socket: Option<PathBuf>,

    /// Player binary to launch
    #[arg(long, value_name = "BIN")]
    player: Option<String>,

    /// Encoder binary used for clip export
    #[arg(long, value_name = "BIN")]
    encoder: Option<String>,

    /// Copy streams instead of re-encoding exported clips
    #[arg(long)]
    stream_copy: bool,

    /// Attach to an already running player instead of launching one
    #[arg(long)]
    no_launch: bool,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let log_path = utils::get_log_path().ok();
    logging::init(log_path.as_deref());

    let mut builder = ConfigBuilder::new(cli.video)
        .stream_copy(cli.stream_copy)
        .launch_player(!cli.no_launch);
    if let Some(db) = cli.db {
        builder = builder.db_path(db);
    }
    if let Some(socket) = cli.socket {
        builder = builder.socket_path(socket);
    }
    if let Some(player) = cli.player {
        builder = builder.player(player);
    }
    if let Some(encoder) = cli.encoder {
        builder = builder.encoder(encoder);
    }
    let config = builder.build()?;

    tui::run(&config)
}
