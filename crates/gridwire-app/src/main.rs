use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gridwire_app::{RunOptions, demo_puzzle, load_config, run, stock_tileset};
use gridwire_storage::DocumentCodec;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "gridwire",
    version,
    about = "Build, run, and inspect gridwire puzzle documents"
)]
struct Cli {
    /// JSON puzzle configuration; defaults apply when omitted.
    #[arg(long, global = true, env = "GRIDWIRE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the stock demo puzzle and save it.
    Demo {
        #[arg(short, long, default_value = "demo.puzl")]
        out: PathBuf,
    },
    /// Load a puzzle, advance it, and print a JSON report.
    Run {
        file: PathBuf,
        #[arg(long, default_value_t = 30)]
        ticks: u64,
        /// Press the demo button every N ticks (0 disables).
        #[arg(long, default_value_t = 3)]
        press_every: u64,
        /// Skip sleeping for the configured tick interval.
        #[arg(long)]
        no_wait: bool,
        /// Write the advanced puzzle back to the file.
        #[arg(long)]
        save: bool,
    },
    /// Print the document header.
    Inspect { file: PathBuf },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let codec = DocumentCodec::new();

    match cli.command {
        Command::Demo { out } => {
            let puzzle = demo_puzzle(config, stock_tileset()?)?;
            codec
                .save(&puzzle, &out)
                .with_context(|| format!("failed to save {}", out.display()))?;
            info!(path = %out.display(), tiles = puzzle.tile_count(), "demo written");
        }
        Command::Run {
            file,
            ticks,
            press_every,
            no_wait,
            save,
        } => {
            let pace = (!no_wait).then(|| Duration::from_millis(config.tick_interval_ms));
            let mut puzzle = codec
                .load(&file, config, stock_tileset()?)
                .with_context(|| format!("failed to load {}", file.display()))?;
            let options = RunOptions {
                ticks,
                press_every,
                pace,
            };
            let report = run(&mut puzzle, &options)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to format run report")?
            );
            if save {
                codec
                    .save(&puzzle, &file)
                    .with_context(|| format!("failed to save {}", file.display()))?;
            }
        }
        Command::Inspect { file } => {
            let bytes =
                fs::read(&file).with_context(|| format!("failed to read {}", file.display()))?;
            let header = DocumentCodec::inspect(&bytes)
                .with_context(|| format!("{} is not a readable puzzle", file.display()))?;
            println!(
                "version {} tiles {} wires {} bytes {}",
                header.version,
                header.tiles,
                header.wires,
                bytes.len()
            );
        }
    }

    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}
