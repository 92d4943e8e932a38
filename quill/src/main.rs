use std::path::PathBuf;

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::info;

use quill::quill::SiteConfig;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the feed over HTTP (default).
    Serve,
    /// Write the feed to `<out>/rss.xml` and exit.
    Build {
        /// Output directory; defaults to `paths.out_dir`.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    let cli = Cli::parse();
    let config = SiteConfig::load();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            info!("Sharpening the quill...");
            quill::run(config).await?;
        }
        Command::Build { out } => {
            quill::build(&config, out.as_deref())?;
        }
    }
    Ok(())
}
