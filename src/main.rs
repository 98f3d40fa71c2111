// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use anyhow::Result;
use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Parser, Subcommand};
use std::fs::File;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use iptv_catalog::{Config, SourceConfig};

mod cli;
use cli::{
    AccountCommand, CatalogCommand, CatalogKind, CommandContext, ConfigCommand, OutputFormat,
    PlayCommand, SourceCommand,
};

fn cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Green.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Cyan.on_default())
}

#[derive(Parser)]
#[command(name = "iptv-catalog")]
#[command(about = "Load IPTV channel catalogs from M3U playlists or Xtream Codes accounts")]
#[command(version)]
#[command(styles = cargo_style())]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging to file (iptv_catalog_debug.log)
    #[arg(long, global = true)]
    debug_log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the channel source
    #[command(subcommand)]
    Source(SourceSubcommand),

    /// Show the live channel catalog
    Catalog {
        /// Output format (text, json, m3u)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show the VOD catalog (Xtream sources only)
    Vod {
        /// Output format (text, json, m3u)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show Xtream account details
    Account,

    /// Play a channel by name
    Play {
        /// Channel name to search for
        #[arg(required_unless_present = "last")]
        query: Option<String>,
        /// Play the last played channel
        #[arg(long, conflicts_with = "query")]
        last: bool,
    },

    /// Manage the playlist cache
    #[command(subcommand)]
    Cache(CacheSubcommand),

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigSubcommand),
}

#[derive(Subcommand)]
enum SourceSubcommand {
    /// Use an M3U playlist url
    M3u { url: String },
    /// Use an Xtream Codes account
    Xtream {
        server: String,
        username: String,
        password: String,
    },
    /// Show the active source
    Show,
}

#[derive(Subcommand)]
enum ConfigSubcommand {
    /// Write a config file with the default settings
    Init {
        /// Overwrite an existing file, keeping a backup
        #[arg(long)]
        force: bool,
    },
    /// Print the config file location
    Path,
}

#[derive(Subcommand)]
enum CacheSubcommand {
    /// Clear the cached playlist
    Clear,
}

fn init_logging(cli: &Cli) -> Result<()> {
    if cli.debug_log {
        let file = File::create("iptv_catalog_debug.log")?;
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_level(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(file_layer)
            .with(
                EnvFilter::from_default_env()
                    .add_directive("iptv_catalog=debug".parse()?)
                    .add_directive("hyper_util=error".parse()?),
            )
            .init();
    } else if cli.verbose {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                EnvFilter::from_default_env()
                    .add_directive(tracing::Level::DEBUG.into())
                    .add_directive("hyper_util=error".parse()?),
            )
            .init();
    } else if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                EnvFilter::from_default_env().add_directive("hyper_util=error".parse()?),
            )
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let config_path = Config::default_path();
    // Config commands must work even when the store or client cannot be built.
    let command = match cli.command {
        Commands::Config(ConfigSubcommand::Init { force }) => {
            return ConfigCommand::Init { force }.execute(&config_path);
        }
        Commands::Config(ConfigSubcommand::Path) => {
            return ConfigCommand::Path.execute(&config_path);
        }
        command => command,
    };

    let config = Config::load_or_default(&config_path);
    let context = CommandContext::new(config)?;

    match command {
        Commands::Source(cmd) => {
            let cmd = match cmd {
                SourceSubcommand::M3u { url } => SourceCommand::Set(SourceConfig::M3u { url }),
                SourceSubcommand::Xtream {
                    server,
                    username,
                    password,
                } => SourceCommand::Set(SourceConfig::Xtream {
                    server,
                    username,
                    password,
                }),
                SourceSubcommand::Show => SourceCommand::Show,
            };
            cmd.execute(context).await?;
        }
        Commands::Catalog { format } => {
            let cmd = CatalogCommand {
                kind: CatalogKind::Live,
                format: OutputFormat::from_str(&format)?,
            };
            cmd.execute(context).await?;
        }
        Commands::Vod { format } => {
            let cmd = CatalogCommand {
                kind: CatalogKind::Vod,
                format: OutputFormat::from_str(&format)?,
            };
            cmd.execute(context).await?;
        }
        Commands::Account => AccountCommand.execute(context).await?,
        Commands::Play { query, last } => {
            let cmd = match query {
                Some(query) if !last => PlayCommand::Query(query),
                _ => PlayCommand::Last,
            };
            cmd.execute(context).await?;
        }
        Commands::Cache(CacheSubcommand::Clear) => {
            SourceCommand::ClearCache.execute(context).await?;
        }
        Commands::Config(_) => {}
    }

    Ok(())
}
