// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use super::{CommandContext, OutputFormat, await_refresh};
use anyhow::Result;
use iptv_catalog::{CacheState, Catalog, m3u};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Live,
    Vod,
}

pub struct CatalogCommand {
    pub kind: CatalogKind,
    pub format: OutputFormat,
}

impl CatalogCommand {
    pub async fn execute(self, context: CommandContext) -> Result<()> {
        let loader = context.loader();
        let result = match self.kind {
            CatalogKind::Live => loader.load().await,
            CatalogKind::Vod => loader.load_vod().await,
        };

        let loaded = match result {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::debug!("Catalog load failed: {}", e);
                eprintln!("{}", e.user_message());
                print_catalog(&Catalog::default(), self.format)?;
                return Ok(());
            }
        };

        if loaded.state == CacheState::CacheHit {
            eprintln!("Showing cached playlist, refreshing in background...");
        }
        print_catalog(&loaded.catalog, self.format)?;

        // The process is about to exit; let the refresh land in the cache first.
        await_refresh(loaded.refresh).await;

        Ok(())
    }
}

fn print_catalog(catalog: &Catalog, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(catalog)?);
        }
        OutputFormat::M3u => {
            print!("{}", m3u::to_m3u(catalog));
        }
        OutputFormat::Text => {
            if catalog.is_empty() {
                println!("No channels");
                return Ok(());
            }
            for category in catalog.categories() {
                println!("{} ({} channels)", category.name, category.channels.len());
                for channel in &category.channels {
                    println!("  [{}] {}", channel.id, channel.name);
                }
            }
            println!(
                "\n{} categories, {} channels",
                catalog.categories().len(),
                catalog.channel_count()
            );
        }
    }
    Ok(())
}
