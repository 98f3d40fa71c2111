// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use super::CommandContext;
use anyhow::Result;
use iptv_catalog::SourceConfig;

pub enum SourceCommand {
    Set(SourceConfig),
    Show,
    ClearCache,
}

impl SourceCommand {
    pub async fn execute(self, context: CommandContext) -> Result<()> {
        match self {
            Self::Set(source) => {
                context.store.set_source(&source)?;
                println!("Active source set to {}", source.kind());
            }
            Self::Show => match context.store.source()? {
                Some(SourceConfig::M3u { url }) => {
                    println!("Source: m3u");
                    println!("  URL: {}", url);
                    match context.store.cached_playlist()? {
                        Some(cached) => println!(
                            "  Cached: {} bytes, {} minutes old",
                            cached.text.len(),
                            cached.metadata.age().num_minutes()
                        ),
                        None => println!("  Cached: no"),
                    }
                }
                Some(SourceConfig::Xtream {
                    server, username, ..
                }) => {
                    println!("Source: xtream");
                    println!("  Server: {}", server);
                    println!("  Username: {}", username);
                }
                None => println!("No source configured"),
            },
            Self::ClearCache => {
                context.store.clear_cached_playlist()?;
                println!("Playlist cache cleared");
            }
        }

        Ok(())
    }
}
