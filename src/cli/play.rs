// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use super::{CommandContext, await_refresh};
use anyhow::Result;
use iptv_catalog::{Channel, CommandPlayer, PlaybackSurface};

pub enum PlayCommand {
    Query(String),
    Last,
}

impl PlayCommand {
    pub async fn execute(self, context: CommandContext) -> Result<()> {
        let player = CommandPlayer::new(context.config.player.clone());
        if !player.is_available() {
            eprintln!(
                "Warning: media player '{}' not found. Set [player] command in the config file.",
                context.config.player.command
            );
        }

        let loaded = context
            .loader()
            .load()
            .await
            .map_err(|e| anyhow::anyhow!("{} ({})", e.user_message(), e))?;
        let catalog = loaded.catalog;

        let channel: Channel = match self {
            Self::Query(query) => catalog
                .search(&query)
                .into_iter()
                .next()
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("No channel matches '{}'", query))?,
            Self::Last => {
                let id = context
                    .store
                    .last_channel()?
                    .ok_or_else(|| anyhow::anyhow!("No channel has been played yet"))?;
                catalog
                    .find_channel(&id)
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("Last played channel {} is gone", id))?
            }
        };

        context.store.save_last_channel(&channel.id)?;

        let request = channel.playback_request();
        let played = tokio::task::spawn_blocking(move || player.play(&request)).await?;

        await_refresh(loaded.refresh).await;

        played
    }
}
