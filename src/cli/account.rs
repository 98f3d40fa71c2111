// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use super::CommandContext;
use anyhow::Result;
use iptv_catalog::{SourceConfig, XtreamClient, XtreamCredentials};
use std::sync::Arc;

pub struct AccountCommand;

impl AccountCommand {
    pub async fn execute(self, context: CommandContext) -> Result<()> {
        let Some(SourceConfig::Xtream {
            server,
            username,
            password,
        }) = context.store.source()?
        else {
            anyhow::bail!("Account details are only available for Xtream sources");
        };

        let client = XtreamClient::new(
            Arc::clone(&context.transport),
            XtreamCredentials::new(&server, &username, &password),
        );

        eprint!("Testing connection to {}... ", server);
        match client.authenticate().await {
            Ok(info) => {
                println!("✓ Connected");
                println!("  Account: {}", info.username);
                println!("  Status: {}", info.status);
                match info.expires_at() {
                    Some(expiry) => println!("  Expires: {}", expiry.format("%Y-%m-%d %H:%M UTC")),
                    None => println!("  Expires: never"),
                }
                println!(
                    "  Connections: {}/{}",
                    info.active_connections, info.max_connections
                );
            }
            Err(e) => {
                println!("✗ Failed");
                tracing::debug!("Authentication failed: {}", e);
            }
        }

        Ok(())
    }
}
