// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;

use iptv_catalog::{
    CatalogLoader, Config, CredentialStore, FileStore, HttpTransport, LoaderOptions,
    ReqwestTransport,
};

pub mod account;
pub mod catalog;
pub mod config;
pub mod play;
pub mod source;

pub use account::AccountCommand;
pub use catalog::{CatalogCommand, CatalogKind};
pub use config::ConfigCommand;
pub use play::PlayCommand;
pub use source::SourceCommand;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    M3u,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "m3u" => Ok(Self::M3u),
            _ => anyhow::bail!("Invalid format: {}. Use 'text', 'json', or 'm3u'", s),
        }
    }
}

/// Shared collaborators for command execution
pub struct CommandContext {
    pub config: Config,
    pub store: Arc<dyn CredentialStore>,
    pub transport: Arc<dyn HttpTransport>,
}

impl CommandContext {
    pub fn new(config: Config) -> Result<Self> {
        let store = FileStore::new().context("Failed to open credential store")?;
        let transport =
            ReqwestTransport::new(&config.network).context("Failed to build HTTP client")?;

        Ok(Self {
            config,
            store: Arc::new(store),
            transport: Arc::new(transport),
        })
    }

    pub fn loader(&self) -> CatalogLoader {
        CatalogLoader::new(
            Arc::clone(&self.store),
            Arc::clone(&self.transport),
            LoaderOptions::from(&self.config.network),
        )
    }
}

/// Lets a background refresh land in the cache before the process exits.
pub async fn await_refresh(refresh: Option<JoinHandle<()>>) -> bool {
    let Some(refresh) = refresh else {
        return true;
    };
    match refresh.await {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!("Background refresh task ended abnormally: {}", e);
            false
        }
    }
}
