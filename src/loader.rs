// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! Catalog loading with a stale-while-revalidate playlist cache.
//!
//! M3U sources are served from the cached playlist text when it parses to a
//! non-empty catalog, while one detached task fetches a fresh copy for the
//! next start. Xtream sources are always fetched live.

use crate::catalog::Catalog;
use crate::config::{NetworkConfig, SourceConfig};
use crate::error::CatalogError;
use crate::m3u;
use crate::store::CredentialStore;
use crate::transport::HttpTransport;
use crate::xtream_api::{StreamKind, XtreamClient, XtreamCredentials};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Nothing usable was cached; the last load fetched synchronously.
    NoCache,
    /// The last load was served from the cached playlist.
    CacheHit,
    /// Served from cache and the background refresh is still running.
    Refreshing,
}

#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub user_agent: String,
    pub max_concurrent_requests: usize,
}

impl From<&NetworkConfig> for LoaderOptions {
    fn from(config: &NetworkConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_concurrent_requests: config.max_concurrent_requests,
        }
    }
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self::from(&NetworkConfig::default())
    }
}

#[derive(Debug)]
pub struct LoadedCatalog {
    pub catalog: Catalog,
    pub state: CacheState,
    /// Handle of the background refresh spawned on a cache hit. Dropping it
    /// detaches the task; it is never awaited by `load` itself.
    pub refresh: Option<JoinHandle<()>>,
}

/// Every state change bumps `generation`, so a refresh task can tell whether
/// a later load has taken over since it was spawned.
#[derive(Debug)]
struct StateSlot {
    state: CacheState,
    generation: u64,
}

pub struct CatalogLoader {
    store: Arc<dyn CredentialStore>,
    transport: Arc<dyn HttpTransport>,
    options: LoaderOptions,
    state: Arc<Mutex<StateSlot>>,
}

impl CatalogLoader {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        transport: Arc<dyn HttpTransport>,
        options: LoaderOptions,
    ) -> Self {
        Self {
            store,
            transport,
            options,
            state: Arc::new(Mutex::new(StateSlot {
                state: CacheState::NoCache,
                generation: 0,
            })),
        }
    }

    pub fn state(&self) -> CacheState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state
    }

    fn set_state(&self, state: CacheState) -> u64 {
        let mut slot = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        slot.generation = slot.generation.wrapping_add(1);
        slot.state = state;
        slot.generation
    }

    fn active_source(&self) -> Result<SourceConfig, CatalogError> {
        self.store
            .source()
            .map_err(|e| CatalogError::SourceUnavailable(format!("{:#}", e)))?
            .ok_or_else(|| CatalogError::SourceUnavailable("no source configured".to_string()))
    }

    /// Loads the live catalog of the active source.
    pub async fn load(&self) -> Result<LoadedCatalog, CatalogError> {
        match self.active_source()? {
            SourceConfig::M3u { url } => self.load_m3u(&url).await,
            SourceConfig::Xtream {
                server,
                username,
                password,
            } => {
                let credentials = XtreamCredentials::new(&server, &username, &password);
                self.load_xtream(credentials, StreamKind::Live).await
            }
        }
    }

    /// Loads the VOD catalog; only Xtream sources have one.
    pub async fn load_vod(&self) -> Result<LoadedCatalog, CatalogError> {
        match self.active_source()? {
            SourceConfig::M3u { .. } => Err(CatalogError::SourceUnavailable(
                "VOD catalogs need an Xtream source".to_string(),
            )),
            SourceConfig::Xtream {
                server,
                username,
                password,
            } => {
                let credentials = XtreamCredentials::new(&server, &username, &password);
                self.load_xtream(credentials, StreamKind::Vod).await
            }
        }
    }

    fn cached_catalog(&self, url: &str) -> Option<Catalog> {
        let cached = match self.store.cached_playlist() {
            Ok(Some(cached)) => cached,
            Ok(None) => return None,
            Err(e) => {
                warn!("Ignoring unreadable playlist cache: {:#}", e);
                return None;
            }
        };

        if cached.metadata.url != url || cached.text.trim().is_empty() {
            return None;
        }

        let catalog = m3u::parse(&cached.text);
        if catalog.is_empty() {
            return None;
        }

        debug!(
            "Serving {} cached channels fetched at {}",
            catalog.channel_count(),
            cached.metadata.fetched_at
        );
        Some(catalog)
    }

    async fn load_m3u(&self, url: &str) -> Result<LoadedCatalog, CatalogError> {
        if let Some(catalog) = self.cached_catalog(url) {
            let refresh = self.spawn_refresh(url.to_string());
            return Ok(LoadedCatalog {
                catalog,
                state: CacheState::CacheHit,
                refresh: Some(refresh),
            });
        }

        self.set_state(CacheState::NoCache);
        let text = fetch_playlist(self.transport.as_ref(), url, &self.options.user_agent).await?;
        let catalog = m3u::parse(&text);
        if catalog.is_empty() {
            return Err(CatalogError::EmptyResult);
        }

        if let Err(e) = self.store.save_cached_playlist(url, &text) {
            warn!("Failed to cache playlist: {:#}", e);
        }

        Ok(LoadedCatalog {
            catalog,
            state: CacheState::NoCache,
            refresh: None,
        })
    }

    fn spawn_refresh(&self, url: String) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let transport = Arc::clone(&self.transport);
        let user_agent = self.options.user_agent.clone();
        let state = Arc::clone(&self.state);

        let generation = self.set_state(CacheState::Refreshing);
        tokio::spawn(async move {
            match fetch_playlist(transport.as_ref(), &url, &user_agent).await {
                // A body that parses to nothing must not replace a usable cache.
                Ok(text) if m3u::parse(&text).is_empty() => {
                    debug!("Background refresh returned an empty playlist, keeping cache");
                }
                Ok(text) => match store.save_cached_playlist(&url, &text) {
                    Ok(()) => info!("Playlist cache refreshed ({} bytes)", text.len()),
                    Err(e) => warn!("Failed to store refreshed playlist: {:#}", e),
                },
                Err(e) => debug!("Background playlist refresh failed: {}", e),
            }
            finish_refresh(&state, generation);
        })
    }

    async fn load_xtream(
        &self,
        credentials: XtreamCredentials,
        kind: StreamKind,
    ) -> Result<LoadedCatalog, CatalogError> {
        self.set_state(CacheState::NoCache);
        let client = XtreamClient::new(Arc::clone(&self.transport), credentials);

        let info = client.authenticate().await?;
        if !info.is_active() {
            return Err(CatalogError::SourceUnavailable(format!(
                "account status is {:?}",
                info.status
            )));
        }

        let concurrency = match info.max_connections {
            0 => self.options.max_concurrent_requests,
            max => self.options.max_concurrent_requests.min(max as usize),
        };
        let catalog = client.fetch_catalog(kind, concurrency).await?;
        if catalog.is_empty() {
            return Err(CatalogError::EmptyResult);
        }

        Ok(LoadedCatalog {
            catalog,
            state: CacheState::NoCache,
            refresh: None,
        })
    }
}

/// Settles a refresh back to `CacheHit`, unless another load changed the
/// state after this refresh was spawned.
fn finish_refresh(slot: &Mutex<StateSlot>, generation: u64) {
    let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.generation == generation {
        slot.state = CacheState::CacheHit;
    } else {
        debug!("Refresh finished after a newer load, leaving state alone");
    }
}

async fn fetch_playlist(
    transport: &dyn HttpTransport,
    url: &str,
    user_agent: &str,
) -> Result<String, CatalogError> {
    debug!("Fetching playlist");
    let response = transport.fetch(url, &[("User-Agent", user_agent)]).await?;
    if !response.is_success() {
        return Err(CatalogError::SourceUnavailable(format!(
            "playlist request failed with status: {}",
            response.status
        )));
    }
    Ok(response.body)
}
