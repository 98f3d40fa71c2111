// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use crate::config::SourceConfig;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// Persistent home of the source configuration and the last playlist text.
pub trait CredentialStore: Send + Sync {
    fn source(&self) -> Result<Option<SourceConfig>>;
    fn save_source(&self, source: &SourceConfig) -> Result<()>;

    fn cached_playlist(&self) -> Result<Option<CachedPlaylist>>;
    fn save_cached_playlist(&self, url: &str, text: &str) -> Result<()>;
    fn clear_cached_playlist(&self) -> Result<()>;

    fn last_channel(&self) -> Result<Option<String>>;
    fn save_last_channel(&self, channel_id: &str) -> Result<()>;

    /// Activates `source`. The cached playlist only survives when the same
    /// M3U url stays active.
    fn set_source(&self, source: &SourceConfig) -> Result<()> {
        let keep_cache = matches!(
            (self.source()?, source),
            (Some(SourceConfig::M3u { url: old }), SourceConfig::M3u { url: new }) if old == *new
        );
        if !keep_cache {
            self.clear_cached_playlist()?;
        }
        self.save_source(source)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub url: String,
    pub fetched_at: DateTime<Utc>,
}

impl CacheMetadata {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            fetched_at: Utc::now(),
        }
    }

    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.fetched_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPlaylist {
    pub metadata: CacheMetadata,
    pub text: String,
}

#[derive(Debug)]
pub struct FileStore {
    config_dir: PathBuf,
    cache_dir: PathBuf,
}

impl FileStore {
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join("iptv-catalog");
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine cache directory"))?
            .join("iptv-catalog");
        Self::with_dirs(config_dir, cache_dir)
    }

    pub fn with_dirs(config_dir: PathBuf, cache_dir: PathBuf) -> Result<Self> {
        for dir in [&config_dir, &cache_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        Ok(Self {
            config_dir,
            cache_dir,
        })
    }

    fn source_path(&self) -> PathBuf {
        self.config_dir.join("source.toml")
    }

    fn last_channel_path(&self) -> PathBuf {
        self.config_dir.join("last_channel")
    }

    fn playlist_path(&self) -> PathBuf {
        self.cache_dir.join("playlist.m3u")
    }

    fn metadata_path(&self) -> PathBuf {
        self.cache_dir.join("playlist.json")
    }
}

/// Readers see either the old file or the new one, never a partial write.
/// `playlist.m3u` and `playlist.json` share a stem, so the temp name keeps
/// the whole file name.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let tmp = temp_path(path);
    fs::write(&tmp, content)
        .with_context(|| format!("Failed to write file: {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace file: {}", path.display()))?;
    Ok(())
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    Ok(Some(content))
}

fn remove_optional(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path)
            .with_context(|| format!("Failed to remove file: {}", path.display()))?;
    }
    Ok(())
}

impl CredentialStore for FileStore {
    fn source(&self) -> Result<Option<SourceConfig>> {
        read_optional(&self.source_path())?
            .map(|content| {
                toml::from_str(&content).with_context(|| "Failed to parse source configuration")
            })
            .transpose()
    }

    fn save_source(&self, source: &SourceConfig) -> Result<()> {
        let content = toml::to_string_pretty(source)
            .with_context(|| "Failed to serialize source configuration")?;
        write_atomic(&self.source_path(), &content)
    }

    fn cached_playlist(&self) -> Result<Option<CachedPlaylist>> {
        let Some(text) = read_optional(&self.playlist_path())? else {
            return Ok(None);
        };
        let Some(metadata) = read_optional(&self.metadata_path())? else {
            return Ok(None);
        };
        let metadata: CacheMetadata = serde_json::from_str(&metadata)
            .with_context(|| "Failed to parse playlist cache metadata")?;
        Ok(Some(CachedPlaylist { metadata, text }))
    }

    fn save_cached_playlist(&self, url: &str, text: &str) -> Result<()> {
        let metadata = serde_json::to_string_pretty(&CacheMetadata::new(url))
            .with_context(|| "Failed to serialize playlist cache metadata")?;
        write_atomic(&self.playlist_path(), text)?;
        write_atomic(&self.metadata_path(), &metadata)
    }

    fn clear_cached_playlist(&self) -> Result<()> {
        remove_optional(&self.metadata_path())?;
        remove_optional(&self.playlist_path())
    }

    fn last_channel(&self) -> Result<Option<String>> {
        Ok(read_optional(&self.last_channel_path())?
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty()))
    }

    fn save_last_channel(&self, channel_id: &str) -> Result<()> {
        write_atomic(&self.last_channel_path(), channel_id)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    source: Option<SourceConfig>,
    playlist: Option<CachedPlaylist>,
    last_channel: Option<String>,
}

/// Store that lives and dies with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&MemoryState) -> T) -> T {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write(&self, f: impl FnOnce(&mut MemoryState)) {
        f(&mut self.state.write().unwrap_or_else(PoisonError::into_inner))
    }
}

impl CredentialStore for MemoryStore {
    fn source(&self) -> Result<Option<SourceConfig>> {
        Ok(self.read(|s| s.source.clone()))
    }

    fn save_source(&self, source: &SourceConfig) -> Result<()> {
        self.write(|s| s.source = Some(source.clone()));
        Ok(())
    }

    fn cached_playlist(&self) -> Result<Option<CachedPlaylist>> {
        Ok(self.read(|s| s.playlist.clone()))
    }

    fn save_cached_playlist(&self, url: &str, text: &str) -> Result<()> {
        let playlist = CachedPlaylist {
            metadata: CacheMetadata::new(url),
            text: text.to_string(),
        };
        self.write(|s| s.playlist = Some(playlist));
        Ok(())
    }

    fn clear_cached_playlist(&self) -> Result<()> {
        self.write(|s| s.playlist = None);
        Ok(())
    }

    fn last_channel(&self) -> Result<Option<String>> {
        Ok(self.read(|s| s.last_channel.clone()))
    }

    fn save_last_channel(&self, channel_id: &str) -> Result<()> {
        self.write(|s| s.last_channel = Some(channel_id.to_string()));
        Ok(())
    }
}
