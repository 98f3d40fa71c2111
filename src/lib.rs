// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

pub mod catalog;
pub mod config;
pub mod error;
pub mod loader;
pub mod m3u;
pub mod player;
pub mod store;
pub mod transport;
pub mod xtream_api;

pub use catalog::{Catalog, Category, Channel, PlaybackRequest};
pub use config::{Config, SourceConfig};
pub use error::{CatalogError, ClientError, TransportError};
pub use loader::{CacheState, CatalogLoader, LoadedCatalog, LoaderOptions};
pub use player::{CommandPlayer, PlaybackSurface};
pub use store::{CredentialStore, FileStore, MemoryStore};
pub use transport::{HttpTransport, ReqwestTransport};
pub use xtream_api::{UserInfo, XtreamClient, XtreamCredentials};
