// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub logo: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub epg_id: String,
    #[serde(default = "default_live")]
    pub is_live: bool,
}

fn default_live() -> bool {
    true
}

impl Channel {
    pub fn playback_request(&self) -> PlaybackRequest {
        PlaybackRequest {
            name: self.name.clone(),
            url: self.url.clone(),
            logo: self.logo.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub channels: Vec<Channel>,
}

impl Category {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            channels: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Categories ordered by name, never containing an empty category.
///
/// Every constructor goes through [`Catalog::from_categories`], so a value of
/// this type always satisfies both rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Catalog {
    categories: Vec<Category>,
}

impl Catalog {
    pub fn from_categories(categories: impl IntoIterator<Item = Category>) -> Self {
        let mut categories: Vec<Category> =
            categories.into_iter().filter(|c| !c.is_empty()).collect();
        // Stable sort keeps source order between equally named categories.
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Self { categories }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn into_categories(self) -> Vec<Category> {
        self.categories
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn channel_count(&self) -> usize {
        self.categories.iter().map(|c| c.channels.len()).sum()
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.categories.iter().flat_map(|c| c.channels.iter())
    }

    pub fn find_channel(&self, id: &str) -> Option<&Channel> {
        self.channels().find(|channel| channel.id == id)
    }

    /// Fuzzy search on channel names, best match first.
    pub fn search(&self, query: &str) -> Vec<&Channel> {
        let matcher = SkimMatcherV2::default().ignore_case();
        let mut scored: Vec<(i64, &Channel)> = self
            .channels()
            .filter_map(|channel| {
                matcher
                    .fuzzy_match(&channel.name, query)
                    .map(|score| (score, channel))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().map(|(_, channel)| channel).collect()
    }
}

/// A resolved, ready-to-play channel handed to a playback surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackRequest {
    pub name: String,
    pub url: String,
    pub logo: String,
}
