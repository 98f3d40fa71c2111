// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use crate::catalog::{Catalog, Category, Channel};
use crate::error::ClientError;
use crate::transport::HttpTransport;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

const LIVE_EXTENSION: &str = "m3u8";
const DEFAULT_VOD_EXTENSION: &str = "mp4";

fn deserialize_lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Value = Deserialize::deserialize(deserializer)?;

    Ok(match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

fn deserialize_lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Value = Deserialize::deserialize(deserializer)?;

    Ok(match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()).unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub username: String,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub status: String,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub exp_date: String,
    #[serde(
        default,
        rename = "active_cons",
        deserialize_with = "deserialize_lenient_u32"
    )]
    pub active_connections: u32,
    #[serde(default, deserialize_with = "deserialize_lenient_u32")]
    pub max_connections: u32,
}

impl UserInfo {
    pub fn is_active(&self) -> bool {
        self.status == "Active"
    }

    /// `exp_date` is a unix timestamp; unlimited accounts send null or "".
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let secs: i64 = self.exp_date.trim().parse().ok()?;
        DateTime::from_timestamp(secs, 0)
    }
}

#[derive(Debug, Default, Deserialize)]
struct WireCategory {
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    category_id: String,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    category_name: String,
}

#[derive(Debug, Default, Deserialize)]
struct WireStream {
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    stream_id: String,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    name: String,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    stream_icon: String,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    category_id: String,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    epg_channel_id: String,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    container_extension: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Live,
    Vod,
}

impl StreamKind {
    fn categories_action(self) -> &'static str {
        match self {
            Self::Live => "get_live_categories",
            Self::Vod => "get_vod_categories",
        }
    }

    fn streams_action(self) -> &'static str {
        match self {
            Self::Live => "get_live_streams",
            Self::Vod => "get_vod_streams",
        }
    }

    fn path_segment(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Vod => "movie",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XtreamCredentials {
    pub server: String,
    pub username: String,
    pub password: String,
}

impl XtreamCredentials {
    pub fn new(server: &str, username: &str, password: &str) -> Self {
        Self {
            server: server.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        self.server.trim_end_matches('/')
    }

    pub fn stream_url(&self, kind: StreamKind, stream_id: &str, extension: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}.{}",
            self.base_url(),
            kind.path_segment(),
            self.username,
            self.password,
            stream_id,
            extension
        )
    }
}

pub struct XtreamClient {
    transport: Arc<dyn HttpTransport>,
    credentials: XtreamCredentials,
}

impl XtreamClient {
    pub fn new(transport: Arc<dyn HttpTransport>, credentials: XtreamCredentials) -> Self {
        Self {
            transport,
            credentials,
        }
    }

    pub fn credentials(&self) -> &XtreamCredentials {
        &self.credentials
    }

    fn api_url(&self, action: Option<&str>, category_id: Option<&str>) -> String {
        let mut url = format!(
            "{}/player_api.php?username={}&password={}",
            self.credentials.base_url(),
            urlencoding::encode(&self.credentials.username),
            urlencoding::encode(&self.credentials.password)
        );

        if let Some(action) = action {
            url.push_str(&format!("&action={}", action));
        }
        if let Some(cat_id) = category_id {
            url.push_str(&format!("&category_id={}", urlencoding::encode(cat_id)));
        }

        url
    }

    async fn make_request<T>(
        &self,
        action: Option<&str>,
        category_id: Option<&str>,
    ) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
    {
        let url = self.api_url(action, category_id);
        debug!(
            "Xtream request (action: {}, category: {:?})",
            action.unwrap_or("authenticate"),
            category_id
        );

        let response = self.transport.fetch(&url, &[]).await?;

        if !response.is_success() {
            return Err(ClientError(format!(
                "HTTP request failed with status: {}",
                response.status
            )));
        }

        serde_json::from_str(&response.body).map_err(|e| {
            warn!("JSON parsing error for {:?}: {}", action, e);
            ClientError(format!("Failed to parse response: {}", e))
        })
    }

    /// List actions answer with an array; some servers send `null` when empty.
    async fn list_request<T>(
        &self,
        action: &str,
        category_id: Option<&str>,
    ) -> Result<Vec<T>, ClientError>
    where
        T: DeserializeOwned,
    {
        let items: Option<Vec<T>> = self.make_request(Some(action), category_id).await?;
        Ok(items.unwrap_or_default())
    }

    /// Checks the credentials. Callers decide what to do with the status.
    pub async fn authenticate(&self) -> Result<UserInfo, ClientError> {
        let mut response: Value = self.make_request(None, None).await?;

        // Only an object carrying a `user_info` object counts as a login.
        match response.get_mut("user_info").map(Value::take) {
            Some(value @ Value::Object(_)) => serde_json::from_value(value)
                .map_err(|e| ClientError(format!("Invalid user_info: {}", e))),
            _ => Err(ClientError("Response has no user_info object".to_string())),
        }
    }

    async fn get_categories(&self, kind: StreamKind) -> Result<Vec<Category>, ClientError> {
        let categories: Vec<WireCategory> =
            self.list_request(kind.categories_action(), None).await?;

        Ok(categories
            .into_iter()
            .map(|c| Category::new(c.category_id, c.category_name))
            .collect())
    }

    async fn get_streams(
        &self,
        kind: StreamKind,
        category_id: Option<&str>,
    ) -> Result<Vec<Channel>, ClientError> {
        let streams: Vec<WireStream> = self
            .list_request(kind.streams_action(), category_id)
            .await?;

        Ok(streams
            .into_iter()
            .map(|stream| self.stream_to_channel(kind, stream))
            .collect())
    }

    fn stream_to_channel(&self, kind: StreamKind, stream: WireStream) -> Channel {
        let extension = match kind {
            StreamKind::Live => LIVE_EXTENSION,
            StreamKind::Vod if stream.container_extension.is_empty() => DEFAULT_VOD_EXTENSION,
            StreamKind::Vod => stream.container_extension.as_str(),
        };
        let url = self
            .credentials
            .stream_url(kind, &stream.stream_id, extension);

        Channel {
            url,
            id: stream.stream_id,
            name: stream.name,
            logo: stream.stream_icon,
            group: stream.category_id,
            epg_id: match kind {
                StreamKind::Live => stream.epg_channel_id,
                StreamKind::Vod => String::new(),
            },
            is_live: kind == StreamKind::Live,
        }
    }

    pub async fn get_live_categories(&self) -> Result<Vec<Category>, ClientError> {
        self.get_categories(StreamKind::Live).await
    }

    pub async fn get_live_streams(
        &self,
        category_id: Option<&str>,
    ) -> Result<Vec<Channel>, ClientError> {
        self.get_streams(StreamKind::Live, category_id).await
    }

    pub async fn get_vod_categories(&self) -> Result<Vec<Category>, ClientError> {
        self.get_categories(StreamKind::Vod).await
    }

    pub async fn get_vod_streams(
        &self,
        category_id: Option<&str>,
    ) -> Result<Vec<Channel>, ClientError> {
        self.get_streams(StreamKind::Vod, category_id).await
    }

    /// Category list, then one stream request per category with at most
    /// `concurrency` in flight. A category whose request fails counts as
    /// empty; only the category list itself can fail the whole build.
    pub async fn fetch_catalog(
        &self,
        kind: StreamKind,
        concurrency: usize,
    ) -> Result<Catalog, ClientError> {
        let categories = self.get_categories(kind).await?;
        debug!(
            "Populating {} {:?} categories ({} concurrent requests)",
            categories.len(),
            kind,
            concurrency.max(1)
        );

        let populated: Vec<Category> = futures_util::stream::iter(categories)
            .map(|mut category| async move {
                match self.get_streams(kind, Some(&category.id)).await {
                    Ok(channels) => category.channels = channels,
                    Err(e) => warn!(
                        "Skipping category {} ({}): {}",
                        category.name, category.id, e
                    ),
                }
                category
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        Ok(Catalog::from_categories(populated))
    }

    pub async fn fetch_live_catalog(&self, concurrency: usize) -> Result<Catalog, ClientError> {
        self.fetch_catalog(StreamKind::Live, concurrency).await
    }

    pub async fn fetch_vod_catalog(&self, concurrency: usize) -> Result<Catalog, ClientError> {
        self.fetch_catalog(StreamKind::Vod, concurrency).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use std::time::Duration;

    const AUTH_OK: &str = r#"{
        "user_info": {
            "username": "alice",
            "password": "secret",
            "auth": 1,
            "status": "Active",
            "exp_date": "1767225600",
            "active_cons": "0",
            "max_connections": "2"
        },
        "server_info": {"url": "provider.example", "port": "8080"}
    }"#;

    const CATEGORIES: &str = r#"[
        {"category_id": "1", "category_name": "News", "parent_id": 0},
        {"category_id": 2, "category_name": "Sports", "parent_id": 0},
        {"category_id": "3", "category_name": "Empty", "parent_id": 0}
    ]"#;

    const NEWS_STREAMS: &str = r#"[
        {"num": 1, "name": "CNN", "stream_type": "live", "stream_id": 101,
         "stream_icon": "http://x/cnn.png", "epg_channel_id": "cnn.us", "category_id": "1"},
        {"num": 2, "name": "BBC World", "stream_type": "live", "stream_id": "102",
         "stream_icon": "", "epg_channel_id": null, "category_id": "1"}
    ]"#;

    const SPORTS_STREAMS: &str = r#"[
        {"num": 3, "name": "ESPN", "stream_type": "live", "stream_id": 201, "category_id": "2"}
    ]"#;

    fn mock_client(transport: MockTransport) -> (XtreamClient, Arc<MockTransport>) {
        let transport = Arc::new(transport);
        let client = XtreamClient::new(
            transport.clone(),
            XtreamCredentials::new("http://provider.example:8080/", "alice", "secret"),
        );
        (client, transport)
    }

    #[tokio::test]
    async fn test_authenticate_parses_user_info() {
        let (client, transport) = mock_client(MockTransport::new().route("player_api.php", 200, AUTH_OK));

        let info = client.authenticate().await.unwrap();
        assert_eq!(info.username, "alice");
        assert!(info.is_active());
        assert_eq!(info.active_connections, 0);
        assert_eq!(info.max_connections, 2);
        assert_eq!(
            info.expires_at().map(|d| d.to_rfc3339()),
            Some("2026-01-01T00:00:00+00:00".to_string())
        );

        let requests = transport.requests.lock().unwrap();
        assert_eq!(
            requests[0],
            "http://provider.example:8080/player_api.php?username=alice&password=secret"
        );
    }

    #[tokio::test]
    async fn test_authenticate_without_user_info_fails() {
        let (client, _) = mock_client(MockTransport::new().route("player_api.php", 200, r#"{"foo": 1}"#));
        assert!(client.authenticate().await.is_err());

        let (client, _) =
            client_with_body(r#"{"user_info": null, "server_info": {}}"#);
        assert!(client.authenticate().await.is_err());
    }

    fn client_with_body(body: &str) -> (XtreamClient, Arc<MockTransport>) {
        mock_client(MockTransport::new().route("player_api.php", 200, body))
    }

    #[tokio::test]
    async fn test_authenticate_failures_are_opaque() {
        let (client, _) = mock_client(MockTransport::new().route("player_api.php", 403, AUTH_OK));
        assert!(client.authenticate().await.is_err());

        let (client, _) = client_with_body("<html>not json</html>");
        assert!(client.authenticate().await.is_err());

        let (client, _) = mock_client(MockTransport::new().fail("player_api.php"));
        assert!(client.authenticate().await.is_err());
    }

    #[tokio::test]
    async fn test_inactive_account_still_authenticates() {
        let (client, _) = client_with_body(r#"{"user_info": {"username": "bob", "status": "Expired"}}"#);
        let info = client.authenticate().await.unwrap();
        assert!(!info.is_active());
        assert_eq!(info.max_connections, 0);
        assert_eq!(info.expires_at(), None);
    }

    #[tokio::test]
    async fn test_live_categories_and_streams() {
        let (client, _) = mock_client(
            MockTransport::new()
                .route("action=get_live_categories", 200, CATEGORIES)
                .route("action=get_live_streams&category_id=1", 200, NEWS_STREAMS),
        );

        let categories = client.get_live_categories().await.unwrap();
        assert_eq!(categories.len(), 3);
        assert_eq!(categories[1].id, "2");
        assert_eq!(categories[1].name, "Sports");
        assert!(categories.iter().all(|c| c.channels.is_empty()));

        let channels = client.get_live_streams(Some("1")).await.unwrap();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].id, "101");
        assert_eq!(
            channels[0].url,
            "http://provider.example:8080/live/alice/secret/101.m3u8"
        );
        assert_eq!(channels[0].logo, "http://x/cnn.png");
        assert_eq!(channels[0].epg_id, "cnn.us");
        assert_eq!(channels[0].group, "1");
        assert!(channels[0].is_live);
        assert_eq!(channels[1].epg_id, "");
    }

    #[tokio::test]
    async fn test_missing_fields_default() {
        let (client, _) = mock_client(MockTransport::new().route(
            "action=get_live_streams",
            200,
            r#"[{"name": "Nameless"}, {}]"#,
        ));
        let channels = client.get_live_streams(None).await.unwrap();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].id, "");
        assert_eq!(channels[1].name, "");
    }

    #[tokio::test]
    async fn test_null_list_is_empty() {
        let (client, _) = mock_client(MockTransport::new().route("action=get_live_categories", 200, "null"));
        assert!(client.get_live_categories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_vod_streams_use_container_extension() {
        let (client, _) = mock_client(MockTransport::new().route(
            "action=get_vod_streams",
            200,
            r#"[
                {"name": "Film A", "stream_id": 9, "container_extension": "mkv", "category_id": "5"},
                {"name": "Film B", "stream_id": 10, "category_id": "5"}
            ]"#,
        ));
        let channels = client.get_vod_streams(None).await.unwrap();
        assert_eq!(
            channels[0].url,
            "http://provider.example:8080/movie/alice/secret/9.mkv"
        );
        assert_eq!(
            channels[1].url,
            "http://provider.example:8080/movie/alice/secret/10.mp4"
        );
        assert!(!channels[0].is_live);
    }

    #[tokio::test]
    async fn test_live_catalog_drops_empty_and_failed_categories() {
        let (client, transport) = mock_client(
            MockTransport::new()
                .route("action=get_live_categories", 200, CATEGORIES)
                .route("action=get_live_streams&category_id=1", 200, NEWS_STREAMS)
                .route("action=get_live_streams&category_id=2", 200, SPORTS_STREAMS)
                .route("action=get_live_streams&category_id=3", 200, "[]"),
        );

        let catalog = client.fetch_live_catalog(2).await.unwrap();
        let names: Vec<&str> = catalog.categories().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["News", "Sports"]);
        assert_eq!(catalog.channel_count(), 3);
        // One category list plus one request per category.
        assert_eq!(transport.calls(), 4);
    }

    #[tokio::test]
    async fn test_live_catalog_tolerates_failed_category() {
        let (client, _) = mock_client(
            MockTransport::new()
                .route("action=get_live_categories", 200, CATEGORIES)
                .route("action=get_live_streams&category_id=1", 200, NEWS_STREAMS)
                .fail("action=get_live_streams&category_id=2")
                .route("action=get_live_streams&category_id=3", 500, ""),
        );

        let catalog = client.fetch_live_catalog(4).await.unwrap();
        assert_eq!(catalog.categories().len(), 1);
        assert_eq!(catalog.categories()[0].name, "News");
    }

    #[tokio::test]
    async fn test_live_catalog_fails_when_category_list_fails() {
        let (client, _) = mock_client(MockTransport::new().fail("action=get_live_categories"));
        assert!(client.fetch_live_catalog(4).await.is_err());
    }

    #[tokio::test]
    async fn test_authenticate_rejects_non_object_bodies() {
        let (client, _) = client_with_body(r#"[{"status": "Active", "username": "x"}]"#);
        assert!(client.authenticate().await.is_err());

        let (client, _) = client_with_body(r#"{"user_info": [{"status": "Active"}]}"#);
        assert!(client.authenticate().await.is_err());

        let (client, _) = client_with_body(r#""Active""#);
        assert!(client.authenticate().await.is_err());
    }

    fn many_categories(count: usize) -> String {
        let items: Vec<String> = (1..=count)
            .map(|i| format!(r#"{{"category_id": "{i}", "category_name": "Group {i}"}}"#))
            .collect();
        format!("[{}]", items.join(","))
    }

    #[tokio::test]
    async fn test_live_catalog_respects_concurrency_bound() {
        for bound in [1, 2, 3] {
            let (client, transport) = mock_client(
                MockTransport::new()
                    .with_delay(Duration::from_millis(20))
                    .route("action=get_live_categories", 200, &many_categories(8))
                    .route("action=get_live_streams", 200, SPORTS_STREAMS),
            );

            let catalog = client.fetch_live_catalog(bound).await.unwrap();
            assert_eq!(catalog.categories().len(), 8);
            assert_eq!(transport.calls(), 9);
            assert_eq!(transport.peak_in_flight(), bound);
        }
    }

    #[tokio::test]
    async fn test_zero_concurrency_still_makes_progress() {
        let (client, transport) = mock_client(
            MockTransport::new()
                .route("action=get_live_categories", 200, &many_categories(3))
                .route("action=get_live_streams", 200, SPORTS_STREAMS),
        );
        let catalog = client.fetch_live_catalog(0).await.unwrap();
        assert_eq!(catalog.categories().len(), 3);
        assert_eq!(transport.peak_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_vod_catalog_uses_movie_urls() {
        let (client, transport) = mock_client(
            MockTransport::new()
                .route(
                    "action=get_vod_categories",
                    200,
                    r#"[{"category_id": "5", "category_name": "Films"},
                        {"category_id": "6", "category_name": "Shorts"}]"#,
                )
                .route(
                    "action=get_vod_streams&category_id=5",
                    200,
                    r#"[{"name": "Film A", "stream_id": 9, "container_extension": "mkv",
                         "epg_channel_id": "ignored", "category_id": "5"},
                        {"name": "Film B", "stream_id": 10, "category_id": "5"}]"#,
                )
                .route("action=get_vod_streams&category_id=6", 200, "null"),
        );

        let catalog = client.fetch_vod_catalog(2).await.unwrap();
        assert_eq!(catalog.categories().len(), 1);
        let films = &catalog.categories()[0];
        assert_eq!(films.name, "Films");
        assert_eq!(films.channels.len(), 2);
        assert!(films.channels.iter().all(|c| !c.is_live && c.epg_id.is_empty()));

        let mut urls: Vec<&str> = films.channels.iter().map(|c| c.url.as_str()).collect();
        urls.sort();
        assert_eq!(
            urls,
            vec![
                "http://provider.example:8080/movie/alice/secret/10.mp4",
                "http://provider.example:8080/movie/alice/secret/9.mkv",
            ]
        );

        let requests = transport.requests.lock().unwrap();
        assert!(requests.iter().all(|r| !r.contains("get_live_")));
    }

    #[test]
    fn test_credentials_are_encoded_in_api_url() {
        let client = XtreamClient::new(
            Arc::new(MockTransport::new()),
            XtreamCredentials::new("http://p.example", "user name", "p&ss"),
        );
        assert_eq!(
            client.api_url(Some("get_live_streams"), Some("7")),
            "http://p.example/player_api.php?username=user%20name&password=p%26ss&action=get_live_streams&category_id=7"
        );
    }
}
