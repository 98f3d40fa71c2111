// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use crate::config::NetworkConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs a single GET and hands back the status and body.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse, TransportError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &NetworkConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.read_timeout())
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn fetch(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse, TransportError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;

        debug!("Fetched {} bytes with status {}", body.len(), status);
        Ok(HttpResponse { status, body })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        // Drop the url from the message, it can carry credentials.
        TransportError::Request(err.without_url().to_string())
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Canned transport: responses are matched on a substring of the url.
    #[derive(Default)]
    pub struct MockTransport {
        routes: Mutex<Vec<(String, Result<HttpResponse, TransportError>)>>,
        pub requests: Mutex<Vec<String>>,
        pub headers: Mutex<HashMap<String, String>>,
        hang: bool,
        delay: Option<Duration>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// A transport whose requests never complete.
        pub fn hanging() -> Self {
            Self {
                hang: true,
                ..Self::default()
            }
        }

        /// Every response is held back by `delay`, so requests overlap.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn route(self, pattern: &str, status: u16, body: &str) -> Self {
            self.routes.lock().unwrap().push((
                pattern.to_string(),
                Ok(HttpResponse {
                    status,
                    body: body.to_string(),
                }),
            ));
            self
        }

        pub fn fail(self, pattern: &str) -> Self {
            self.routes.lock().unwrap().push((
                pattern.to_string(),
                Err(TransportError::Request("connection refused".to_string())),
            ));
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Highest number of requests that were in flight at once.
        pub fn peak_in_flight(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HttpTransport for MockTransport {
        async fn fetch(
            &self,
            url: &str,
            headers: &[(&str, &str)],
        ) -> Result<HttpResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(url.to_string());
            {
                let mut seen = self.headers.lock().unwrap();
                for (name, value) in headers {
                    seen.insert(name.to_string(), value.to_string());
                }
            }

            if self.hang {
                std::future::pending::<()>().await;
            }

            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(current, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            // Longest pattern wins so "category_id=2" beats "get_live_streams".
            let routes = self.routes.lock().unwrap();
            routes
                .iter()
                .filter(|(pattern, _)| url.contains(pattern.as_str()))
                .max_by_key(|(pattern, _)| pattern.len())
                .map(|(_, response)| response.clone())
                .unwrap_or(Ok(HttpResponse {
                    status: 404,
                    body: String::new(),
                }))
        }
    }

    #[tokio::test]
    async fn test_mock_matches_longest_pattern() {
        let transport = MockTransport::new()
            .route("action=get_live_streams", 200, "[]")
            .route("action=get_live_streams&category_id=2", 200, "[{}]");

        let response = transport
            .fetch("http://x/player_api.php?action=get_live_streams&category_id=2", &[])
            .await
            .unwrap();
        assert_eq!(response.body, "[{}]");

        let missing = transport.fetch("http://x/other", &[]).await.unwrap();
        assert_eq!(missing.status, 404);
        assert_eq!(transport.calls(), 2);
        assert_eq!(transport.peak_in_flight(), 1);
    }
}
