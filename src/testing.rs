//! In-memory fetcher for strategy and pipeline tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::fetcher::{FetchedPage, PageFetcher};

/// Serves canned responses by exact URL; anything else is a 404.
#[derive(Default)]
pub struct StubFetcher {
    responses: HashMap<String, Result<FetchedPage, FetchError>>,
    calls: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to `url` with a 200 and `body`, landing on the same URL.
    pub fn with_page(self, url: &str, body: &str) -> Self {
        self.with_redirect(url, url, body)
    }

    /// Respond to `url` as if the client was redirected to `final_url`.
    pub fn with_redirect(mut self, url: &str, final_url: &str, body: &str) -> Self {
        self.responses.insert(
            url.to_string(),
            Ok(FetchedPage {
                final_url: final_url.to_string(),
                status: 200,
                body: body.to_string(),
            }),
        );
        self
    }

    pub fn with_error(mut self, url: &str, error: FetchError) -> Self {
        self.responses.insert(url.to_string(), Err(error));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(url.to_string());
        }
        self.responses
            .get(url)
            .cloned()
            .unwrap_or(Err(FetchError::Http(404)))
    }
}
