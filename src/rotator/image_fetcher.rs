use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::errors::{AppError, AppResult};

use super::ImageFetcher;

/// Downloads avatar images with a plain unauthenticated GET
pub struct HttpImageFetcher {
    client: Client,
}

impl HttpImageFetcher {
    pub fn new(timeout: Option<Duration>) -> AppResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch_image(&self, url: &str) -> AppResult<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        // An error page is not an avatar
        if !status.is_success() {
            log::warn!("Image download from {} returned {}", url, status);
            return Err(AppError::http_status(url, status.as_u16()));
        }

        let bytes = response.bytes().await?;
        log::debug!("Downloaded {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}
