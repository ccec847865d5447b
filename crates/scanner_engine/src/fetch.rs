use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use reqwest::Response;
use scanner_core::ScanTarget;
use tokio_util::sync::CancellationToken;

use crate::decode::{decode_page, DecodedPage};
use crate::extract::{extract_elements, parse_selector};
use crate::{FailureKind, FetchError};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub allowed_content_types: Vec<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            allowed_content_types: vec![
                "text/html".to_string(),
                "application/xhtml+xml".to_string(),
            ],
        }
    }
}

/// Fetches a target and returns the extracted content.
///
/// Implementations must return `FailureKind::Cancelled` promptly once
/// `cancel` fires.
#[async_trait::async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(
        &self,
        target: &ScanTarget,
        cancel: &CancellationToken,
    ) -> Result<String, FetchError>;
}

/// HTTP GET, charset decoding and CSS selection.
///
/// Shared by workers that each run their own runtime, so no connection pool
/// outlives a single download.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }

    fn client(&self) -> Result<reqwest::Client, FetchError> {
        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .redirect(Policy::limited(self.settings.redirect_limit))
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))
    }

    fn accepts(&self, content_type: &str) -> bool {
        let essence = content_type.split(';').next().unwrap_or_default().trim();
        self.settings
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(essence))
    }

    fn too_large(&self, actual: u64) -> FetchError {
        FetchError::new(
            FailureKind::TooLarge {
                max_bytes: self.settings.max_bytes,
                actual: Some(actual),
            },
            format!("response exceeds {} bytes", self.settings.max_bytes),
        )
    }

    /// Rejects a response before its body is read. Returns the content type.
    fn screen(&self, response: &Response) -> Result<Option<String>, FetchError> {
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        match response.content_length() {
            Some(declared) if declared > self.settings.max_bytes => {
                return Err(self.too_large(declared))
            }
            _ => {}
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        match content_type.as_deref() {
            Some(ct) if !self.accepts(ct) => Err(FetchError::new(
                FailureKind::UnsupportedContentType {
                    content_type: ct.to_string(),
                },
                "not an html page",
            )),
            _ => Ok(content_type),
        }
    }

    /// Streams the body, stopping as soon as it outgrows `max_bytes`.
    async fn read_body(&self, response: Response) -> Result<Vec<u8>, FetchError> {
        let mut body = Vec::new();
        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let len = (body.len() + chunk.len()) as u64;
            if len > self.settings.max_bytes {
                return Err(self.too_large(len));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    /// Downloads and decodes the page at `url`.
    pub async fn download(&self, url: &str) -> Result<DecodedPage, FetchError> {
        let url = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let response = self
            .client()?
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let content_type = self.screen(&response)?;
        let body = self.read_body(response).await?;
        decode_page(&body, content_type.as_deref())
            .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))
    }
}

impl Default for ReqwestFetcher {
    fn default() -> Self {
        Self::new(FetchSettings::default())
    }
}

#[async_trait::async_trait]
impl ContentFetcher for ReqwestFetcher {
    async fn fetch(
        &self,
        target: &ScanTarget,
        cancel: &CancellationToken,
    ) -> Result<String, FetchError> {
        let page = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::cancelled()),
            page = self.download(&target.url) => page?,
        };
        let selector = parse_selector(&target.selector)
            .map_err(|err| FetchError::new(FailureKind::InvalidSelector, err.to_string()))?;
        Ok(extract_elements(&page.html, &selector))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
