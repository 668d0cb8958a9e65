use std::time::Duration;

use md5::{Digest, Md5};
use url::Url;

use crate::error::BenchmarkError;

/// Response of a target view: status plus the full body.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub status: u16,
    pub body: String,
}

/// Fetched media resource identified by its base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Media {
    pub name: String,
    pub hash: String,
}

/// HTTP access to a contestant's storefront.
#[derive(Debug, Clone)]
pub struct TargetClient {
    http: reqwest::Client,
}

impl TargetClient {
    pub fn new(request_timeout: Duration) -> Result<Self, BenchmarkError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .pool_max_idle_per_host(20)
            .build()
            .map_err(|e| BenchmarkError::Transport {
                url: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self { http })
    }

    pub async fn get(&self, url: &Url) -> Result<Page, BenchmarkError> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| transport(url, e))?;
        read_page(url, response).await
    }

    pub async fn post_form(
        &self,
        url: &Url,
        form: &[(&str, String)],
    ) -> Result<Page, BenchmarkError> {
        let response = self
            .http
            .post(url.clone())
            .form(form)
            .send()
            .await
            .map_err(|e| transport(url, e))?;
        read_page(url, response).await
    }

    /// POST with an empty body, succeeding on any 2xx status.
    pub async fn post_empty(&self, url: &Url) -> Result<(), BenchmarkError> {
        let response = self
            .http
            .post(url.clone())
            .send()
            .await
            .map_err(|e| transport(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(BenchmarkError::UnexpectedStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    /// Download the media referenced by `src` (absolute or relative to
    /// `base`) and hash its bytes.
    pub async fn fetch_media(&self, base: &Url, src: &str) -> Result<Media, BenchmarkError> {
        let url = base
            .join(src.trim())
            .map_err(|_| BenchmarkError::Content(format!("invalid media reference {src:?}")))?;

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| transport(&url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(BenchmarkError::UnexpectedStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| transport(&url, e))?;
        Ok(Media {
            name: base_name(&url),
            hash: content_hash(&bytes),
        })
    }
}

/// Lowercase hex MD5 of `bytes`, the format of the known-good hash list.
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Md5::digest(bytes))
}

/// `base` with `path` appended to its own path.
pub fn join_path(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    let joined = format!(
        "{}/{}",
        base.path().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    url.set_path(&joined);
    url.set_query(None);
    url
}

fn base_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .unwrap_or_default()
        .to_string()
}

async fn read_page(url: &Url, response: reqwest::Response) -> Result<Page, BenchmarkError> {
    let status = response.status().as_u16();
    let body = response.text().await.map_err(|e| transport(url, e))?;
    Ok(Page {
        url: url.to_string(),
        status,
        body,
    })
}

fn transport(url: &Url, err: reqwest::Error) -> BenchmarkError {
    BenchmarkError::Transport {
        url: url.to_string(),
        reason: err.to_string(),
    }
}
