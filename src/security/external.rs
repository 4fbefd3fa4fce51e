//! Hashes of the inline snippets embedded in the remote container bundle.
//!
//! The bundle is a third-party, unversioned JavaScript file. Tags that the
//! container injects inline are shipped inside it as JSON string fields of the
//! shape `"code":"<script …>…</script>"`. Their text has to be allowed by hash
//! as well, otherwise the browser blocks them once a hash is present in the
//! directive. The extraction pattern is coupled to that payload format and
//! must be re-checked against live bundles when the vendor changes it.

use crate::error::CspError;
use crate::security::hash::{HashGenerator, HashToken};
use bytes::Bytes;
use futures::future::BoxFuture;
use regex::Regex;
use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

/// Status and fully buffered body of a GET request.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Bytes,
}

/// HTTP GET capability used to retrieve the bundle.
pub trait HttpFetch: Send + Sync {
    fn get<'a>(
        &'a self,
        url: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<FetchResponse, CspError>>;
}

/// [`HttpFetch`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestFetch {
    client: reqwest::Client,
}

impl ReqwestFetch {
    pub fn new() -> Result<Self, CspError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(|e| CspError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl HttpFetch for ReqwestFetch {
    fn get<'a>(
        &'a self,
        url: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<FetchResponse, CspError>> {
        Box::pin(async move {
            let response = self
                .client
                .get(url)
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| CspError::FetchError(e.to_string()))?;
            let status = response.status().as_u16();
            let body = response
                .bytes()
                .await
                .map_err(|e| CspError::FetchError(e.to_string()))?;
            Ok(FetchResponse { status, body })
        })
    }
}

fn inline_script_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Group 1: text between the opening `<script …>` and the closing tag,
    // still JSON-escaped. The closing slash may itself be escaped (`<\/script>`).
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?s)"code":"<script[^>]*>(.*?)<\\?/script>""#)
            .expect("inline script pattern is valid")
    })
}

#[derive(Clone)]
pub struct ExternalScriptFetcher {
    http: Arc<dyn HttpFetch>,
}

impl ExternalScriptFetcher {
    #[inline]
    pub fn new(http: Arc<dyn HttpFetch>) -> Self {
        Self { http }
    }

    pub fn with_reqwest() -> Result<Self, CspError> {
        Ok(Self::new(Arc::new(ReqwestFetch::new()?)))
    }

    /// Single attempt, no retries. Non-2xx statuses and empty bodies are errors.
    pub async fn fetch_raw(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<Vec<HashToken>, CspError> {
        let response = self.http.get(url, timeout).await?;
        if !(200..300).contains(&response.status) {
            return Err(CspError::HttpStatus(response.status));
        }
        if response.body.is_empty() {
            return Err(CspError::EmptyBody);
        }

        let body = String::from_utf8_lossy(&response.body);
        Ok(Self::extract_hashes(&body))
    }

    /// Like [`fetch_raw`](Self::fetch_raw), with the failure logged and
    /// reported as `None`. Callers degrade to no extra hashes.
    pub async fn fetch_hashes(&self, url: &str, timeout: Duration) -> Option<Vec<HashToken>> {
        match self.fetch_raw(url, timeout).await {
            Ok(hashes) => Some(hashes),
            Err(e) => {
                log::warn!("Container bundle {} unavailable, no extra hashes: {}", url, e);
                None
            }
        }
    }

    /// Hash tokens of every embedded inline script, in bundle order.
    pub fn extract_hashes(body: &str) -> Vec<HashToken> {
        HashGenerator::tokens(Self::extract_inline_scripts(body))
    }

    /// Unescaped text of every embedded inline script, in bundle order.
    pub fn extract_inline_scripts(body: &str) -> Vec<String> {
        inline_script_pattern()
            .captures_iter(body)
            .filter_map(|captures| captures.get(1))
            .map(|literal| Self::unescape(literal.as_str()))
            .collect()
    }

    /// Reverses the bundle's string escaping: `\\` becomes `\`, then the two
    /// characters `\n` become a newline. The passes run in this order.
    pub fn unescape(literal: &str) -> String {
        literal.replace("\\\\", "\\").replace("\\n", "\n")
    }
}

impl std::fmt::Debug for ExternalScriptFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalScriptFetcher").finish_non_exhaustive()
    }
}
