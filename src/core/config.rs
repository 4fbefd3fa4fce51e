use crate::constants::{DEFAULT_DATA_LAYER_NAME, DEFAULT_FETCH_TIMEOUT_MS, SCRIPT_BUNDLE_SUFFIX};
use crate::error::CspError;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use url::Url;

/// How inline analytics scripts are authorized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AugmentMode {
    /// Authorize the injected tag through the nonce found in the rendered page.
    #[default]
    #[serde(rename = "nonce")]
    NonceOnly,
    /// Authorize the body and dataLayer scripts by their SHA-256 hashes.
    #[serde(rename = "hash")]
    HashOnly,
    /// Like `HashOnly`, plus hashes of the inline snippets shipped in the
    /// remote container bundle.
    HashWithExternal,
}

impl AugmentMode {
    #[inline]
    pub const fn uses_hashes(&self) -> bool {
        matches!(self, AugmentMode::HashOnly | AugmentMode::HashWithExternal)
    }

    #[inline]
    pub const fn fetches_bundle(&self) -> bool {
        matches!(self, AugmentMode::HashWithExternal)
    }
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    id: String,
    #[serde(default, rename = "dataLayerName")]
    data_layer_name: Option<String>,
    #[serde(default)]
    site_name: String,
    #[serde(default)]
    site_environment: String,
    #[serde(default)]
    mode: AugmentMode,
    #[serde(default)]
    fetch_timeout_ms: Option<u64>,
}

/// Analytics settings snapshot consumed by the augmenter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsConfig {
    domain: Option<Url>,
    tracking_id: String,
    data_layer_name: String,
    site_name: String,
    site_environment: String,
    mode: AugmentMode,
    fetch_timeout: Duration,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            domain: None,
            tracking_id: String::new(),
            data_layer_name: DEFAULT_DATA_LAYER_NAME.to_owned(),
            site_name: String::new(),
            site_environment: String::new(),
            mode: AugmentMode::default(),
            fetch_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
        }
    }
}

impl AnalyticsConfig {
    /// Loads settings stored as JSON using the module's setting keys
    /// (`domain`, `id`, `dataLayerName`, `site_name`, `site_environment`)
    /// plus `mode` and `fetch_timeout_ms`.
    pub fn from_json(json: &str) -> Result<Self, CspError> {
        let raw: RawSettings = serde_json::from_str(json)?;
        let mut builder = AnalyticsConfigBuilder::new()
            .tracking_id(raw.id)
            .site_name(raw.site_name)
            .site_environment(raw.site_environment)
            .mode(raw.mode);
        if let Some(domain) = raw.domain {
            builder = builder.domain(domain);
        }
        if let Some(name) = raw.data_layer_name {
            builder = builder.data_layer_name(name);
        }
        if let Some(ms) = raw.fetch_timeout_ms {
            builder = builder.fetch_timeout(Duration::from_millis(ms));
        }
        builder.build()
    }

    #[inline]
    pub fn domain(&self) -> Option<&Url> {
        self.domain.as_ref()
    }

    #[inline]
    pub fn tracking_id(&self) -> &str {
        &self.tracking_id
    }

    #[inline]
    pub fn data_layer_name(&self) -> &str {
        &self.data_layer_name
    }

    #[inline]
    pub fn site_name(&self) -> &str {
        &self.site_name
    }

    #[inline]
    pub fn site_environment(&self) -> &str {
        &self.site_environment
    }

    #[inline]
    pub fn mode(&self) -> AugmentMode {
        self.mode
    }

    #[inline]
    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// `scheme://host` of the configured domain.
    pub fn base_domain(&self) -> Result<Option<String>, CspError> {
        let Some(domain) = &self.domain else {
            return Ok(None);
        };
        let host = domain
            .host_str()
            .ok_or_else(|| CspError::InvalidDomain(domain.to_string()))?;
        Ok(Some(format!("{}://{}", domain.scheme(), host)))
    }

    /// Location of the container bundle: `domain + tracking_id + ".js"`.
    pub fn bundle_url(&self) -> Option<String> {
        let domain = self.domain.as_ref()?;
        if self.tracking_id.is_empty() {
            return None;
        }
        Some(format!(
            "{}{}{}",
            domain.as_str(),
            self.tracking_id,
            SCRIPT_BUNDLE_SUFFIX
        ))
    }
}

#[derive(Debug, Default)]
pub struct AnalyticsConfigBuilder {
    domain: Option<String>,
    tracking_id: Option<String>,
    data_layer_name: Option<String>,
    site_name: Option<String>,
    site_environment: Option<String>,
    mode: Option<AugmentMode>,
    fetch_timeout: Option<Duration>,
}

impl AnalyticsConfigBuilder {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[inline]
    pub fn tracking_id(mut self, id: impl Into<String>) -> Self {
        self.tracking_id = Some(id.into());
        self
    }

    #[inline]
    pub fn data_layer_name(mut self, name: impl Into<String>) -> Self {
        self.data_layer_name = Some(name.into());
        self
    }

    #[inline]
    pub fn site_name(mut self, name: impl Into<String>) -> Self {
        self.site_name = Some(name.into());
        self
    }

    #[inline]
    pub fn site_environment(mut self, environment: impl Into<String>) -> Self {
        self.site_environment = Some(environment.into());
        self
    }

    #[inline]
    pub fn mode(mut self, mode: AugmentMode) -> Self {
        self.mode = Some(mode);
        self
    }

    #[inline]
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    /// Validates the domain and normalizes it to end with `/`.
    /// A blank domain leaves the analytics integration disabled.
    pub fn build(self) -> Result<AnalyticsConfig, CspError> {
        let defaults = AnalyticsConfig::default();

        let domain = match self.domain.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => {
                let mut normalized = raw.to_owned();
                if !normalized.ends_with('/') {
                    normalized.push('/');
                }
                let url = Url::parse(&normalized)
                    .map_err(|e| CspError::InvalidDomain(format!("{}: {}", raw, e)))?;
                if url.host_str().is_none() {
                    return Err(CspError::InvalidDomain(raw.to_owned()));
                }
                Some(url)
            }
        };

        let data_layer_name = self
            .data_layer_name
            .filter(|name| !name.is_empty())
            .unwrap_or(defaults.data_layer_name);
        if !data_layer_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        {
            return Err(CspError::ConfigError(format!(
                "Data layer name '{}' is not a valid JavaScript identifier",
                data_layer_name
            )));
        }

        let tracking_id = self.tracking_id.unwrap_or_default();
        if !tracking_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CspError::ConfigError(format!(
                "Tracking id '{}' contains invalid characters",
                tracking_id
            )));
        }

        Ok(AnalyticsConfig {
            domain,
            tracking_id,
            data_layer_name,
            site_name: self.site_name.unwrap_or_default(),
            site_environment: self.site_environment.unwrap_or_default(),
            mode: self.mode.unwrap_or(defaults.mode),
            fetch_timeout: self.fetch_timeout.unwrap_or(defaults.fetch_timeout),
        })
    }
}

/// Shared settings with snapshot reads.
///
/// Each request works on the `Arc` it loaded; `update` swaps in a new
/// snapshot without blocking readers.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    current: Arc<ArcSwap<AnalyticsConfig>>,
}

impl ConfigStore {
    pub fn new(config: AnalyticsConfig) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    #[inline]
    pub fn snapshot(&self) -> Arc<AnalyticsConfig> {
        self.current.load_full()
    }

    pub fn update(&self, config: AnalyticsConfig) {
        self.current.store(Arc::new(config));
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(AnalyticsConfig::default())
    }
}
