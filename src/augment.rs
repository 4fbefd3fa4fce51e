//! Merges the analytics origin and inline-script tokens into a response's policy.

use crate::constants::{INLINE_DIRECTIVES, OPTIONAL_DIRECTIVES, REQUIRED_DIRECTIVES};
use crate::core::config::{AnalyticsConfig, AugmentMode};
use crate::core::directives::Directive;
use crate::core::policy::CspPolicy;
use crate::core::source::Source;
use crate::error::CspError;
use crate::monitoring::stats::CspStats;
use crate::security::external::ExternalScriptFetcher;
use crate::security::hash::{HashGenerator, HashToken};
use crate::security::nonce::{NonceExtractor, NonceToken};
use crate::snippet::SnippetSource;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No analytics domain configured.
    NoDomain,
    /// The response cannot carry the analytics tag.
    NotAttachable,
}

/// Inline tokens chosen for the current response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineTokens {
    None,
    Nonce(NonceToken),
    Hashes(Vec<HashToken>),
}

impl InlineTokens {
    /// The single directive entry these tokens are appended as. Hashes are
    /// joined into one space-separated entry.
    pub fn to_source(&self) -> Option<Source> {
        match self {
            InlineTokens::None => None,
            InlineTokens::Nonce(nonce) => Some(nonce.clone().into()),
            InlineTokens::Hashes(hashes) if hashes.is_empty() => None,
            InlineTokens::Hashes(hashes) => Some(Source::List(
                hashes.iter().cloned().map(Source::from).collect(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AugmentOutcome {
    Skipped(SkipReason),
    Applied {
        base_domain: String,
        inline: InlineTokens,
    },
}

impl AugmentOutcome {
    #[inline]
    pub fn is_applied(&self) -> bool {
        matches!(self, AugmentOutcome::Applied { .. })
    }
}

/// What the response layer knows about the response being augmented.
#[derive(Clone, Copy, Default)]
pub struct ResponseContext<'a> {
    attachable: bool,
    body: Option<&'a str>,
    nonce: Option<&'a NonceToken>,
    snippets: Option<&'a dyn SnippetSource>,
}

impl<'a> ResponseContext<'a> {
    /// `attachable` is false for responses that cannot carry the analytics
    /// tag (non-HTML, streamed, ...); those are left untouched.
    #[inline]
    pub fn new(attachable: bool) -> Self {
        Self {
            attachable,
            ..Self::default()
        }
    }

    /// Rendered body, scanned for the nonce in [`AugmentMode::NonceOnly`].
    #[inline]
    pub fn with_body(mut self, body: &'a str) -> Self {
        self.body = Some(body);
        self
    }

    /// Nonce already known for this request; the body is not scanned then.
    #[inline]
    pub fn with_nonce(mut self, nonce: &'a NonceToken) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Scripts hashed in the hash modes.
    #[inline]
    pub fn with_snippets(mut self, snippets: &'a dyn SnippetSource) -> Self {
        self.snippets = Some(snippets);
        self
    }
}

impl std::fmt::Debug for ResponseContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseContext")
            .field("attachable", &self.attachable)
            .field("body_len", &self.body.map(str::len))
            .field("nonce", &self.nonce)
            .field("snippets", &self.snippets.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct PolicyAugmenter {
    extractor: NonceExtractor,
    fetcher: Option<ExternalScriptFetcher>,
    stats: Arc<CspStats>,
}

impl Default for PolicyAugmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyAugmenter {
    /// Augmenter with a `reqwest`-backed bundle fetcher.
    pub fn new() -> Self {
        let fetcher = match ExternalScriptFetcher::with_reqwest() {
            Ok(fetcher) => Some(fetcher),
            Err(e) => {
                log::error!("Container bundle fetching disabled: {}", e);
                None
            }
        };
        Self {
            extractor: NonceExtractor::new(),
            fetcher,
            stats: Arc::new(CspStats::new()),
        }
    }

    /// Replaces the bundle fetcher used in [`AugmentMode::HashWithExternal`].
    #[inline]
    pub fn with_fetcher(mut self, fetcher: ExternalScriptFetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    #[inline]
    pub fn with_extractor(mut self, extractor: NonceExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    #[inline]
    pub fn with_stats(mut self, stats: Arc<CspStats>) -> Self {
        self.stats = stats;
        self
    }

    #[inline]
    pub fn stats(&self) -> &Arc<CspStats> {
        &self.stats
    }

    /// Adds the analytics origin and inline tokens to `policy`.
    ///
    /// Every token, including the hashes of the remote bundle, is computed
    /// before the policy is touched, so an `Err` leaves it unchanged. Missing
    /// nonces and failed fetches are not errors; the policy is then only
    /// extended with the origin.
    pub async fn augment(
        &self,
        policy: &mut CspPolicy,
        config: &AnalyticsConfig,
        response: &ResponseContext<'_>,
    ) -> Result<AugmentOutcome, CspError> {
        let started = Instant::now();

        let Some(base_domain) = config.base_domain()? else {
            self.stats.increment_skipped_count();
            return Ok(AugmentOutcome::Skipped(SkipReason::NoDomain));
        };
        if !response.attachable {
            self.stats.increment_skipped_count();
            return Ok(AugmentOutcome::Skipped(SkipReason::NotAttachable));
        }

        let inline = self.inline_tokens(config, response).await?;

        allow_origin(policy, &base_domain);
        if let Some(source) = inline.to_source() {
            allow_inline(policy, &source);
        }

        self.stats.increment_augment_count();
        self.stats
            .add_augment_time(started.elapsed().as_nanos() as usize);
        log::debug!(
            "Augmented policy for {} ({:?} mode): {}",
            base_domain,
            config.mode(),
            policy
        );

        Ok(AugmentOutcome::Applied {
            base_domain,
            inline,
        })
    }

    async fn inline_tokens(
        &self,
        config: &AnalyticsConfig,
        response: &ResponseContext<'_>,
    ) -> Result<InlineTokens, CspError> {
        match config.mode() {
            AugmentMode::NonceOnly => {
                let nonce = match response.nonce {
                    Some(nonce) if nonce.is_well_formed() => Some(nonce.clone()),
                    Some(nonce) => {
                        log::warn!("Ignoring malformed request nonce {:?}", nonce.value());
                        None
                    }
                    None => response.body.and_then(|body| self.extractor.extract(body)),
                };
                Ok(match nonce {
                    Some(nonce) => {
                        self.stats.increment_nonce_applied_count();
                        InlineTokens::Nonce(nonce)
                    }
                    None => {
                        log::debug!("No unique analytics nonce in response, skipping nonce");
                        self.stats.increment_nonce_missing_count();
                        InlineTokens::None
                    }
                })
            }
            mode @ (AugmentMode::HashOnly | AugmentMode::HashWithExternal) => {
                let snippets = response.snippets.ok_or_else(|| {
                    CspError::ConfigError(format!(
                        "{:?} mode needs the analytics snippets of the response",
                        mode
                    ))
                })?;

                let mut hashes = vec![
                    HashGenerator::token(snippets.body_script()),
                    HashGenerator::token(snippets.data_layer_script()),
                ];
                if mode.fetches_bundle() {
                    hashes.extend(self.bundle_hashes(config).await);
                }

                self.stats.add_hash_tokens(hashes.len());
                Ok(InlineTokens::Hashes(hashes))
            }
        }
    }

    async fn bundle_hashes(&self, config: &AnalyticsConfig) -> Vec<HashToken> {
        let Some(url) = config.bundle_url() else {
            log::warn!("No tracking id configured, container bundle not fetched");
            return Vec::new();
        };
        let Some(fetcher) = &self.fetcher else {
            log::warn!("No bundle fetcher configured, {} not fetched", url);
            return Vec::new();
        };

        fetcher
            .fetch_hashes(&url, config.fetch_timeout())
            .await
            .unwrap_or_else(|| {
                self.stats.increment_fetch_failure_count();
                Vec::new()
            })
    }
}

/// Allows `base_domain` in every required directive (creating it with
/// `'self'` first) and in the optional directives the policy already has.
fn allow_origin(policy: &mut CspPolicy, base_domain: &str) {
    for name in REQUIRED_DIRECTIVES {
        if !policy.has_directive(name) {
            policy.append_directive(name, Source::Self_);
        }
        policy.append_directive(name, host(base_domain));
    }

    for name in OPTIONAL_DIRECTIVES {
        if policy.has_directive(name) {
            policy.append_directive(name, host(base_domain));
        }
    }
}

/// Appends `source` wherever it does not override an explicit `'unsafe-inline'`.
///
/// Browsers ignore `'unsafe-inline'` once a nonce or hash is present in the
/// same directive, so those directives are left alone.
fn allow_inline(policy: &mut CspPolicy, source: &Source) {
    for name in INLINE_DIRECTIVES {
        let allows_all = policy
            .get_directive(name)
            .is_some_and(Directive::allows_unsafe_inline);
        if !allows_all {
            policy.append_directive(name, source.clone());
        }
    }

    for name in OPTIONAL_DIRECTIVES {
        let eligible = policy
            .get_directive(name)
            .is_some_and(|directive| !directive.allows_unsafe_inline());
        if eligible {
            policy.append_directive(name, source.clone());
        }
    }
}

#[inline]
fn host(base_domain: &str) -> Source {
    Source::Host(Cow::Owned(base_domain.to_owned()))
}
