use crate::constants::{DEFAULT_NONCE_LENGTH, MARKER_DATA_SOURCE, NONCE_PREFIX, SUFFIX_QUOTE};
use crate::core::source::Source;
use crate::error::CspError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64, Engine};
use getrandom::getrandom;
use regex::Regex;
use std::{
    borrow::Cow,
    fmt,
    ops::Deref,
    sync::{
        atomic::{AtomicUsize, Ordering},
        OnceLock,
    },
};

/// A nonce source, rendered as `'nonce-<value>'`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonceToken(String);

impl NonceToken {
    #[inline]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw attribute value.
    #[inline]
    pub fn value(&self) -> &str {
        &self.0
    }

    /// Whether the value is a non-empty CSP base64 value
    /// (`A-Z a-z 0-9 + / _ = -`). Anything else could break out of the
    /// `'nonce-…'` token when serialized into the header.
    pub fn is_well_formed(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'_' | b'=' | b'-'))
    }
}

impl fmt::Display for NonceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", NONCE_PREFIX, self.0, SUFFIX_QUOTE)
    }
}

impl From<NonceToken> for Source {
    fn from(token: NonceToken) -> Self {
        Source::Nonce(Cow::Owned(token.0))
    }
}

/// Finds the nonce of the analytics tag in a rendered page.
///
/// Capture contract: group 1 is the value of the `nonce` attribute of
/// `<script type="text/javascript" data-source="<marker>" nonce="…">`, with
/// the attributes in exactly that order. The markup is produced by
/// [`PiwikSnippet::render_tag`](crate::snippet::PiwikSnippet::render_tag);
/// a change there must be mirrored here.
#[derive(Debug, Clone)]
pub struct NonceExtractor {
    pattern: Regex,
}

fn marker_pattern(data_source: &str) -> String {
    format!(
        r#"<script type="text/javascript" data-source="{}" nonce="(.*?)">"#,
        regex::escape(data_source)
    )
}

impl NonceExtractor {
    pub fn new() -> Self {
        static DEFAULT: OnceLock<Regex> = OnceLock::new();
        let pattern = DEFAULT
            .get_or_init(|| {
                Regex::new(&marker_pattern(MARKER_DATA_SOURCE)).expect("marker pattern is valid")
            })
            .clone();
        Self { pattern }
    }

    pub fn with_marker(data_source: &str) -> Result<Self, CspError> {
        let pattern = Regex::new(&marker_pattern(data_source))
            .map_err(|e| CspError::ConfigError(format!("Invalid nonce marker: {}", e)))?;
        Ok(Self { pattern })
    }

    /// Returns the nonce only when the body holds exactly one marker tag with
    /// a well-formed value. Pages served from cache may carry an older nonce;
    /// that is accepted here, only uniqueness within `body` is checked.
    pub fn extract(&self, body: &str) -> Option<NonceToken> {
        let mut matches = self.pattern.captures_iter(body);
        let first = matches.next()?;
        if matches.next().is_some() {
            log::debug!("Multiple analytics nonce markers found, skipping nonce");
            return None;
        }

        let nonce = NonceToken::new(first.get(1)?.as_str());
        if !nonce.is_well_formed() {
            log::warn!("Malformed analytics nonce in response, skipping nonce");
            return None;
        }
        Some(nonce)
    }
}

impl Default for NonceExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Random nonce values for the analytics tag.
#[derive(Debug)]
pub struct NonceGenerator {
    length: AtomicUsize,
}

impl NonceGenerator {
    #[inline]
    pub fn new(length: usize) -> Self {
        Self {
            length: AtomicUsize::new(length),
        }
    }

    pub fn generate(&self) -> Result<String, CspError> {
        let mut buffer = vec![0u8; self.length()];
        getrandom(&mut buffer)
            .map_err(|e| CspError::CryptoError(format!("Failed to generate nonce: {}", e)))?;
        Ok(BASE64.encode(&buffer))
    }

    #[inline]
    pub fn set_length(&self, length: usize) {
        self.length.store(length, Ordering::Relaxed);
    }

    #[inline]
    pub fn length(&self) -> usize {
        self.length.load(Ordering::Relaxed)
    }
}

impl Default for NonceGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_NONCE_LENGTH)
    }
}

/// Nonce already known for the current request, e.g. the one the page was
/// rendered with. Takes precedence over scanning the body.
#[derive(Debug, Clone)]
pub struct RequestNonce(pub String);

impl Deref for RequestNonce {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<RequestNonce> for NonceToken {
    fn from(nonce: RequestNonce) -> Self {
        NonceToken(nonce.0)
    }
}
