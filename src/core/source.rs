use crate::constants::{
    NONCE_PREFIX, NONE_SOURCE, REPORT_SAMPLE_SOURCE, SELF_SOURCE, STRICT_DYNAMIC_SOURCE,
    SUFFIX_QUOTE, UNSAFE_EVAL_SOURCE, UNSAFE_HASHES_SOURCE, UNSAFE_INLINE_SOURCE,
    WASM_UNSAFE_EVAL_SOURCE,
};
use crate::security::hash::HashAlgorithm;
use crate::utils::BufferWriter;
use bytes::BytesMut;
use std::{
    borrow::Cow,
    fmt,
    hash::{Hash, Hasher},
};

/// A single entry of a directive's source list.
///
/// `List` holds several sources that were appended as one space-separated
/// token; it renders exactly like the individual sources would, but keeps
/// the append count of the directive intact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    None,
    Self_,
    UnsafeInline,
    UnsafeEval,
    StrictDynamic,
    ReportSample,
    WasmUnsafeEval,
    UnsafeHashes,
    Host(Cow<'static, str>),
    Scheme(Cow<'static, str>),
    Nonce(Cow<'static, str>),
    Hash {
        algorithm: HashAlgorithm,
        value: Cow<'static, str>,
    },
    List(Vec<Source>),
}

impl Source {
    /// Parses one serialized token. Input containing whitespace becomes a `List`.
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        if token.contains(char::is_whitespace) {
            return Source::List(token.split_whitespace().map(Source::parse_single).collect());
        }
        Self::parse_single(token)
    }

    fn parse_single(token: &str) -> Self {
        const KEYWORDS: [(&str, Source); 8] = [
            (NONE_SOURCE, Source::None),
            (SELF_SOURCE, Source::Self_),
            (UNSAFE_INLINE_SOURCE, Source::UnsafeInline),
            (UNSAFE_EVAL_SOURCE, Source::UnsafeEval),
            (STRICT_DYNAMIC_SOURCE, Source::StrictDynamic),
            (REPORT_SAMPLE_SOURCE, Source::ReportSample),
            (WASM_UNSAFE_EVAL_SOURCE, Source::WasmUnsafeEval),
            (UNSAFE_HASHES_SOURCE, Source::UnsafeHashes),
        ];

        // Keywords and the nonce/hash prefixes are ASCII case-insensitive.
        if let Some((_, keyword)) = KEYWORDS
            .iter()
            .find(|(text, _)| token.eq_ignore_ascii_case(text))
        {
            return keyword.clone();
        }

        if let Some(inner) = strip_prefix_ignore_case(token, NONCE_PREFIX)
            .and_then(|rest| rest.strip_suffix(SUFFIX_QUOTE))
        {
            return Source::Nonce(Cow::Owned(inner.to_owned()));
        }

        for algorithm in [
            HashAlgorithm::Sha256,
            HashAlgorithm::Sha384,
            HashAlgorithm::Sha512,
        ] {
            if let Some(value) = strip_prefix_ignore_case(token, algorithm.prefix())
                .and_then(|rest| rest.strip_suffix(SUFFIX_QUOTE))
            {
                return Source::Hash {
                    algorithm,
                    value: Cow::Owned(value.to_owned()),
                };
            }
        }

        if let Some(scheme) = token.strip_suffix(':') {
            if !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
            {
                return Source::Scheme(Cow::Owned(scheme.to_owned()));
            }
        }

        Source::Host(Cow::Owned(token.to_owned()))
    }

    /// True if this entry is, or contains, `'unsafe-inline'`.
    pub fn allows_unsafe_inline(&self) -> bool {
        match self {
            Source::UnsafeInline => true,
            Source::List(sources) => sources.iter().any(Source::allows_unsafe_inline),
            _ => false,
        }
    }

    #[inline]
    pub const fn as_static_str(&self) -> Option<&'static str> {
        match self {
            Source::None => Some(NONE_SOURCE),
            Source::Self_ => Some(SELF_SOURCE),
            Source::UnsafeInline => Some(UNSAFE_INLINE_SOURCE),
            Source::UnsafeEval => Some(UNSAFE_EVAL_SOURCE),
            Source::StrictDynamic => Some(STRICT_DYNAMIC_SOURCE),
            Source::ReportSample => Some(REPORT_SAMPLE_SOURCE),
            Source::WasmUnsafeEval => Some(WASM_UNSAFE_EVAL_SOURCE),
            Source::UnsafeHashes => Some(UNSAFE_HASHES_SOURCE),
            _ => None,
        }
    }

    #[inline]
    pub fn estimated_size(&self) -> usize {
        match self {
            Source::Host(host) => host.len(),
            Source::Scheme(scheme) => scheme.len() + 1,
            Source::Nonce(nonce) => NONCE_PREFIX.len() + nonce.len() + SUFFIX_QUOTE.len(),
            Source::Hash { algorithm, value } => {
                algorithm.prefix().len() + value.len() + SUFFIX_QUOTE.len()
            }
            Source::List(sources) => {
                sources.iter().map(Source::estimated_size).sum::<usize>()
                    + sources.len().saturating_sub(1)
            }
            keyword => keyword.as_static_str().map_or(0, str::len),
        }
    }

    #[inline]
    pub fn contains_nonce(&self) -> bool {
        match self {
            Source::Nonce(_) => true,
            Source::List(sources) => sources.iter().any(Source::contains_nonce),
            _ => false,
        }
    }

    #[inline]
    pub fn contains_hash(&self) -> bool {
        match self {
            Source::Hash { .. } => true,
            Source::List(sources) => sources.iter().any(Source::contains_hash),
            _ => false,
        }
    }
}

fn strip_prefix_ignore_case<'a>(token: &'a str, prefix: &str) -> Option<&'a str> {
    let head = token.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &token[prefix.len()..])
}

impl From<&str> for Source {
    fn from(token: &str) -> Self {
        Source::parse(token)
    }
}

impl Hash for Source {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Source::Host(host) => host.hash(state),
            Source::Scheme(scheme) => scheme.hash(state),
            Source::Nonce(nonce) => nonce.hash(state),
            Source::Hash { algorithm, value } => {
                algorithm.hash(state);
                value.hash(state);
            }
            Source::List(sources) => sources.hash(state),
            _ => {}
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Host(host) => f.write_str(host),
            Source::Scheme(scheme) => write!(f, "{}:", scheme),
            Source::Nonce(nonce) => write!(f, "{}{}{}", NONCE_PREFIX, nonce, SUFFIX_QUOTE),
            Source::Hash { algorithm, value } => {
                write!(f, "{}{}{}", algorithm.prefix(), value, SUFFIX_QUOTE)
            }
            Source::List(sources) => {
                for (i, source) in sources.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    fmt::Display::fmt(source, f)?;
                }
                Ok(())
            }
            keyword => f.write_str(keyword.as_static_str().unwrap_or_default()),
        }
    }
}

impl BufferWriter for Source {
    fn write_to_buffer(&self, buffer: &mut BytesMut) {
        match self {
            Source::Host(host) => buffer.extend_from_slice(host.as_bytes()),
            Source::Scheme(scheme) => {
                buffer.extend_from_slice(scheme.as_bytes());
                buffer.extend_from_slice(b":");
            }
            Source::Nonce(nonce) => {
                buffer.reserve(NONCE_PREFIX.len() + nonce.len() + SUFFIX_QUOTE.len());
                buffer.extend_from_slice(NONCE_PREFIX.as_bytes());
                buffer.extend_from_slice(nonce.as_bytes());
                buffer.extend_from_slice(SUFFIX_QUOTE.as_bytes());
            }
            Source::Hash { algorithm, value } => {
                let prefix = algorithm.prefix();
                buffer.reserve(prefix.len() + value.len() + SUFFIX_QUOTE.len());
                buffer.extend_from_slice(prefix.as_bytes());
                buffer.extend_from_slice(value.as_bytes());
                buffer.extend_from_slice(SUFFIX_QUOTE.as_bytes());
            }
            Source::List(sources) => {
                for (i, source) in sources.iter().enumerate() {
                    if i > 0 {
                        buffer.extend_from_slice(b" ");
                    }
                    source.write_to_buffer(buffer);
                }
            }
            keyword => {
                if let Some(value) = keyword.as_static_str() {
                    buffer.extend_from_slice(value.as_bytes());
                }
            }
        }
    }
}
