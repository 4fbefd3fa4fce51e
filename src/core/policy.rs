use crate::constants::{DEFAULT_BUFFER_CAPACITY, HEADER_CSP, HEADER_CSP_REPORT_ONLY, SEMICOLON_SPACE};
use crate::core::directives::{validate_name, Directive, DirectiveSpec};
use crate::core::source::Source;
use crate::error::CspError;
use crate::utils::BufferWriter;
use actix_web::http::header::{HeaderName, HeaderValue};
use bytes::BytesMut;
use indexmap::IndexMap;
use std::{
    borrow::Cow,
    fmt,
    hash::{Hash, Hasher},
};

/// In-memory Content-Security-Policy.
///
/// Directives keep their creation order and each directive keeps the order
/// its sources were appended in, so the serialized header is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CspPolicy {
    directives: IndexMap<Cow<'static, str>, Directive>,
    report_only: bool,
}

impl CspPolicy {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a serialized policy such as `script-src 'self'; img-src data:`.
    ///
    /// Only the first occurrence of a directive name counts, as in browsers;
    /// later repeats are dropped.
    pub fn parse(header: &str) -> Result<Self, CspError> {
        let mut policy = Self::new();
        for part in header.split(';') {
            let mut tokens = part.split_whitespace();
            let Some(name) = tokens.next() else {
                continue;
            };
            let name = name.to_ascii_lowercase();
            validate_name(&name)?;

            if policy.directives.contains_key(name.as_str()) {
                log::debug!("Ignoring repeated directive '{}'", name);
                continue;
            }

            let mut directive = Directive::new(name.clone());
            directive.append_all(tokens.map(Source::parse));
            policy.directives.insert(Cow::Owned(name), directive);
        }
        Ok(policy)
    }

    pub fn add_directive(&mut self, directive: Directive) -> &mut Self {
        let name = directive.name().to_owned();
        self.directives.insert(Cow::Owned(name), directive);
        self
    }

    #[inline]
    pub fn has_directive(&self, name: &str) -> bool {
        self.directives.contains_key(name)
    }

    #[inline]
    pub fn get_directive(&self, name: &str) -> Option<&Directive> {
        self.directives.get(name)
    }

    /// Serialized entries of `name`, empty if the directive is absent.
    pub fn directive_tokens(&self, name: &str) -> Vec<String> {
        self.directives
            .get(name)
            .map(Directive::tokens)
            .unwrap_or_default()
    }

    /// Appends `source` to `name`, creating the directive with exactly that
    /// source if it does not exist yet.
    pub fn append_directive(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        source: impl Into<Source>,
    ) -> &mut Self {
        let name = name.into();
        self.directives
            .entry(name.clone())
            .or_insert_with(|| Directive::new(name))
            .append(source.into());
        self
    }

    #[inline]
    pub fn set_report_only(&mut self, report_only: bool) -> &mut Self {
        self.report_only = report_only;
        self
    }

    #[inline]
    pub fn is_report_only(&self) -> bool {
        self.report_only
    }

    #[inline]
    pub fn directives(&self) -> impl Iterator<Item = &Directive> {
        self.directives.values()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    #[inline]
    pub fn header_name(&self) -> HeaderName {
        if self.report_only {
            HeaderName::from_static(HEADER_CSP_REPORT_ONLY)
        } else {
            HeaderName::from_static(HEADER_CSP)
        }
    }

    pub fn header_value(&self) -> Result<HeaderValue, CspError> {
        let estimated = self
            .directives
            .values()
            .map(Directive::estimated_size)
            .sum::<usize>()
            + self.directives.len() * SEMICOLON_SPACE.len();
        let mut buffer = BytesMut::with_capacity(estimated.max(DEFAULT_BUFFER_CAPACITY));

        let mut first = true;
        for directive in self.directives.values() {
            if !first {
                buffer.extend_from_slice(SEMICOLON_SPACE);
            }
            directive.write_to_buffer(&mut buffer);
            first = false;
        }

        HeaderValue::from_maybe_shared(buffer.freeze())
            .map_err(|e| CspError::HeaderError(format!("Failed to create header value: {}", e)))
    }

    pub fn validate(&self) -> Result<(), CspError> {
        for directive in self.directives.values() {
            directive.validate()?;
        }
        Ok(())
    }

    #[inline]
    pub fn contains_nonce(&self) -> bool {
        self.directives.values().any(Directive::contains_nonce)
    }

    #[inline]
    pub fn contains_hash(&self) -> bool {
        self.directives.values().any(Directive::contains_hash)
    }
}

impl fmt::Display for CspPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, directive) in self.directives.values().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", directive)?;
        }
        Ok(())
    }
}

impl Hash for CspPolicy {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.directives.len().hash(state);
        for (name, directive) in &self.directives {
            name.hash(state);
            directive.hash(state);
        }
        self.report_only.hash(state);
    }
}

#[derive(Debug, Default)]
pub struct CspPolicyBuilder {
    policy: CspPolicy,
}

impl CspPolicyBuilder {
    #[inline]
    pub fn new() -> Self {
        Self {
            policy: CspPolicy::new(),
        }
    }

    pub fn add_directive<D: DirectiveSpec>(mut self, directive_builder: D) -> Self {
        self.policy.add_directive(directive_builder.build());
        self
    }

    pub fn default_src(self, sources: impl IntoIterator<Item = Source>) -> Self {
        self.add_directive(crate::core::directives::DefaultSrc::new().add_sources(sources))
    }

    pub fn script_src(self, sources: impl IntoIterator<Item = Source>) -> Self {
        self.add_directive(crate::core::directives::ScriptSrc::new().add_sources(sources))
    }

    pub fn style_src(self, sources: impl IntoIterator<Item = Source>) -> Self {
        self.add_directive(crate::core::directives::StyleSrc::new().add_sources(sources))
    }

    pub fn img_src(self, sources: impl IntoIterator<Item = Source>) -> Self {
        self.add_directive(crate::core::directives::ImgSrc::new().add_sources(sources))
    }

    pub fn connect_src(self, sources: impl IntoIterator<Item = Source>) -> Self {
        self.add_directive(crate::core::directives::ConnectSrc::new().add_sources(sources))
    }

    pub fn font_src(self, sources: impl IntoIterator<Item = Source>) -> Self {
        self.add_directive(crate::core::directives::FontSrc::new().add_sources(sources))
    }

    pub fn script_src_elem(self, sources: impl IntoIterator<Item = Source>) -> Self {
        self.add_directive(crate::core::directives::ScriptSrcElem::new().add_sources(sources))
    }

    pub fn style_src_elem(self, sources: impl IntoIterator<Item = Source>) -> Self {
        self.add_directive(crate::core::directives::StyleSrcElem::new().add_sources(sources))
    }

    #[inline]
    pub fn report_only(mut self, enabled: bool) -> Self {
        self.policy.set_report_only(enabled);
        self
    }

    pub fn build(self) -> Result<CspPolicy, CspError> {
        self.policy.validate()?;
        Ok(self.policy)
    }
}
