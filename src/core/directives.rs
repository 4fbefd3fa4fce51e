use crate::constants;
use crate::core::source::Source;
use crate::error::CspError;
use crate::utils::BufferWriter;
use bytes::BytesMut;
use smallvec::SmallVec;
use std::{
    borrow::Cow,
    fmt,
    hash::{Hash, Hasher},
};

/// A named directive and its ordered source list.
///
/// Sources are append-only: the same token may appear more than once and the
/// insertion order is the serialization order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    name: Cow<'static, str>,
    sources: SmallVec<[Source; 4]>,
}

impl Directive {
    #[inline]
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            sources: SmallVec::new(),
        }
    }

    #[inline]
    pub fn append(&mut self, source: Source) -> &mut Self {
        self.sources.push(source);
        self
    }

    pub fn append_all<I>(&mut self, sources: I) -> &mut Self
    where
        I: IntoIterator<Item = Source>,
    {
        self.sources.extend(sources);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Serialized form of every entry, in order.
    pub fn tokens(&self) -> Vec<String> {
        self.sources.iter().map(ToString::to_string).collect()
    }

    #[inline]
    pub fn allows_unsafe_inline(&self) -> bool {
        self.sources.iter().any(Source::allows_unsafe_inline)
    }

    #[inline]
    pub fn contains_nonce(&self) -> bool {
        self.sources.iter().any(Source::contains_nonce)
    }

    #[inline]
    pub fn contains_hash(&self) -> bool {
        self.sources.iter().any(Source::contains_hash)
    }

    pub fn validate(&self) -> Result<(), CspError> {
        validate_name(&self.name)?;

        for source in &self.sources {
            match source {
                Source::Host(host) if host.is_empty() => {
                    return Err(CspError::InvalidDirectiveValue(format!(
                        "Directive '{}' contains empty host",
                        self.name
                    )));
                }
                Source::Nonce(nonce) if nonce.is_empty() => {
                    return Err(CspError::InvalidDirectiveValue(format!(
                        "Directive '{}' contains empty nonce",
                        self.name
                    )));
                }
                Source::Hash { value, .. } if value.is_empty() => {
                    return Err(CspError::InvalidDirectiveValue(format!(
                        "Directive '{}' contains empty hash",
                        self.name
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }

    #[inline]
    pub fn estimated_size(&self) -> usize {
        let mut size = self.name.len();
        if !self.sources.is_empty() {
            size += self.sources.len();
            size += self
                .sources
                .iter()
                .map(Source::estimated_size)
                .sum::<usize>();
        }
        size
    }
}

pub(crate) fn validate_name(name: &str) -> Result<(), CspError> {
    if name.is_empty()
        || !name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
    {
        return Err(CspError::InvalidDirectiveName(name.to_owned()));
    }
    Ok(())
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for source in &self.sources {
            f.write_str(" ")?;
            write!(f, "{}", source)?;
        }
        Ok(())
    }
}

impl BufferWriter for Directive {
    fn write_to_buffer(&self, buffer: &mut BytesMut) {
        buffer.extend_from_slice(self.name.as_bytes());
        for source in &self.sources {
            buffer.extend_from_slice(b" ");
            source.write_to_buffer(buffer);
        }
    }
}

impl Hash for Directive {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.sources.hash(state);
    }
}

pub trait DirectiveSpec: Sized {
    fn add_sources<I>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = Source>,
    {
        self.inner_mut().append_all(sources);
        self
    }

    fn inner_mut(&mut self) -> &mut Directive;

    fn build(self) -> Directive;
}

macro_rules! define_directive {
    ($name:ident, $directive_name:expr) => {
        #[derive(Debug, Clone)]
        pub struct $name {
            directive: Directive,
        }

        impl $name {
            #[inline]
            pub fn new() -> Self {
                Self {
                    directive: Directive::new($directive_name),
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl DirectiveSpec for $name {
            #[inline]
            fn inner_mut(&mut self) -> &mut Directive {
                &mut self.directive
            }

            #[inline]
            fn build(self) -> Directive {
                self.directive
            }
        }
    };
}

define_directive!(DefaultSrc, constants::DEFAULT_SRC);
define_directive!(ScriptSrc, constants::SCRIPT_SRC);
define_directive!(StyleSrc, constants::STYLE_SRC);
define_directive!(ImgSrc, constants::IMG_SRC);
define_directive!(ConnectSrc, constants::CONNECT_SRC);
define_directive!(FontSrc, constants::FONT_SRC);
define_directive!(ScriptSrcElem, constants::SCRIPT_SRC_ELEM);
define_directive!(StyleSrcElem, constants::STYLE_SRC_ELEM);
