use crate::constants::{HASH_PREFIX_SHA256, HASH_PREFIX_SHA384, HASH_PREFIX_SHA512, SUFFIX_QUOTE};
use crate::core::source::Source;
use crate::error::CspError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ring::digest::{self, Context, SHA256, SHA384, SHA512};
use std::{borrow::Cow, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    #[inline(always)]
    pub fn digest_algorithm(&self) -> &'static digest::Algorithm {
        match self {
            HashAlgorithm::Sha256 => &SHA256,
            HashAlgorithm::Sha384 => &SHA384,
            HashAlgorithm::Sha512 => &SHA512,
        }
    }

    #[inline(always)]
    pub const fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    #[inline(always)]
    pub const fn prefix(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => HASH_PREFIX_SHA256,
            HashAlgorithm::Sha384 => HASH_PREFIX_SHA384,
            HashAlgorithm::Sha512 => HASH_PREFIX_SHA512,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<&str> for HashAlgorithm {
    type Error = CspError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha384" => Ok(HashAlgorithm::Sha384),
            "sha512" => Ok(HashAlgorithm::Sha512),
            _ => Err(CspError::InvalidHashAlgorithm(s.to_string())),
        }
    }
}

/// A formatted hash source such as `'sha256-n4bQ…='`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HashToken {
    algorithm: HashAlgorithm,
    digest: String,
}

impl HashToken {
    #[inline]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Base64 digest without prefix and quotes.
    #[inline]
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl fmt::Display for HashToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.algorithm.prefix(), self.digest, SUFFIX_QUOTE)
    }
}

impl From<HashToken> for Source {
    fn from(token: HashToken) -> Self {
        Source::Hash {
            algorithm: token.algorithm,
            value: Cow::Owned(token.digest),
        }
    }
}

#[derive(Debug)]
pub struct HashGenerator;

impl HashGenerator {
    /// Base64 (standard alphabet, padded) digest of exactly `data`.
    #[inline]
    pub fn generate(algorithm: HashAlgorithm, data: &[u8]) -> String {
        const CHUNK_SIZE: usize = 16384;

        if data.len() <= CHUNK_SIZE {
            let digest = digest::digest(algorithm.digest_algorithm(), data);
            return BASE64.encode(digest.as_ref());
        }

        let mut context = Context::new(algorithm.digest_algorithm());
        for chunk in data.chunks(CHUNK_SIZE) {
            context.update(chunk);
        }
        BASE64.encode(context.finish().as_ref())
    }

    #[inline]
    pub fn generate_source(algorithm: HashAlgorithm, data: &[u8]) -> Source {
        Self::token_with(algorithm, data).into()
    }

    /// The `'sha256-…'` token a browser computes for an inline script whose
    /// text is exactly `data`. The input is hashed as-is: no trimming and no
    /// line ending normalization.
    #[inline]
    pub fn token(data: impl AsRef<[u8]>) -> HashToken {
        Self::token_with(HashAlgorithm::Sha256, data.as_ref())
    }

    pub fn token_with(algorithm: HashAlgorithm, data: &[u8]) -> HashToken {
        HashToken {
            algorithm,
            digest: Self::generate(algorithm, data),
        }
    }

    pub fn tokens<I, T>(scripts: I) -> Vec<HashToken>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        scripts.into_iter().map(|script| Self::token(script)).collect()
    }

    #[inline]
    pub fn verify_hash(algorithm: HashAlgorithm, data: &[u8], hash: &str) -> bool {
        Self::generate(algorithm, data) == hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunked_and_single_pass_digests_agree() {
        let data = vec![b'x'; 40_000];
        let expected = BASE64.encode(digest::digest(&SHA256, &data).as_ref());
        assert_eq!(HashGenerator::generate(HashAlgorithm::Sha256, &data), expected);
    }
}
