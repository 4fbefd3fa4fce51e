pub mod external;
pub mod hash;
pub mod nonce;

pub use external::{ExternalScriptFetcher, FetchResponse, HttpFetch, ReqwestFetch};
pub use hash::{HashAlgorithm, HashGenerator, HashToken};
pub use nonce::{NonceExtractor, NonceGenerator, NonceToken, RequestNonce};
