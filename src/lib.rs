pub mod augment;
pub mod constants;
pub mod core;
pub mod error;
pub mod middleware;
pub mod monitoring;
pub mod prelude;
pub mod security;
pub mod snippet;
mod utils;

// Re-export commonly used types for convenience
pub use augment::{AugmentOutcome, InlineTokens, PolicyAugmenter, ResponseContext, SkipReason};
pub use crate::core::{
    AnalyticsConfig, AnalyticsConfigBuilder, AugmentMode, ConfigStore, CspPolicy,
    CspPolicyBuilder, Directive, Source,
};
pub use error::CspError;
pub use middleware::{configure_csp, csp_augment_middleware, CspAugmentMiddleware, CspExtensions};
pub use monitoring::CspStats;
pub use security::{
    ExternalScriptFetcher, FetchResponse, HashAlgorithm, HashGenerator, HashToken, HttpFetch,
    NonceExtractor, NonceGenerator, NonceToken, ReqwestFetch, RequestNonce,
};
pub use snippet::{DataLayer, PiwikSnippet, SearchValues, SnippetSource, UserType};
