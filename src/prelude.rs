pub use crate::augment::{AugmentOutcome, PolicyAugmenter, ResponseContext};
pub use crate::core::{AnalyticsConfig, AnalyticsConfigBuilder, AugmentMode, ConfigStore, CspPolicy, CspPolicyBuilder, Source};
pub use crate::middleware::{configure_csp, csp_augment_middleware, CspAugmentMiddleware, CspExtensions};
pub use crate::security::{ExternalScriptFetcher, HashGenerator, NonceExtractor, NonceGenerator};
pub use crate::snippet::{DataLayer, PiwikSnippet, SnippetSource};
