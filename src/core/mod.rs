pub mod config;
pub mod directives;
pub mod policy;
pub mod source;

pub use config::{AnalyticsConfig, AnalyticsConfigBuilder, AugmentMode, ConfigStore};
pub use directives::*;
pub use policy::{CspPolicy, CspPolicyBuilder};
pub use source::Source;
