pub mod csp;
pub mod extensions;

pub use csp::{configure_csp, csp_augment_middleware, CspAugmentMiddleware, CspAugmentMiddlewareService};
pub use extensions::CspExtensions;
