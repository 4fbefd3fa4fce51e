pub(crate) const HEADER_CSP: &str = "content-security-policy";
pub(crate) const HEADER_CSP_REPORT_ONLY: &str = "content-security-policy-report-only";

pub const DEFAULT_SRC: &str = "default-src";
pub const SCRIPT_SRC: &str = "script-src";
pub const STYLE_SRC: &str = "style-src";
pub const IMG_SRC: &str = "img-src";
pub const CONNECT_SRC: &str = "connect-src";
pub const FONT_SRC: &str = "font-src";
pub const SCRIPT_SRC_ELEM: &str = "script-src-elem";
pub const STYLE_SRC_ELEM: &str = "style-src-elem";

pub(crate) const NONE_SOURCE: &str = "'none'";
pub(crate) const SELF_SOURCE: &str = "'self'";
pub(crate) const UNSAFE_INLINE_SOURCE: &str = "'unsafe-inline'";
pub(crate) const UNSAFE_EVAL_SOURCE: &str = "'unsafe-eval'";
pub(crate) const STRICT_DYNAMIC_SOURCE: &str = "'strict-dynamic'";
pub(crate) const REPORT_SAMPLE_SOURCE: &str = "'report-sample'";
pub(crate) const WASM_UNSAFE_EVAL_SOURCE: &str = "'wasm-unsafe-eval'";
pub(crate) const UNSAFE_HASHES_SOURCE: &str = "'unsafe-hashes'";
pub(crate) const NONCE_PREFIX: &str = "'nonce-";
pub(crate) const HASH_PREFIX_SHA256: &str = "'sha256-";
pub(crate) const HASH_PREFIX_SHA384: &str = "'sha384-";
pub(crate) const HASH_PREFIX_SHA512: &str = "'sha512-";
pub(crate) const SUFFIX_QUOTE: &str = "'";

/// Directives that always receive the analytics origin, created with `'self'` if absent.
pub const REQUIRED_DIRECTIVES: [&str; 5] = [SCRIPT_SRC, CONNECT_SRC, IMG_SRC, FONT_SRC, STYLE_SRC];

/// Directives that are only extended when the base policy already declares them.
pub const OPTIONAL_DIRECTIVES: [&str; 2] = [SCRIPT_SRC_ELEM, STYLE_SRC_ELEM];

/// Required directives that receive inline tokens (nonce or hashes).
pub const INLINE_DIRECTIVES: [&str; 2] = [SCRIPT_SRC, STYLE_SRC];

pub(crate) const MARKER_DATA_SOURCE: &str = "piwik-pro";
pub(crate) const DEFAULT_DATA_LAYER_NAME: &str = "dataLayer";
pub(crate) const DEFAULT_FETCH_TIMEOUT_MS: u64 = 2_000;
pub(crate) const DEFAULT_NONCE_LENGTH: usize = 16;
pub(crate) const SCRIPT_BUNDLE_SUFFIX: &str = ".js";

pub(crate) const DEFAULT_BUFFER_CAPACITY: usize = 512;
pub(crate) const SEMICOLON_SPACE: &[u8] = b"; ";
