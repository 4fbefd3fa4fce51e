use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Counters of augmentation outcomes, shared across requests.
#[derive(Debug)]
pub struct CspStats {
    augment_count: AtomicUsize,
    skipped_count: AtomicUsize,
    nonce_applied_count: AtomicUsize,
    nonce_missing_count: AtomicUsize,
    hash_token_count: AtomicUsize,
    fetch_failure_count: AtomicUsize,
    augment_time_ns: AtomicUsize,
    start_time: Instant,
}

impl Default for CspStats {
    fn default() -> Self {
        Self {
            augment_count: Default::default(),
            skipped_count: Default::default(),
            nonce_applied_count: Default::default(),
            nonce_missing_count: Default::default(),
            hash_token_count: Default::default(),
            fetch_failure_count: Default::default(),
            augment_time_ns: Default::default(),
            start_time: Instant::now(),
        }
    }
}

impl CspStats {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn augment_count(&self) -> usize {
        self.augment_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn skipped_count(&self) -> usize {
        self.skipped_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn nonce_applied_count(&self) -> usize {
        self.nonce_applied_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn nonce_missing_count(&self) -> usize {
        self.nonce_missing_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn hash_token_count(&self) -> usize {
        self.hash_token_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn fetch_failure_count(&self) -> usize {
        self.fetch_failure_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn avg_augment_time_ns(&self) -> f64 {
        let count = self.augment_count();
        if count == 0 {
            0.0
        } else {
            self.augment_time_ns.load(Ordering::Relaxed) as f64 / count as f64
        }
    }

    #[inline]
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    #[inline]
    pub(crate) fn increment_augment_count(&self) {
        self.augment_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_skipped_count(&self) {
        self.skipped_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_nonce_applied_count(&self) {
        self.nonce_applied_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_nonce_missing_count(&self) {
        self.nonce_missing_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_hash_tokens(&self, count: usize) {
        self.hash_token_count.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_fetch_failure_count(&self) {
        self.fetch_failure_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_augment_time(&self, time_ns: usize) {
        self.augment_time_ns.fetch_add(time_ns, Ordering::Relaxed);
    }
}

impl fmt::Display for CspStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CSP Augmentation Statistics:")?;
        writeln!(f, "  Uptime: {} seconds", self.uptime_secs())?;
        writeln!(f, "  Policies augmented: {}", self.augment_count())?;
        writeln!(f, "  Responses skipped: {}", self.skipped_count())?;
        writeln!(f, "  Nonces applied: {}", self.nonce_applied_count())?;
        writeln!(f, "  Nonces not found: {}", self.nonce_missing_count())?;
        writeln!(f, "  Hash tokens computed: {}", self.hash_token_count())?;
        writeln!(f, "  Bundle fetch failures: {}", self.fetch_failure_count())?;
        writeln!(
            f,
            "  Average augmentation time: {:.2} ns",
            self.avg_augment_time_ns()
        )?;
        Ok(())
    }
}
