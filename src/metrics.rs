use std::fmt::Write as _;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct Metrics {
    // Compilation
    pub compiles_total: AtomicU64,
    pub compile_failures_total: AtomicU64,
    pub keys_matched_total: AtomicU64,
    pub keys_skipped_total: AtomicU64,

    // Execution
    pub fetches_total: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            compiles_total: AtomicU64::new(0),
            compile_failures_total: AtomicU64::new(0),
            keys_matched_total: AtomicU64::new(0),
            keys_skipped_total: AtomicU64::new(0),
            fetches_total: AtomicU64::new(0),
        }
    }
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::default)
}

pub(crate) fn record_compile() {
    metrics().compiles_total.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_compile_failure() {
    metrics().compile_failures_total.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_key_matched() {
    metrics().keys_matched_total.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_key_skipped() {
    metrics().keys_skipped_total.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_fetch() {
    metrics().fetches_total.fetch_add(1, Ordering::Relaxed);
}

pub fn render_prometheus() -> String {
    let m = metrics();
    let mut s = String::new();
    let _ = writeln!(
        s,
        "# TYPE compiles_total counter\ncompiles_total {}",
        m.compiles_total.load(Ordering::Relaxed)
    );
    let _ = writeln!(
        s,
        "# TYPE compile_failures_total counter\ncompile_failures_total {}",
        m.compile_failures_total.load(Ordering::Relaxed)
    );
    let _ = writeln!(
        s,
        "# TYPE keys_matched_total counter\nkeys_matched_total {}",
        m.keys_matched_total.load(Ordering::Relaxed)
    );
    let _ = writeln!(
        s,
        "# TYPE keys_skipped_total counter\nkeys_skipped_total {}",
        m.keys_skipped_total.load(Ordering::Relaxed)
    );
    let _ = writeln!(
        s,
        "# TYPE fetches_total counter\nfetches_total {}",
        m.fetches_total.load(Ordering::Relaxed)
    );
    s
}
