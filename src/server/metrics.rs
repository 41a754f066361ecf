//! Prometheus metrics definitions.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Scans finished, by outcome (`completed` or `failed`).
pub static SCANS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "docindex_scans_total",
        "Total number of finished scans",
        &["outcome"]
    )
    .unwrap()
});

/// Scans currently running or committing.
pub static ACTIVE_SCANS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("docindex_active_scans", "Number of live scan sessions").unwrap()
});

/// Files observed by scans.
pub static FILES_SCANNED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("docindex_files_scanned_total", "Total files observed by scans")
        .unwrap()
});

/// Files removed by bulk deletion.
pub static FILES_DELETED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "docindex_files_deleted_total",
        "Total files removed by bulk deletion"
    )
    .unwrap()
});

/// Scan wall-clock duration.
pub static SCAN_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "docindex_scan_duration_seconds",
        "Scan duration in seconds",
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0]
    )
    .unwrap()
});

/// Files currently in the catalog.
pub static FILES_CATALOGED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("docindex_files_cataloged", "Number of cataloged files").unwrap()
});

/// Initialize all metrics (call once at startup).
pub fn init_metrics() {
    // Access lazy statics to register them
    let _ = &*SCANS_TOTAL;
    let _ = &*ACTIVE_SCANS;
    let _ = &*FILES_SCANNED;
    let _ = &*FILES_DELETED;
    let _ = &*SCAN_DURATION;
    let _ = &*FILES_CATALOGED;

    tracing::debug!("Prometheus metrics initialized");
}
