use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Export latency samples kept for avg/p95; older samples are dropped
const MAX_LATENCY_SAMPLES: usize = 1000;

/// Metrics collector for the workbench.
///
/// Tracks uploads, catalog and association activity, CSV import/export and
/// per-endpoint request counts. Cheap to clone; all clones share counters.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    // Uploads
    images_uploaded: AtomicUsize,
    uploads_rejected: AtomicUsize,

    // Catalog
    gcps_created: AtomicUsize,
    gcps_rejected: AtomicUsize,

    // Associations
    associations_added: AtomicUsize,
    associations_rejected: AtomicUsize,

    // Persistence
    csv_rows_loaded: AtomicUsize,
    csv_rows_skipped: AtomicUsize,
    csv_exports: AtomicUsize,
    csv_export_ms: RwLock<Vec<u64>>,

    // Per-endpoint request counters
    endpoint_counters: DashMap<String, AtomicUsize>,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                images_uploaded: AtomicUsize::new(0),
                uploads_rejected: AtomicUsize::new(0),
                gcps_created: AtomicUsize::new(0),
                gcps_rejected: AtomicUsize::new(0),
                associations_added: AtomicUsize::new(0),
                associations_rejected: AtomicUsize::new(0),
                csv_rows_loaded: AtomicUsize::new(0),
                csv_rows_skipped: AtomicUsize::new(0),
                csv_exports: AtomicUsize::new(0),
                csv_export_ms: RwLock::new(Vec::new()),
                endpoint_counters: DashMap::new(),
                start_time: Instant::now(),
            }),
        }
    }

    pub fn record_uploads(&self, count: usize) {
        self.inner.images_uploaded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_upload_rejected(&self) {
        self.inner.uploads_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_gcp_created(&self) {
        self.inner.gcps_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_gcp_rejected(&self) {
        self.inner.gcps_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_association_added(&self) {
        self.inner.associations_added.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_association_rejected(&self) {
        self.inner.associations_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_csv_load(&self, rows_loaded: usize, rows_skipped: usize) {
        self.inner.csv_rows_loaded.fetch_add(rows_loaded, Ordering::Relaxed);
        self.inner.csv_rows_skipped.fetch_add(rows_skipped, Ordering::Relaxed);
    }

    pub fn record_csv_export(&self, duration: Duration) {
        self.inner.csv_exports.fetch_add(1, Ordering::Relaxed);
        let mut samples = self.inner.csv_export_ms.write();
        if samples.len() >= MAX_LATENCY_SAMPLES {
            let excess = samples.len() + 1 - MAX_LATENCY_SAMPLES;
            samples.drain(..excess);
        }
        samples.push(duration.as_millis() as u64);
    }

    pub fn record_endpoint_request(&self, endpoint: &str) {
        self.inner.endpoint_counters
            .entry(endpoint.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let export_ms = self.inner.csv_export_ms.read();
        let csv_export_avg_ms = avg(&export_ms);
        let csv_export_p95_ms = percentile(&export_ms, 0.95);
        drop(export_ms);

        let endpoint_requests = self
            .inner
            .endpoint_counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .collect();

        MetricsSnapshot {
            images_uploaded: self.inner.images_uploaded.load(Ordering::Relaxed),
            uploads_rejected: self.inner.uploads_rejected.load(Ordering::Relaxed),
            gcps_created: self.inner.gcps_created.load(Ordering::Relaxed),
            gcps_rejected: self.inner.gcps_rejected.load(Ordering::Relaxed),
            associations_added: self.inner.associations_added.load(Ordering::Relaxed),
            associations_rejected: self.inner.associations_rejected.load(Ordering::Relaxed),
            csv_rows_loaded: self.inner.csv_rows_loaded.load(Ordering::Relaxed),
            csv_rows_skipped: self.inner.csv_rows_skipped.load(Ordering::Relaxed),
            csv_exports: self.inner.csv_exports.load(Ordering::Relaxed),
            csv_export_avg_ms,
            csv_export_p95_ms,
            endpoint_requests,
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }

    /// Generate Prometheus-format metrics
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = format!(
            r#"# HELP images_uploaded_total Images stored through the upload endpoints
# TYPE images_uploaded_total counter
images_uploaded_total {{}} {}

# HELP uploads_rejected_total Upload requests rejected
# TYPE uploads_rejected_total counter
uploads_rejected_total {{}} {}

# HELP gcps_created_total GCPs added to the catalog
# TYPE gcps_created_total counter
gcps_created_total {{}} {}

# HELP gcps_rejected_total GCP creations rejected
# TYPE gcps_rejected_total counter
gcps_rejected_total {{}} {}

# HELP associations_added_total Pixel to GCP associations recorded
# TYPE associations_added_total counter
associations_added_total {{}} {}

# HELP associations_rejected_total Associations rejected for unknown image or GCP
# TYPE associations_rejected_total counter
associations_rejected_total {{}} {}

# HELP csv_rows_loaded_total CSV rows restored at startup
# TYPE csv_rows_loaded_total counter
csv_rows_loaded_total {{}} {}

# HELP csv_rows_skipped_total Malformed CSV rows skipped at startup
# TYPE csv_rows_skipped_total counter
csv_rows_skipped_total {{}} {}

# HELP csv_exports_total CSV exports written
# TYPE csv_exports_total counter
csv_exports_total {{}} {}

# HELP csv_export_avg_ms Average CSV export duration in milliseconds
# TYPE csv_export_avg_ms gauge
csv_export_avg_ms {{}} {}

# HELP uptime_seconds Application uptime in seconds
# TYPE uptime_seconds counter
uptime_seconds {{}} {}
"#,
            snapshot.images_uploaded,
            snapshot.uploads_rejected,
            snapshot.gcps_created,
            snapshot.gcps_rejected,
            snapshot.associations_added,
            snapshot.associations_rejected,
            snapshot.csv_rows_loaded,
            snapshot.csv_rows_skipped,
            snapshot.csv_exports,
            snapshot.csv_export_avg_ms,
            snapshot.uptime_seconds,
        );

        if !snapshot.endpoint_requests.is_empty() {
            out.push_str("\n# HELP http_requests_total Requests per endpoint\n");
            out.push_str("# TYPE http_requests_total counter\n");
            for (endpoint, count) in &snapshot.endpoint_requests {
                out.push_str(&format!(
                    "http_requests_total {{endpoint=\"{}\"}} {}\n",
                    endpoint, count
                ));
            }
        }
        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub images_uploaded: usize,
    pub uploads_rejected: usize,
    pub gcps_created: usize,
    pub gcps_rejected: usize,
    pub associations_added: usize,
    pub associations_rejected: usize,
    pub csv_rows_loaded: usize,
    pub csv_rows_skipped: usize,
    pub csv_exports: usize,
    pub csv_export_avg_ms: u64,
    pub csv_export_p95_ms: u64,
    pub endpoint_requests: BTreeMap<String, usize>,
    pub uptime_seconds: u64,
}

fn percentile(values: &[u64], p: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let idx = ((values.len() as f64 - 1.0) * p) as usize;
    sorted[idx]
}

fn avg(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.iter().sum::<u64>() / values.len() as u64
}
