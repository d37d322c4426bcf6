// Project facade over the registry, catalog and association store
//
// Built once at startup and shared with handlers. The catalog and the
// association store sit behind one async mutex; every mutating operation
// keeps it for its whole duration, file writes included.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::core::config::StorageConfig;
use crate::core::errors::GcpResult;
use crate::core::types::{Association, GcpCoordinate, IncomingImage, LoadReport};
use crate::services::associations::AssociationStore;
use crate::services::catalog::GcpCatalog;
use crate::services::image_registry::ImageRegistry;
use crate::services::persistence;
use crate::utils::Metrics;

#[derive(Debug, Default)]
struct Ledger {
    catalog: GcpCatalog,
    associations: AssociationStore,
}

pub struct GcpProject {
    registry: ImageRegistry,
    csv_path: PathBuf,
    ledger: Mutex<Ledger>,
    metrics: Metrics,
}

impl GcpProject {
    /// Open the upload directory and rehydrate state from the CSV file.
    pub async fn open(storage: &StorageConfig, metrics: Metrics) -> Result<(Self, LoadReport)> {
        let registry = ImageRegistry::open(&storage.upload_dir).await?;

        let mut ledger = Ledger::default();
        let images = registry
            .list_images()
            .await
            .with_context(|| format!("Failed to list {}", storage.upload_dir.display()))?;
        for image in &images {
            ledger.associations.ensure_image(image);
        }

        let csv_path = storage.csv_path.clone();
        let strict = storage.strict_csv_load;
        let report = tokio::task::spawn_blocking(move || {
            let report = persistence::load_csv(
                &csv_path,
                &mut ledger.catalog,
                &mut ledger.associations,
                strict,
            );
            report.map(|report| (ledger, report))
        })
        .await
        .context("Failed to spawn blocking task for CSV load")?;
        let (ledger, report) = report
            .with_context(|| format!("Failed to load {}", storage.csv_path.display()))?;

        info!(
            "Loaded {} images, {} associations, {} GCPs ({} rows skipped, {} for unknown images)",
            report.images,
            report.rows_loaded,
            report.gcps_restored,
            report.rows_skipped,
            report.rows_unknown_image
        );
        metrics.record_csv_load(report.rows_loaded, report.rows_skipped);

        let project = Self {
            registry,
            csv_path: storage.csv_path.clone(),
            ledger: Mutex::new(ledger),
            metrics,
        };
        Ok((project, report))
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// All regular files in the upload directory
    pub async fn list_images(&self) -> GcpResult<Vec<String>> {
        self.registry.list().await
    }

    pub async fn fetch_image(&self, filename: &str) -> GcpResult<Vec<u8>> {
        self.registry.fetch(filename).await
    }

    /// Store one upload and make the image known.
    pub async fn store_image(&self, image: IncomingImage) -> GcpResult<String> {
        let mut ledger = self.ledger.lock().await;
        match self.registry.store(&image.filename, &image.bytes).await {
            Ok(()) => {
                ledger.associations.ensure_image(&image.filename);
                self.metrics.record_uploads(1);
                info!("Uploaded {}", image.filename);
                Ok(image.filename)
            }
            Err(e) => {
                self.metrics.record_upload_rejected();
                Err(e)
            }
        }
    }

    /// Store a batch of uploads; see [`ImageRegistry::store_all`] for the
    /// all-or-nothing validation policy.
    ///
    /// Each file becomes a known image as soon as it is written, so a batch
    /// that fails on I/O part way keeps the files it wrote usable.
    pub async fn store_images(&self, images: Vec<IncomingImage>) -> GcpResult<Vec<String>> {
        let mut ledger = self.ledger.lock().await;
        let associations = &mut ledger.associations;
        let mut written = 0usize;
        let result = self
            .registry
            .store_all(&images, |name| {
                associations.ensure_image(name);
                written += 1;
            })
            .await;
        self.metrics.record_uploads(written);

        let stored = match result {
            Ok(stored) => stored,
            Err(e) => {
                if written > 0 {
                    warn!("Batch upload stopped after {} of {} files: {}", written, images.len(), e);
                }
                self.metrics.record_upload_rejected();
                return Err(e);
            }
        };
        info!("Uploaded {} files", stored.len());
        Ok(stored)
    }

    pub async fn create_gcp(&self, name: &str, lat: f64, lon: f64) -> GcpResult<GcpCoordinate> {
        let mut ledger = self.ledger.lock().await;
        match ledger.catalog.create(name, lat, lon) {
            Ok(coordinate) => {
                self.metrics.record_gcp_created();
                info!("Created GCP {:?} at ({}, {})", name, lat, lon);
                Ok(coordinate)
            }
            Err(e) => {
                self.metrics.record_gcp_rejected();
                Err(e)
            }
        }
    }

    pub async fn list_gcps(&self) -> BTreeMap<String, GcpCoordinate> {
        self.ledger.lock().await.catalog.entries().clone()
    }

    pub async fn add_association(
        &self,
        image_name: &str,
        x: i64,
        y: i64,
        gcp_name: &str,
    ) -> GcpResult<Association> {
        let mut ledger = self.ledger.lock().await;
        let Ledger {
            catalog,
            associations,
        } = &mut *ledger;
        match associations.add(catalog, image_name, x, y, gcp_name) {
            Ok(association) => {
                self.metrics.record_association_added();
                Ok(association)
            }
            Err(e) => {
                self.metrics.record_association_rejected();
                Err(e)
            }
        }
    }

    /// Associations of one image, empty when the image is unknown
    pub async fn get_associations(&self, image_name: &str) -> Vec<Association> {
        self.ledger.lock().await.associations.get(image_name).to_vec()
    }

    /// Rewrite the CSV file from current state and return its contents.
    pub async fn export_csv(&self) -> GcpResult<Vec<u8>> {
        let start = Instant::now();
        let ledger = self.ledger.lock().await;
        let bytes = persistence::export_csv(&self.csv_path, &ledger.associations)
            .await
            .map_err(|e| {
                warn!("CSV export to {} failed: {}", self.csv_path.display(), e);
                e
            })?;
        self.metrics.record_csv_export(start.elapsed());
        info!(
            "Exported {} associations to {}",
            ledger.associations.association_count(),
            self.csv_path.display()
        );
        Ok(bytes)
    }
}
