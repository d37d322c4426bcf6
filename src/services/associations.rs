// Per-image pixel ↔ GCP links

use std::collections::BTreeMap;

use crate::core::errors::{GcpError, GcpResult};
use crate::core::types::Association;
use crate::services::catalog::GcpCatalog;

/// Ordered associations for every known image.
///
/// An image is "known" once it has an entry here, even an empty one.
#[derive(Debug, Clone, Default)]
pub struct AssociationStore {
    by_image: BTreeMap<String, Vec<Association>>,
}

impl AssociationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `image_name` known, keeping any existing associations.
    pub fn ensure_image(&mut self, image_name: &str) {
        self.by_image.entry(image_name.to_string()).or_default();
    }

    pub fn contains_image(&self, image_name: &str) -> bool {
        self.by_image.contains_key(image_name)
    }

    /// Link a pixel to a catalog GCP, copying the GCP's current coordinates.
    pub fn add(
        &mut self,
        catalog: &GcpCatalog,
        image_name: &str,
        x: i64,
        y: i64,
        gcp_name: &str,
    ) -> GcpResult<Association> {
        let points = self
            .by_image
            .get_mut(image_name)
            .ok_or_else(|| GcpError::ImageNotFound(image_name.to_string()))?;
        let coordinate = catalog
            .get(gcp_name)
            .ok_or_else(|| GcpError::GcpNotFound(gcp_name.to_string()))?;

        let association = Association {
            x,
            y,
            lat: coordinate.lat,
            lon: coordinate.lon,
            gcp_name: gcp_name.to_string(),
        };
        points.push(association.clone());
        Ok(association)
    }

    /// Append a record as-is. Only used when loading persisted rows.
    pub(crate) fn push_restored(&mut self, image_name: &str, association: Association) -> bool {
        match self.by_image.get_mut(image_name) {
            Some(points) => {
                points.push(association);
                true
            }
            None => false,
        }
    }

    /// Associations for an image; empty for an unknown image.
    pub fn get(&self, image_name: &str) -> &[Association] {
        self.by_image
            .get(image_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Image-then-association order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Association)> {
        self.by_image
            .iter()
            .flat_map(|(image, points)| points.iter().map(move |p| (image.as_str(), p)))
    }

    pub fn image_count(&self) -> usize {
        self.by_image.len()
    }

    pub fn association_count(&self) -> usize {
        self.by_image.values().map(Vec::len).sum()
    }
}
