use std::collections::BTreeMap;

use crate::core::errors::{GcpError, GcpResult};
use crate::core::types::GcpCoordinate;

/// Named ground control points.
///
/// Entries are insert-only: once a name is taken it keeps its coordinates.
#[derive(Debug, Clone, Default)]
pub struct GcpCatalog {
    entries: BTreeMap<String, GcpCoordinate>,
}

/// Check a coordinate pair is finite and on the globe.
pub fn validate_coordinate(lat: f64, lon: f64) -> GcpResult<()> {
    let lat_ok = lat.is_finite() && (-90.0..=90.0).contains(&lat);
    let lon_ok = lon.is_finite() && (-180.0..=180.0).contains(&lon);
    if lat_ok && lon_ok {
        Ok(())
    } else {
        Err(GcpError::InvalidCoordinate { lat, lon })
    }
}

impl GcpCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new GCP. Fails without touching the catalog if the name is taken.
    pub fn create(&mut self, name: &str, lat: f64, lon: f64) -> GcpResult<GcpCoordinate> {
        if name.is_empty() {
            return Err(GcpError::MissingField("gcp_name must not be empty".to_string()));
        }
        validate_coordinate(lat, lon)?;
        if self.entries.contains_key(name) {
            return Err(GcpError::DuplicateName(name.to_string()));
        }
        let coordinate = GcpCoordinate { lat, lon };
        self.entries.insert(name.to_string(), coordinate);
        Ok(coordinate)
    }

    /// Insert only if absent; returns whether an entry was added.
    ///
    /// Used when rebuilding the catalog from persisted association rows, where
    /// the first row seen for a name wins.
    pub(crate) fn restore(&mut self, name: &str, lat: f64, lon: f64) -> bool {
        if self.entries.contains_key(name) {
            return false;
        }
        self.entries.insert(name.to_string(), GcpCoordinate { lat, lon });
        true
    }

    pub fn get(&self, name: &str) -> Option<GcpCoordinate> {
        self.entries.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Full name → coordinate mapping
    pub fn entries(&self) -> &BTreeMap<String, GcpCoordinate> {
        &self.entries
    }
}
