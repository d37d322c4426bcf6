// CSV import/export of associations
//
// The CSV is the only thing persisted. The catalog is rebuilt from the
// lat/lon carried on each association row, so a GCP that was never linked
// to an image does not survive a restart.

use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::errors::{PersistenceError, PersistenceResult};
use crate::core::types::{truncate_pixel, Association, LoadReport};
use crate::services::associations::AssociationStore;
use crate::services::catalog::{validate_coordinate, GcpCatalog};

pub const COL_IMAGE: &str = "Image Name";
pub const COL_X: &str = "pixel x";
pub const COL_Y: &str = "pixel y";
pub const COL_LAT: &str = "latitude";
pub const COL_LON: &str = "longitude";
pub const COL_GCP: &str = "gcp name";

/// Column order used on export
pub const CSV_HEADER: [&str; 6] = [COL_IMAGE, COL_X, COL_Y, COL_LAT, COL_LON, COL_GCP];

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    image_name: &'a str,
    x: i64,
    y: i64,
    lat: f64,
    lon: f64,
    gcp_name: &'a str,
}

/// Header positions, looked up by name so column order is free
struct Columns {
    image: usize,
    x: usize,
    y: usize,
    lat: usize,
    lon: usize,
    gcp: usize,
}

impl Columns {
    fn locate(headers: &StringRecord, path: &Path) -> PersistenceResult<Self> {
        let find = |column: &'static str| {
            headers
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| PersistenceError::MissingColumn {
                    path: path.display().to_string(),
                    column,
                })
        };
        Ok(Self {
            image: find(COL_IMAGE)?,
            x: find(COL_X)?,
            y: find(COL_Y)?,
            lat: find(COL_LAT)?,
            lon: find(COL_LON)?,
            gcp: find(COL_GCP)?,
        })
    }
}

fn field<'r>(record: &'r StringRecord, index: usize, column: &str) -> Result<&'r str, String> {
    record
        .get(index)
        .ok_or_else(|| format!("missing {:?} field", column))
}

fn parse_float(record: &StringRecord, index: usize, column: &str) -> Result<f64, String> {
    let raw = field(record, index, column)?;
    raw.trim()
        .parse::<f64>()
        .map_err(|_| format!("{:?} is not a number: {:?}", column, raw))
}

fn parse_pixel(record: &StringRecord, index: usize, column: &str) -> Result<i64, String> {
    let value = parse_float(record, index, column)?;
    truncate_pixel(value).ok_or_else(|| format!("{:?} out of range: {}", column, value))
}

fn parse_association(record: &StringRecord, cols: &Columns) -> Result<Association, String> {
    let x = parse_pixel(record, cols.x, COL_X)?;
    let y = parse_pixel(record, cols.y, COL_Y)?;
    let lat = parse_float(record, cols.lat, COL_LAT)?;
    let lon = parse_float(record, cols.lon, COL_LON)?;
    validate_coordinate(lat, lon).map_err(|e| e.to_string())?;
    let gcp_name = field(record, cols.gcp, COL_GCP)?;
    if gcp_name.is_empty() {
        return Err(format!("empty {:?}", COL_GCP));
    }
    Ok(Association {
        x,
        y,
        lat,
        lon,
        gcp_name: gcp_name.to_string(),
    })
}

/// Either skip a bad row with a warning or, in strict mode, abort the load.
fn reject_row(
    report: &mut LoadReport,
    strict: bool,
    line: u64,
    reason: String,
) -> PersistenceResult<()> {
    if strict {
        return Err(PersistenceError::MalformedPersistedRow { line, reason });
    }
    warn!("Skipping CSV line {}: {}", line, reason);
    report.rows_skipped += 1;
    Ok(())
}

/// Load persisted associations into `store` and rebuild `catalog` from them.
///
/// Only images already made known in `store` receive rows; rows for other
/// images are dropped. A missing file is an empty starting state.
pub fn load_csv(
    path: &Path,
    catalog: &mut GcpCatalog,
    store: &mut AssociationStore,
    strict: bool,
) -> PersistenceResult<LoadReport> {
    let mut report = LoadReport {
        images: store.image_count(),
        ..LoadReport::default()
    };

    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("{} not found. Starting with an empty dataset.", path.display());
            return Ok(report);
        }
        Err(e) => {
            return Err(PersistenceError::ReadFailed {
                path: path.display().to_string(),
                source: e.into(),
            })
        }
    };

    let read_failed = |source: csv::Error| PersistenceError::ReadFailed {
        path: path.display().to_string(),
        source,
    };

    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(file);
    let headers = rdr.headers().map_err(read_failed)?.clone();
    let cols = Columns::locate(&headers, path)?;

    for result in rdr.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                let row_level = matches!(
                    e.kind(),
                    csv::ErrorKind::UnequalLengths { .. } | csv::ErrorKind::Utf8 { .. }
                );
                if !row_level {
                    return Err(read_failed(e));
                }
                reject_row(&mut report, strict, line, e.to_string())?;
                continue;
            }
        };
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let image_name = record.get(cols.image).unwrap_or_default();
        if !store.contains_image(image_name) {
            debug!("Dropping CSV line {} for unknown image {:?}", line, image_name);
            report.rows_unknown_image += 1;
            continue;
        }

        let association = match parse_association(&record, &cols) {
            Ok(association) => association,
            Err(reason) => {
                reject_row(&mut report, strict, line, reason)?;
                continue;
            }
        };

        if catalog.restore(&association.gcp_name, association.lat, association.lon) {
            report.gcps_restored += 1;
        }
        store.push_restored(image_name, association);
        report.rows_loaded += 1;
    }

    Ok(report)
}

/// Render every association as CSV bytes, header first.
pub fn render_csv(store: &AssociationStore) -> PersistenceResult<Vec<u8>> {
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    wtr.write_record(CSV_HEADER)?;
    for (image_name, association) in store.iter() {
        wtr.serialize(CsvRow {
            image_name,
            x: association.x,
            y: association.y,
            lat: association.lat,
            lon: association.lon,
            gcp_name: &association.gcp_name,
        })?;
    }
    wtr.into_inner()
        .map_err(|e| PersistenceError::SerializeFailed(e.into_error().into()))
}

/// Overwrite `path` with the rendered CSV and return the bytes written.
pub async fn export_csv(path: &Path, store: &AssociationStore) -> PersistenceResult<Vec<u8>> {
    let bytes = render_csv(store)?;
    tokio::fs::write(path, &bytes)
        .await
        .map_err(|source| PersistenceError::WriteFailed {
            path: path.display().to_string(),
            source,
        })?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScratchDir;

    fn store_with(images: &[&str]) -> AssociationStore {
        let mut store = AssociationStore::new();
        for image in images {
            store.ensure_image(image);
        }
        store
    }

    #[test]
    fn test_missing_file_is_empty_state() {
        let dir = ScratchDir::new("csv_missing");
        let mut catalog = GcpCatalog::new();
        let mut store = store_with(&["a.jpg"]);

        let report = load_csv(&dir.join("gcps.csv"), &mut catalog, &mut store, false).unwrap();
        assert_eq!(report.images, 1);
        assert_eq!(report.rows_loaded, 0);
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_load_reorders_columns_and_truncates_pixels() {
        let dir = ScratchDir::new("csv_columns");
        let path = dir.join("gcps.csv");
        std::fs::write(
            &path,
            "gcp name,latitude,longitude,pixel y,pixel x,Image Name\n\
             P1,12.5,-8.25,20.9,10.2,a.jpg\n\
             P1,99.0,99.0,-4.7,3,a.jpg\n\
             P2,1.0,2.0,0,0,gone.jpg\n",
        )
        .unwrap();

        let mut catalog = GcpCatalog::new();
        let mut store = store_with(&["a.jpg"]);
        let report = load_csv(&path, &mut catalog, &mut store, false).unwrap();

        // Second row is out of range latitude, third names an unknown image
        assert_eq!(report.rows_loaded, 1);
        assert_eq!(report.rows_skipped, 1);
        assert_eq!(report.rows_unknown_image, 1);
        assert_eq!(report.gcps_restored, 1);
        assert_eq!(
            store.get("a.jpg"),
            &[Association { x: 10, y: 20, lat: 12.5, lon: -8.25, gcp_name: "P1".into() }]
        );
        assert!(!catalog.contains("P2"));
    }

    #[test]
    fn test_first_row_wins_for_catalog() {
        let dir = ScratchDir::new("csv_first_wins");
        let path = dir.join("gcps.csv");
        std::fs::write(
            &path,
            "Image Name,pixel x,pixel y,latitude,longitude,gcp name\n\
             a.jpg,1,1,10.0,20.0,P1\n\
             a.jpg,2,2,11.0,21.0,P1\n",
        )
        .unwrap();

        let mut catalog = GcpCatalog::new();
        let mut store = store_with(&["a.jpg"]);
        load_csv(&path, &mut catalog, &mut store, false).unwrap();

        assert_eq!(catalog.get("P1").map(|c| c.lat), Some(10.0));
        // Each row keeps its own denormalized copy
        assert_eq!(store.get("a.jpg")[1].lat, 11.0);
    }

    #[test]
    fn test_malformed_row_skipped_or_fatal() {
        let dir = ScratchDir::new("csv_malformed");
        let path = dir.join("gcps.csv");
        std::fs::write(
            &path,
            "Image Name,pixel x,pixel y,latitude,longitude,gcp name\n\
             a.jpg,abc,1,10.0,20.0,P1\n\
             a.jpg,1,1\n\
             a.jpg,5,6,10.0,20.0,P1\n",
        )
        .unwrap();

        let mut catalog = GcpCatalog::new();
        let mut store = store_with(&["a.jpg"]);
        let report = load_csv(&path, &mut catalog, &mut store, false).unwrap();
        assert_eq!(report.rows_skipped, 2);
        assert_eq!(report.rows_loaded, 1);
        assert_eq!(store.get("a.jpg")[0].x, 5);

        let mut catalog = GcpCatalog::new();
        let mut store = store_with(&["a.jpg"]);
        let err = load_csv(&path, &mut catalog, &mut store, true).unwrap_err();
        assert!(matches!(err, PersistenceError::MalformedPersistedRow { line: 2, .. }));
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let dir = ScratchDir::new("csv_header");
        let path = dir.join("gcps.csv");
        std::fs::write(&path, "Image Name,pixel x,pixel y,latitude,longitude\n").unwrap();

        let mut catalog = GcpCatalog::new();
        let mut store = store_with(&["a.jpg"]);
        let err = load_csv(&path, &mut catalog, &mut store, false).unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::MissingColumn { column: COL_GCP, .. }
        ));
    }

    #[test]
    fn test_render_empty_store_writes_header() {
        let store = store_with(&["a.jpg"]);
        let bytes = render_csv(&store).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "Image Name,pixel x,pixel y,latitude,longitude,gcp name\n"
        );
    }

    #[test]
    fn test_render_quotes_and_orders_rows() {
        let mut catalog = GcpCatalog::new();
        catalog.create("P1", 12.5, -8.25).unwrap();
        catalog.create("corner, NE", 1.0, 2.0).unwrap();
        let mut store = store_with(&["b.png", "a.jpg"]);
        store.add(&catalog, "b.png", 3, 4, "corner, NE").unwrap();
        store.add(&catalog, "a.jpg", 10, 20, "P1").unwrap();

        let text = String::from_utf8(render_csv(&store).unwrap()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[1], "a.jpg,10,20,12.5,-8.25,P1");
        assert_eq!(lines[2], "b.png,3,4,1.0,2.0,\"corner, NE\"");
    }

    #[tokio::test]
    async fn test_export_overwrites_file() {
        let dir = ScratchDir::new("csv_export");
        let path = dir.join("gcps.csv");
        std::fs::write(&path, "stale contents that are longer than the new file\n").unwrap();

        let store = store_with(&[]);
        let bytes = export_csv(&path, &store).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), bytes);
    }
}
