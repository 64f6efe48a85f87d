//! Converts the selected vehicle csv into point features.
//!
//! Rows become GeoJSON points in WGS84 (EPSG:4326, the only CRS GeoJSON allows)
//! built from the `LONGITUDE` and `LATITUDE` columns. Every other column is
//! carried across as a string property.

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue, Value};
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::errors::{FleetError, Result};
use crate::staging::remove_if_exists;

pub const LONGITUDE_FIELD: &str = "LONGITUDE";
pub const LATITUDE_FIELD: &str = "LATITUDE";

#[derive(Debug, Clone)]
pub struct PointLayer {
    pub collection: FeatureCollection,
    /// Rows dropped because longitude or latitude was empty.
    pub skipped_rows: usize,
}

impl PointLayer {
    pub fn feature_count(&self) -> usize {
        self.collection.features.len()
    }
}

pub fn csv_to_points(path: &Path) -> Result<PointLayer> {
    info!(path = %path.display(), "Converting csv to point features");
    let file = File::open(path)?;
    let layer = read_points(file, &path.display().to_string())?;
    info!(
        path = %path.display(),
        features = layer.feature_count(),
        skipped = layer.skipped_rows,
        "Converted csv to point features"
    );
    Ok(layer)
}

/// `source` only labels errors.
pub fn read_points(reader: impl Read, source: &str) -> Result<PointLayer> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(false)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| FleetError::MissingColumn {
                file: source.to_string(),
                column: name.to_string(),
            })
    };
    let lon_idx = column(LONGITUDE_FIELD)?;
    let lat_idx = column(LATITUDE_FIELD)?;

    let mut features = Vec::new();
    let mut skipped_rows = 0;

    for (i, record) in csv_reader.records().enumerate() {
        let record = record?;
        // header is line 1
        let row = i + 2;
        let lon_raw = record.get(lon_idx).unwrap_or("");
        let lat_raw = record.get(lat_idx).unwrap_or("");
        if lon_raw.is_empty() || lat_raw.is_empty() {
            debug!(source, row, "Skipping row without coordinates");
            skipped_rows += 1;
            continue;
        }

        let lon = parse_coordinate(lon_raw, 180.0, source, row)?;
        let lat = parse_coordinate(lat_raw, 90.0, source, row)?;

        let mut properties = JsonObject::new();
        for (idx, (name, value)) in headers.iter().zip(record.iter()).enumerate() {
            if idx == lon_idx || idx == lat_idx {
                continue;
            }
            let value = if value.is_empty() {
                JsonValue::Null
            } else {
                JsonValue::String(value.to_string())
            };
            properties.insert(name.to_string(), value);
        }

        features.push(Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Point(vec![lon, lat]))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        });
    }

    if skipped_rows > 0 {
        warn!(source, skipped_rows, "Rows without coordinates were skipped");
    }

    Ok(PointLayer {
        collection: FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        },
        skipped_rows,
    })
}

fn parse_coordinate(raw: &str, limit: f64, source: &str, row: usize) -> Result<f64> {
    let invalid = || FleetError::InvalidCoordinate {
        file: source.to_string(),
        row,
        value: raw.to_string(),
    };
    let value: f64 = raw.parse().map_err(|_| invalid())?;
    if !value.is_finite() || value.abs() > limit {
        return Err(invalid());
    }
    Ok(value)
}

/// Write `layer` to `path`, replacing whatever a previous attempt left there.
pub fn write_staged(layer: &PointLayer, path: &Path) -> Result<()> {
    remove_if_exists(path)?;
    let bytes = serde_json::to_vec(&layer.collection)?;
    fs::write(path, bytes)?;
    debug!(path = %path.display(), features = layer.feature_count(), "Staged point features");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_outside_wgs84_bounds_fail() {
        let csv = "UNIT,LONGITUDE,LATITUDE\n12,-181.5,40.0\n";
        let err = read_points(csv.as_bytes(), "fleet.csv").unwrap_err();
        assert!(matches!(err, FleetError::InvalidCoordinate { row: 2, .. }));
    }

    #[test]
    fn missing_latitude_column_is_reported() {
        let csv = "UNIT,LONGITUDE\n12,-111.9\n";
        let err = read_points(csv.as_bytes(), "fleet.csv").unwrap_err();
        match err {
            FleetError::MissingColumn { column, .. } => assert_eq!(column, LATITUDE_FIELD),
            other => panic!("expected missing column, got {other:?}"),
        }
    }
}
