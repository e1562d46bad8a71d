//! Polling stations applicants choose from.
//!
//! The catalogue is imported from the electoral body's CSV export and keyed by
//! station code. Re-importing a code updates the station in place and keeps the
//! id already handed out for it.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollingStation {
    pub id: u64,
    pub code: String,
    pub name: String,
    pub department: String,
    pub province: String,
    pub municipality: String,
    pub seat: String,
    pub zone: String,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct StationRow {
    #[serde(rename = "Código")]
    code: String,
    #[serde(rename = "Nombre")]
    name: String,
    #[serde(rename = "Departamento", default)]
    department: String,
    #[serde(rename = "Provincia", default)]
    province: String,
    #[serde(rename = "Municipio", default)]
    municipality: String,
    #[serde(rename = "Asiento", default)]
    seat: String,
    #[serde(rename = "Zona", default)]
    zone: String,
    #[serde(rename = "Longitud", default)]
    longitude: String,
    #[serde(rename = "Latitud", default)]
    latitude: String,
}

/// Malformed coordinates are dropped rather than failing the row.
fn coordinate(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default)]
pub struct StationCatalog {
    stations: BTreeMap<u64, PollingStation>,
    ids_by_code: BTreeMap<String, u64>,
}

impl StationCatalog {
    pub fn from_path(path: impl AsRef<Path>) -> Result<(Self, ImportSummary), csv::Error> {
        let mut catalog = Self::default();
        let reader = csv::Reader::from_path(path)?;
        let summary = catalog.import(reader)?;
        Ok((catalog, summary))
    }

    /// Merge the rows of a CSV export; unreadable rows are skipped and logged.
    pub fn import_csv<R: Read>(&mut self, reader: R) -> Result<ImportSummary, csv::Error> {
        self.import(csv::Reader::from_reader(reader))
    }

    fn import<R: Read>(&mut self, mut reader: csv::Reader<R>) -> Result<ImportSummary, csv::Error> {
        reader.headers()?;
        let mut summary = ImportSummary::default();

        for (index, row) in reader.deserialize::<StationRow>().enumerate() {
            let line = index + 2;
            match row {
                Ok(row) if !row.code.trim().is_empty() => {
                    self.upsert(row);
                    summary.imported += 1;
                }
                Ok(_) => {
                    warn!(line, "polling station row without code skipped");
                    summary.skipped += 1;
                }
                Err(err) => {
                    warn!(line, error = %err, "polling station row skipped");
                    summary.skipped += 1;
                }
            }
        }

        Ok(summary)
    }

    fn upsert(&mut self, row: StationRow) {
        let code = row.code.trim().to_string();
        let next_id = self.stations.keys().next_back().map_or(1, |last| last + 1);
        let id = *self.ids_by_code.entry(code.clone()).or_insert(next_id);

        self.stations.insert(
            id,
            PollingStation {
                id,
                code,
                name: row.name.trim().to_string(),
                department: row.department.trim().to_string(),
                province: row.province.trim().to_string(),
                municipality: row.municipality.trim().to_string(),
                seat: row.seat.trim().to_string(),
                zone: row.zone.trim().to_string(),
                longitude: coordinate(&row.longitude),
                latitude: coordinate(&row.latitude),
            },
        );
    }

    pub fn get(&self, id: u64) -> Option<&PollingStation> {
        self.stations.get(&id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.stations.contains_key(&id)
    }

    pub fn by_code(&self, code: &str) -> Option<&PollingStation> {
        self.ids_by_code
            .get(code.trim())
            .and_then(|id| self.stations.get(id))
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn stations(&self) -> impl Iterator<Item = &PollingStation> + '_ {
        self.stations.values()
    }
}
