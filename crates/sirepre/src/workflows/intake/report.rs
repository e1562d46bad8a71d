use std::collections::BTreeMap;
use std::io::Write;

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{RegistrantRecord, RegistrantSummary};
use crate::workflows::registration::domain::{Declaration, Position};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// Admin listing parameters; pages are 1-based.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ListingQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub search: Option<String>,
}

impl ListingQuery {
    fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    fn limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    fn matches(&self, record: &RegistrantRecord) -> bool {
        let Some(needle) = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|needle| !needle.is_empty())
        else {
            return true;
        };
        let needle = needle.to_lowercase();
        record.full_name().to_lowercase().contains(&needle)
            || record.verification.national_id.contains(&needle)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingPage {
    pub items: Vec<RegistrantSummary>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
}

/// Newest registrations first, filtered by name or national id.
pub fn paginate(mut records: Vec<RegistrantRecord>, query: &ListingQuery) -> ListingPage {
    records.retain(|record| query.matches(record));
    records.sort_by(|a, b| {
        b.registered_at
            .cmp(&a.registered_at)
            .then_with(|| b.id.cmp(&a.id))
    });

    let page = query.page();
    let limit = query.limit();
    let total = records.len();
    let items = records
        .iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .map(RegistrantRecord::summary)
        .collect();

    ListingPage {
        items,
        page,
        limit,
        total,
        total_pages: total.div_ceil(limit),
    }
}

const EXPORT_HEADERS: [&str; 10] = [
    "ID",
    "Nombre completo",
    "CI",
    "Fecha de nacimiento",
    "Grado de instruccion",
    "Celular",
    "Correo",
    "Cargo",
    "Fecha de registro",
    "Cumple requisitos",
];

/// Write every record as one CSV row, oldest first.
pub fn write_csv<W: Write>(records: &[RegistrantRecord], writer: W) -> Result<(), csv::Error> {
    let mut ordered = records.iter().collect::<Vec<_>>();
    ordered.sort_by_key(|record| record.id);

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(EXPORT_HEADERS)?;
    for record in ordered {
        let form = &record.form;
        csv_writer.write_record([
            record.id.0.to_string(),
            record.full_name(),
            record.verification.display_id(),
            form.birth_date
                .map(|date| date.format("%d/%m/%Y").to_string())
                .unwrap_or_default(),
            form.education
                .map(|education| education.label().to_string())
                .unwrap_or_default(),
            form.mobile.clone(),
            form.email.clone(),
            form.position
                .map(|position| position.label().to_string())
                .unwrap_or_default(),
            record.registered_at.format("%d/%m/%Y %H:%M").to_string(),
            if record.meets_requirements() {
                "SI".to_string()
            } else {
                "NO".to_string()
            },
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourlyCount {
    pub hour: DateTime<Utc>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationStatistics {
    pub total: usize,
    pub by_position: BTreeMap<&'static str, usize>,
    pub declarations: BTreeMap<Declaration, usize>,
    pub meeting_requirements: usize,
    pub declined_designation: usize,
    /// 24 hourly buckets ending with the hour containing `now`.
    pub last_24_hours: Vec<HourlyCount>,
}

pub fn statistics(records: &[RegistrantRecord], now: DateTime<Utc>) -> RegistrationStatistics {
    let mut by_position = Position::ALL
        .into_iter()
        .map(|position| (position.label(), 0))
        .collect::<BTreeMap<_, _>>();
    let mut declarations = Declaration::ALL
        .into_iter()
        .map(|declaration| (declaration, 0))
        .collect::<BTreeMap<_, _>>();

    let current_hour = now.duration_trunc(Duration::hours(1)).unwrap_or(now);
    let first_hour = current_hour - Duration::hours(23);
    let mut last_24_hours = (0..24)
        .map(|offset| HourlyCount {
            hour: first_hour + Duration::hours(offset),
            count: 0,
        })
        .collect::<Vec<_>>();

    let mut meeting_requirements = 0;
    let mut declined_designation = 0;

    for record in records {
        if let Some(position) = record.form.position {
            *by_position.entry(position.label()).or_default() += 1;
        }
        for declaration in Declaration::ALL {
            if record.form.declarations.get(declaration) {
                *declarations.entry(declaration).or_default() += 1;
            }
        }
        if record.meets_requirements() {
            meeting_requirements += 1;
        }
        if record.declined_designation() {
            declined_designation += 1;
        }

        if record.registered_at >= first_hour && record.registered_at <= now {
            let bucket = (record.registered_at - first_hour).num_hours();
            if let Some(slot) = usize::try_from(bucket)
                .ok()
                .and_then(|index| last_24_hours.get_mut(index))
            {
                slot.count += 1;
            }
        }
    }

    RegistrationStatistics {
        total: records.len(),
        by_position,
        declarations,
        meeting_requirements,
        declined_designation,
        last_24_hours,
    }
}
