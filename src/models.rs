//! Data models for production and calf records
//!
//! These are the plain data structures the service hands to the boundary
//! layer and the workbook persists, one row per record.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::HerdError;

/// Format of the timestamp columns (`FechaHora`, `FechaRegistro`)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format of calf birth dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Ailments sentinel meaning "no ailments reported"
pub const NO_AILMENTS: &str = "None";

/// One milking/registration event for a cow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionRecord {
    /// Server-assigned creation time, refreshed on update
    pub timestamp: NaiveDateTime,
    /// Name of the person who milked
    pub operator: String,
    /// Cow identifier (free text, not unique)
    pub cow_id: String,
    /// Cow name
    pub cow_name: String,
    /// Litres produced
    pub litres: f64,
    /// Base64 JPEG text; empty when there is no photo
    pub photo: String,
    /// Age in years
    pub age: u32,
    /// Productive status
    pub status: ProductiveStatus,
    /// Whether the cow has calved
    pub calved: bool,
    /// Whether the cow is dry
    pub dry: bool,
    /// Number of offspring
    pub offspring: u32,
    /// Number of births
    pub births: u32,
    /// Vaccination tags
    pub vaccinations: Vec<String>,
    /// Ailment tags
    pub ailments: Vec<String>,
}

impl ProductionRecord {
    /// True when an ailment other than the sentinel was reported.
    #[must_use]
    pub fn has_ailments(&self) -> bool {
        self.ailments.iter().any(|tag| tag != NO_AILMENTS)
    }
}

/// One birth entry, linked to its mother by a copied ID and name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalfRecord {
    /// When the birth was registered
    pub registered_at: NaiveDateTime,
    /// Mother cow ID
    pub mother_id: String,
    /// Mother cow name at registration time
    pub mother_name: String,
    /// Calf identifier
    pub calf_id: String,
    /// Calf name
    pub calf_name: String,
    /// Birth date
    pub birth_date: NaiveDate,
    /// Calf sex
    pub sex: CalfSex,
    /// Free-text notes
    pub notes: String,
}

/// A cow as seen across all production records
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CowSummary {
    /// Cow identifier
    pub id: String,
    /// Most recently recorded name
    pub name: String,
}

/// A record together with its 1-based physical row in the sheet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRow<T> {
    /// Physical row number (the header is row 1)
    pub row: usize,
    /// The record stored at that row
    #[serde(flatten)]
    pub record: T,
}

/// Productive status of a cow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductiveStatus {
    /// Currently producing
    Productive,
    /// Not producing
    NotProductive,
    /// Resting between lactations
    Resting,
}

impl ProductiveStatus {
    /// Label written to the `Estado` column
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Productive => "Productiva",
            Self::NotProductive => "No Productiva",
            Self::Resting => "En Reposo",
        }
    }
}

impl fmt::Display for ProductiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ProductiveStatus {
    type Err = HerdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "productiva" | "productive" => Ok(Self::Productive),
            "no productiva" | "not productive" | "not_productive" => Ok(Self::NotProductive),
            "en reposo" | "resting" => Ok(Self::Resting),
            _ => Err(HerdError::validation(format!("unknown productive status: {value:?}"))),
        }
    }
}

/// Sex of a calf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalfSex {
    /// Heifer calf
    Female,
    /// Bull calf
    Male,
}

impl CalfSex {
    /// Label written to the `Sexo` column
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Female => "Hembra",
            Self::Male => "Macho",
        }
    }
}

impl fmt::Display for CalfSex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CalfSex {
    type Err = HerdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "hembra" | "female" | "h" | "f" => Ok(Self::Female),
            "macho" | "male" | "m" => Ok(Self::Male),
            _ => Err(HerdError::validation(format!("unknown calf sex: {value:?}"))),
        }
    }
}

/// Label for a yes/no column
#[must_use]
pub const fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Sí"
    } else {
        "No"
    }
}

/// Parse a yes/no label, accepting the stored form and common spellings
#[must_use]
pub fn parse_yes_no(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "sí" | "si" | "yes" | "y" | "true" => Some(true),
        "no" | "n" | "false" => Some(false),
        _ => None,
    }
}

/// Join tags into a single cell value
#[must_use]
pub fn join_tags(tags: &[String]) -> String {
    tags.join(", ")
}

/// Split a cell value back into tags, dropping empty entries
#[must_use]
pub fn split_tags(cell: &str) -> Vec<String> {
    cell.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Apply the ailments rule: empty selection becomes the sentinel, and the
/// sentinel excludes every other tag.
#[must_use]
pub fn normalize_ailments(tags: &[String]) -> Vec<String> {
    let tags: Vec<String> = tags
        .iter()
        .map(|tag| tag.trim())
        .filter(|tag| !tag.is_empty())
        .map(str::to_owned)
        .collect();

    if tags.is_empty() || tags.iter().any(|tag| tag == NO_AILMENTS) {
        vec![NO_AILMENTS.to_owned()]
    } else {
        tags
    }
}
