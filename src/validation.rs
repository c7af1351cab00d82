use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::path::Path;

use crate::config::PhotoConfig;
use crate::error::{HerdError, Result};
use crate::models::{
    normalize_ailments, parse_yes_no, CalfRecord, CalfSex, ProductionRecord, ProductiveStatus, DATE_FORMAT,
};

/// Longest single-line value (names, IDs, tags)
pub const MAX_FIELD_LEN: usize = 100;

/// Longest calf notes value
pub const MAX_NOTES_LEN: usize = 2000;

/// Production record fields as submitted, before validation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordForm {
    /// Person who milked
    pub operator: String,
    /// Cow identifier
    pub cow_id: String,
    /// Cow name
    pub cow_name: String,
    /// Litres; a decimal comma is accepted
    pub litres: String,
    /// Age in years
    pub age: String,
    /// Productive status label
    pub status: String,
    /// Yes/no: has calved
    pub calved: String,
    /// Yes/no: is dry
    pub dry: String,
    /// Number of offspring
    pub offspring: String,
    /// Number of births
    pub births: String,
    /// Vaccination tags
    #[serde(default)]
    pub vaccinations: Vec<String>,
    /// Ailment tags; empty means none
    #[serde(default)]
    pub ailments: Vec<String>,
}

/// Validated production record fields; the service adds timestamp and photo
#[derive(Debug, Clone, PartialEq)]
pub struct RecordInput {
    /// Person who milked
    pub operator: String,
    /// Cow identifier
    pub cow_id: String,
    /// Cow name
    pub cow_name: String,
    /// Litres produced
    pub litres: f64,
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
    /// Cleaned vaccination tags
    pub vaccinations: Vec<String>,
    /// Normalized ailment tags
    pub ailments: Vec<String>,
}

impl RecordInput {
    /// Complete the record with its timestamp and encoded photo
    #[must_use]
    pub fn into_record(self, timestamp: NaiveDateTime, photo: String) -> ProductionRecord {
        ProductionRecord {
            timestamp,
            operator: self.operator,
            cow_id: self.cow_id,
            cow_name: self.cow_name,
            litres: self.litres,
            photo,
            age: self.age,
            status: self.status,
            calved: self.calved,
            dry: self.dry,
            offspring: self.offspring,
            births: self.births,
            vaccinations: self.vaccinations,
            ailments: self.ailments,
        }
    }
}

/// Calf record fields as submitted, before validation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CalfForm {
    /// Mother cow ID
    pub mother_id: String,
    /// Mother name; looked up when empty
    #[serde(default)]
    pub mother_name: String,
    /// Calf identifier
    pub calf_id: String,
    /// Calf name
    pub calf_name: String,
    /// Birth date, `YYYY-MM-DD`
    pub birth_date: String,
    /// Sex label
    pub sex: String,
    /// Free-text notes
    #[serde(default)]
    pub notes: String,
}

/// Validated calf fields; the mother name is optional until resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalfInput {
    /// Mother cow ID
    pub mother_id: String,
    /// Mother name, if submitted
    pub mother_name: Option<String>,
    /// Calf identifier
    pub calf_id: String,
    /// Calf name
    pub calf_name: String,
    /// Birth date
    pub birth_date: NaiveDate,
    /// Calf sex
    pub sex: CalfSex,
    /// Sanitized notes
    pub notes: String,
}

impl CalfInput {
    /// Complete the calf record with its registration time and mother name
    #[must_use]
    pub fn into_record(self, registered_at: NaiveDateTime, mother_name: String) -> CalfRecord {
        CalfRecord {
            registered_at,
            mother_id: self.mother_id,
            mother_name,
            calf_id: self.calf_id,
            calf_name: self.calf_name,
            birth_date: self.birth_date,
            sex: self.sex,
            notes: self.notes,
        }
    }
}

/// Validation utilities for submitted forms and uploads
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Validate a production record submission
    pub fn validate_record_form(form: &RecordForm) -> Result<RecordInput> {
        Ok(RecordInput {
            operator: Self::validate_text_field("operator", &form.operator)?,
            cow_id: Self::validate_text_field("cow ID", &form.cow_id)?,
            cow_name: Self::validate_text_field("cow name", &form.cow_name)?,
            litres: Self::parse_litres(&form.litres)?,
            age: Self::parse_count("age", &form.age)?,
            status: Self::require("status", &form.status)?.parse()?,
            calved: Self::parse_flag("calved", &form.calved)?,
            dry: Self::parse_flag("dry", &form.dry)?,
            offspring: Self::parse_count("offspring", &form.offspring)?,
            births: Self::parse_count("births", &form.births)?,
            vaccinations: Self::validate_tags("vaccinations", &form.vaccinations)?,
            ailments: normalize_ailments(&Self::validate_tags("ailments", &form.ailments)?),
        })
    }

    /// Validate a calf submission
    pub fn validate_calf_form(form: &CalfForm) -> Result<CalfInput> {
        let mother_name = Self::sanitize_text(&form.mother_name);
        let mother_name = if mother_name.is_empty() {
            None
        } else {
            Some(Self::validate_text_field("mother name", &mother_name)?)
        };

        let birth_date = Self::require("birth date", &form.birth_date)?;
        let birth_date = NaiveDate::parse_from_str(birth_date, DATE_FORMAT)
            .map_err(|_| HerdError::validation(format!("birth date must be YYYY-MM-DD, got {birth_date:?}")))?;

        let notes = Self::sanitize_text(&form.notes);
        if notes.chars().count() > MAX_NOTES_LEN {
            return Err(HerdError::validation(format!("notes too long (max {MAX_NOTES_LEN} characters)")));
        }

        Ok(CalfInput {
            mother_id: Self::validate_text_field("mother ID", &form.mother_id)?,
            mother_name,
            calf_id: Self::validate_text_field("calf ID", &form.calf_id)?,
            calf_name: Self::validate_text_field("calf name", &form.calf_name)?,
            birth_date,
            sex: Self::require("sex", &form.sex)?.parse()?,
            notes,
        })
    }

    /// Validate an uploaded photo's name and size before decoding it
    pub fn validate_photo_upload(file_name: &str, size_bytes: u64, config: &PhotoConfig) -> Result<()> {
        if file_name.trim().is_empty() {
            return Err(HerdError::validation("no photo selected"));
        }

        let extension = Path::new(file_name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if !config
            .allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&extension))
        {
            return Err(HerdError::validation(format!(
                "photo format not allowed: {file_name:?} (allowed: {})",
                config.allowed_extensions.join(", ")
            )));
        }

        if size_bytes == 0 {
            return Err(HerdError::validation("photo is empty"));
        }
        if size_bytes > config.max_upload_bytes {
            return Err(HerdError::validation(format!(
                "photo too large ({size_bytes} bytes, max {})",
                config.max_upload_bytes
            )));
        }

        Ok(())
    }

    /// Required single-line text, sanitized and length-checked
    pub fn validate_text_field(label: &str, value: &str) -> Result<String> {
        let value = Self::sanitize_text(value);
        if value.is_empty() {
            return Err(HerdError::validation(format!("{label} is required")));
        }
        if value.chars().count() > MAX_FIELD_LEN {
            return Err(HerdError::validation(format!("{label} too long (max {MAX_FIELD_LEN} characters)")));
        }
        if value.contains(['\n', '\r']) {
            return Err(HerdError::validation(format!("{label} must be a single line")));
        }
        Ok(value)
    }

    /// Litres: a finite, non-negative real; a decimal comma is accepted
    pub fn parse_litres(value: &str) -> Result<f64> {
        let value = Self::require("litres", value)?;
        let litres: f64 = value
            .replace(',', ".")
            .parse()
            .map_err(|_| HerdError::validation(format!("litres must be a number, got {value:?}")))?;
        if !litres.is_finite() || litres < 0.0 {
            return Err(HerdError::validation(format!("litres must be zero or more, got {value:?}")));
        }
        Ok(litres)
    }

    /// Non-negative whole number
    pub fn parse_count(label: &str, value: &str) -> Result<u32> {
        let value = Self::require(label, value)?;
        value
            .parse()
            .map_err(|_| HerdError::validation(format!("{label} must be a whole number, got {value:?}")))
    }

    /// Yes/no indicator
    pub fn parse_flag(label: &str, value: &str) -> Result<bool> {
        let value = Self::require(label, value)?;
        parse_yes_no(value).ok_or_else(|| HerdError::validation(format!("{label} must be yes or no, got {value:?}")))
    }

    /// Trim tags, drop empties and duplicates, reject separators
    pub fn validate_tags(label: &str, tags: &[String]) -> Result<Vec<String>> {
        let mut cleaned: Vec<String> = Vec::with_capacity(tags.len());
        for tag in tags {
            let tag = Self::sanitize_text(tag);
            if tag.is_empty() || cleaned.contains(&tag) {
                continue;
            }
            if tag.contains(',') {
                return Err(HerdError::validation(format!("{label} entries cannot contain commas: {tag:?}")));
            }
            if tag.chars().count() > MAX_FIELD_LEN {
                return Err(HerdError::validation(format!("{label} entry too long: {tag:?}")));
            }
            cleaned.push(tag);
        }
        Ok(cleaned)
    }

    /// Sanitize text input
    #[must_use]
    pub fn sanitize_text(text: &str) -> String {
        text.chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t' || *c == '\r')
            .collect::<String>()
            .trim()
            .to_string()
    }

    fn require<'a>(label: &str, value: &'a str) -> Result<&'a str> {
        let value = value.trim();
        if value.is_empty() {
            return Err(HerdError::validation(format!("{label} is required")));
        }
        Ok(value)
    }
}
