//! Spreadsheet-style workbook storage.
//!
//! A workbook is a directory with one CSV file per sheet (`Records.csv`,
//! `Calves.csv`). Every operation loads the whole sheet, changes it, and
//! writes it back through a temporary file that is renamed into place, so a
//! reader never sees a half-written sheet.
//!
//! Row numbers count CSV records, not text lines. A quoted cell may span
//! several lines, and a line with no content at all is not a record: it gets
//! no row number and is gone after the next save. A row of empty cells
//! (`,,,`) is a blank row and keeps its number.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, WriterBuilder};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{HerdError, Result};
use crate::models::{
    join_tags, normalize_ailments, parse_yes_no, split_tags, yes_no, CalfRecord, CowSummary, ProductionRecord,
    StoredRow, DATE_FORMAT, TIMESTAMP_FORMAT,
};
use crate::repository::HerdRepository;

/// Header of the `Records` sheet
pub const RECORD_HEADERS: [&str; 14] = [
    "FechaHora",
    "Ordeñador",
    "ID Vaca",
    "Nombre Vaca",
    "Litros",
    "Imagen Base64",
    "Edad",
    "Estado",
    "Parida",
    "Seca",
    "Nº Crías",
    "Nº Parto",
    "Vacunas",
    "Enfermedades",
];

/// Header of the `Calves` sheet
pub const CALF_HEADERS: [&str; 8] = [
    "FechaRegistro",
    "MadreID",
    "MadreNombre",
    "CriaID",
    "CriaNombre",
    "FechaNacimiento",
    "Sexo",
    "Observaciones",
];

/// Columns present in `Records` rows written before vaccinations and
/// ailments were tracked
pub const LEGACY_RECORD_COLUMNS: usize = 12;

/// Row number of the first record (row 1 is the header)
pub const FIRST_DATA_ROW: usize = 2;

/// Byte-order mark some spreadsheet tools put before the first header cell
const BOM: char = '\u{feff}';

const PHOTO_COLUMN: usize = 5;

type SheetRows = Vec<Vec<String>>;

/// The sheets of a workbook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sheet {
    /// Production records
    Records,
    /// Calf records
    Calves,
}

impl Sheet {
    /// Every sheet a workbook holds
    pub const ALL: [Self; 2] = [Self::Records, Self::Calves];

    /// Sheet name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Records => "Records",
            Self::Calves => "Calves",
        }
    }

    /// Current header row
    #[must_use]
    pub const fn headers(self) -> &'static [&'static str] {
        match self {
            Self::Records => &RECORD_HEADERS,
            Self::Calves => &CALF_HEADERS,
        }
    }

    /// File holding the sheet inside the workbook directory
    #[must_use]
    pub fn file_name(self) -> String {
        format!("{}.csv", self.name())
    }

    /// Column whose emptiness marks a blank row
    const fn key_column(self) -> usize {
        match self {
            Self::Records => 0,
            Self::Calves => 1,
        }
    }

    /// Fewest columns a non-blank row may have
    const fn min_columns(self) -> usize {
        match self {
            Self::Records => LEGACY_RECORD_COLUMNS,
            Self::Calves => CALF_HEADERS.len(),
        }
    }
}

/// Workbook store rooted at a directory
#[derive(Debug, Clone)]
pub struct Workbook {
    root: PathBuf,
}

impl Workbook {
    /// Create a handle; nothing touches the disk until an operation runs.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Workbook directory
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Path of a sheet file
    #[must_use]
    pub fn sheet_path(&self, sheet: Sheet) -> PathBuf {
        self.root.join(sheet.file_name())
    }

    fn load_sheet(&self, sheet: Sheet) -> Result<SheetRows> {
        if !self.root.is_dir() {
            return Err(HerdError::StoreNotFound(self.root.clone()));
        }
        let path = self.sheet_path(sheet);
        if !path.is_file() {
            return Err(HerdError::SheetNotFound {
                sheet: sheet.name(),
                path: self.root.clone(),
            });
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)?;

        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record?.iter().map(str::to_owned).collect::<Vec<_>>());
        }
        check_header(sheet, rows.first())?;

        debug!(sheet = sheet.name(), rows = rows.len(), "Loaded sheet");
        Ok(rows)
    }

    /// Write the whole sheet to a temporary file and rename it into place.
    fn save_sheet(&self, sheet: Sheet, rows: &[Vec<String>]) -> Result<()> {
        let mut staged = NamedTempFile::new_in(&self.root)?;
        {
            // Legacy rows are shorter than the header
            let mut writer = WriterBuilder::new().flexible(true).from_writer(&mut staged);
            for row in rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
        }
        staged.as_file().sync_all()?;
        staged
            .persist(self.sheet_path(sheet))
            .map_err(|err| HerdError::Io(err.error))?;

        debug!(sheet = sheet.name(), rows = rows.len(), "Saved sheet");
        Ok(())
    }

    fn append_row(&self, sheet: Sheet, row: Vec<String>) -> Result<usize> {
        let mut rows = self.load_sheet(sheet)?;
        rows.push(row);
        self.save_sheet(sheet, &rows)?;

        let row_number = rows.len();
        info!(sheet = sheet.name(), row = row_number, "Appended row");
        Ok(row_number)
    }
}

impl HerdRepository for Workbook {
    fn ensure_initialized(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;

        for sheet in Sheet::ALL {
            if self.sheet_path(sheet).is_file() {
                debug!(sheet = sheet.name(), "Sheet already present");
                continue;
            }
            let header = sheet.headers().iter().map(|h| (*h).to_owned()).collect();
            self.save_sheet(sheet, &[header])?;
            info!(sheet = sheet.name(), path = %self.root.display(), "Created sheet");
        }

        Ok(())
    }

    fn append_record(&self, record: &ProductionRecord) -> Result<usize> {
        self.append_row(Sheet::Records, record_cells(record))
    }

    fn append_calf(&self, calf: &CalfRecord) -> Result<usize> {
        self.append_row(Sheet::Calves, calf_cells(calf))
    }

    fn read_all_records(&self) -> Result<Vec<ProductionRecord>> {
        Ok(self
            .read_records_with_rows()?
            .into_iter()
            .map(|stored| stored.record)
            .collect())
    }

    fn read_records_with_rows(&self) -> Result<Vec<StoredRow<ProductionRecord>>> {
        let rows = self.load_sheet(Sheet::Records)?;
        data_rows(Sheet::Records, &rows)
            .map(|(row, cells)| parse_record(row, cells).map(|record| StoredRow { row, record }))
            .collect()
    }

    fn read_all_calves(&self) -> Result<Vec<CalfRecord>> {
        let rows = self.load_sheet(Sheet::Calves)?;
        data_rows(Sheet::Calves, &rows)
            .map(|(row, cells)| parse_calf(row, cells))
            .collect()
    }

    fn read_record_by_row(&self, row: usize) -> Result<ProductionRecord> {
        let rows = self.load_sheet(Sheet::Records)?;
        let cells = data_row(Sheet::Records, &rows, row)?;
        parse_record(row, cells)
    }

    fn update_record(&self, row: usize, record: &ProductionRecord) -> Result<()> {
        let mut rows = self.load_sheet(Sheet::Records)?;
        let existing = data_row(Sheet::Records, &rows, row)?;

        let mut cells = record_cells(record);
        if record.photo.is_empty() {
            cells[PHOTO_COLUMN] = cell(existing, PHOTO_COLUMN).to_owned();
        }
        rows[row - 1] = cells;

        self.save_sheet(Sheet::Records, &rows)?;
        info!(sheet = Sheet::Records.name(), row, photo_replaced = !record.photo.is_empty(), "Updated row");
        Ok(())
    }

    fn list_unique_cows(&self) -> Result<Vec<CowSummary>> {
        let mut cows = BTreeMap::new();
        for record in self.read_all_records()? {
            // Later rows overwrite earlier names
            cows.insert(record.cow_id, record.cow_name);
        }

        Ok(cows
            .into_iter()
            .map(|(id, name)| CowSummary { id, name })
            .collect())
    }
}

fn check_header(sheet: Sheet, header: Option<&Vec<String>>) -> Result<()> {
    let Some(header) = header else {
        return Err(malformed(sheet, 1, "missing header row"));
    };

    let mismatch = header
        .iter()
        .zip(sheet.headers())
        .any(|(found, expected)| found.trim_start_matches(BOM).trim() != *expected);
    if header.len() < sheet.min_columns() || mismatch {
        return Err(malformed(sheet, 1, format!("unexpected header {header:?}")));
    }
    Ok(())
}

/// Non-blank data rows with their 1-based row numbers
fn data_rows(sheet: Sheet, rows: &[Vec<String>]) -> impl Iterator<Item = (usize, &[String])> {
    rows.iter()
        .enumerate()
        .skip(1)
        .map(|(index, cells)| (index + 1, cells.as_slice()))
        .filter(move |(_, cells)| !is_blank(sheet, cells))
}

fn data_row(sheet: Sheet, rows: &[Vec<String>], row: usize) -> Result<&[String]> {
    let not_found = || HerdError::RowNotFound { sheet: sheet.name(), row };
    if row < FIRST_DATA_ROW {
        return Err(not_found());
    }
    rows.get(row - 1)
        .map(Vec::as_slice)
        .filter(|cells| !is_blank(sheet, cells))
        .ok_or_else(not_found)
}

fn is_blank(sheet: Sheet, cells: &[String]) -> bool {
    cell(cells, sheet.key_column()).trim().is_empty()
}

/// Cell value; columns past the end of a short row read as empty.
fn cell(cells: &[String], column: usize) -> &str {
    cells.get(column).map_or("", String::as_str)
}

fn malformed(sheet: Sheet, row: usize, reason: impl Into<String>) -> HerdError {
    HerdError::MalformedRow {
        sheet: sheet.name(),
        row,
        reason: reason.into(),
    }
}

/// Parse one cell, reporting the column header on failure.
fn parse_cell<T>(sheet: Sheet, row: usize, cells: &[String], column: usize, parse: impl FnOnce(&str) -> Option<T>) -> Result<T> {
    let value = cell(cells, column);
    parse(value.trim()).ok_or_else(|| {
        let header = sheet.headers().get(column).copied().unwrap_or("?");
        malformed(sheet, row, format!("invalid value {value:?} in column {header}"))
    })
}

fn check_width(sheet: Sheet, row: usize, cells: &[String]) -> Result<()> {
    if cells.len() < sheet.min_columns() {
        return Err(malformed(
            sheet,
            row,
            format!("expected at least {} columns, found {}", sheet.min_columns(), cells.len()),
        ));
    }
    Ok(())
}

fn record_cells(record: &ProductionRecord) -> Vec<String> {
    vec![
        record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        record.operator.clone(),
        record.cow_id.clone(),
        record.cow_name.clone(),
        record.litres.to_string(),
        record.photo.clone(),
        record.age.to_string(),
        record.status.label().to_owned(),
        yes_no(record.calved).to_owned(),
        yes_no(record.dry).to_owned(),
        record.offspring.to_string(),
        record.births.to_string(),
        join_tags(&record.vaccinations),
        join_tags(&normalize_ailments(&record.ailments)),
    ]
}

fn parse_record(row: usize, cells: &[String]) -> Result<ProductionRecord> {
    let sheet = Sheet::Records;
    check_width(sheet, row, cells)?;

    Ok(ProductionRecord {
        timestamp: parse_cell(sheet, row, cells, 0, |v| NaiveDateTime::parse_from_str(v, TIMESTAMP_FORMAT).ok())?,
        operator: cell(cells, 1).to_owned(),
        cow_id: cell(cells, 2).to_owned(),
        cow_name: cell(cells, 3).to_owned(),
        litres: parse_cell(sheet, row, cells, 4, |v| v.parse::<f64>().ok().filter(|l| l.is_finite()))?,
        photo: cell(cells, PHOTO_COLUMN).to_owned(),
        age: parse_cell(sheet, row, cells, 6, |v| v.parse().ok())?,
        status: parse_cell(sheet, row, cells, 7, |v| v.parse().ok())?,
        calved: parse_cell(sheet, row, cells, 8, parse_yes_no)?,
        dry: parse_cell(sheet, row, cells, 9, parse_yes_no)?,
        offspring: parse_cell(sheet, row, cells, 10, |v| v.parse().ok())?,
        births: parse_cell(sheet, row, cells, 11, |v| v.parse().ok())?,
        vaccinations: split_tags(cell(cells, 12)),
        ailments: split_tags(cell(cells, 13)),
    })
}

fn calf_cells(calf: &CalfRecord) -> Vec<String> {
    vec![
        calf.registered_at.format(TIMESTAMP_FORMAT).to_string(),
        calf.mother_id.clone(),
        calf.mother_name.clone(),
        calf.calf_id.clone(),
        calf.calf_name.clone(),
        calf.birth_date.format(DATE_FORMAT).to_string(),
        calf.sex.label().to_owned(),
        calf.notes.clone(),
    ]
}

fn parse_calf(row: usize, cells: &[String]) -> Result<CalfRecord> {
    let sheet = Sheet::Calves;
    check_width(sheet, row, cells)?;

    Ok(CalfRecord {
        registered_at: parse_cell(sheet, row, cells, 0, |v| NaiveDateTime::parse_from_str(v, TIMESTAMP_FORMAT).ok())?,
        mother_id: cell(cells, 1).to_owned(),
        mother_name: cell(cells, 2).to_owned(),
        calf_id: cell(cells, 3).to_owned(),
        calf_name: cell(cells, 4).to_owned(),
        birth_date: parse_cell(sheet, row, cells, 5, |v| NaiveDate::parse_from_str(v, DATE_FORMAT).ok())?,
        sex: parse_cell(sheet, row, cells, 6, |v| v.parse().ok())?,
        notes: cell(cells, 7).to_owned(),
    })
}
