use crate::error::Result;
use crate::models::{CalfRecord, CowSummary, ProductionRecord, StoredRow};

/// Persistent storage for production and calf records.
///
/// Rows are addressed by their 1-based physical position; the header is row
/// 1, so the first record lives at row 2. Only appends and in-place updates
/// are supported, which keeps those positions stable.
#[cfg_attr(test, mockall::automock)]
pub trait HerdRepository {
    /// Create the store and any missing sheet. Safe to call repeatedly.
    fn ensure_initialized(&self) -> Result<()>;

    /// Append a production record; returns its row number.
    fn append_record(&self, record: &ProductionRecord) -> Result<usize>;

    /// Append a calf record; returns its row number.
    fn append_calf(&self, calf: &CalfRecord) -> Result<usize>;

    /// All production records in append order, blank rows skipped.
    fn read_all_records(&self) -> Result<Vec<ProductionRecord>>;

    /// Same as [`HerdRepository::read_all_records`], paired with row numbers.
    fn read_records_with_rows(&self) -> Result<Vec<StoredRow<ProductionRecord>>>;

    /// All calf records in append order, blank rows skipped.
    fn read_all_calves(&self) -> Result<Vec<CalfRecord>>;

    /// The production record at `row`.
    fn read_record_by_row(&self, row: usize) -> Result<ProductionRecord>;

    /// Rewrite `row` with `record`. An empty photo keeps the stored one.
    fn update_record(&self, row: usize, record: &ProductionRecord) -> Result<()>;

    /// Distinct cows, latest name per ID, sorted by ID.
    fn list_unique_cows(&self) -> Result<Vec<CowSummary>>;
}
