use chrono::{Local, NaiveDateTime, Timelike};
use tracing::{info, warn};

use crate::config::PhotoConfig;
use crate::error::{HerdError, Result};
use crate::metrics::{MetricsCollector, MetricsSnapshot};
use crate::models::{CalfRecord, CowSummary, ProductionRecord, StoredRow};
use crate::photo::{fit_photo, FittedPhoto};
use crate::repository::HerdRepository;
use crate::stats::HerdStatistics;
use crate::validation::{CalfForm, InputValidator, RecordForm};
use crate::workbook::Sheet;

/// Source of server-assigned timestamps
#[cfg_attr(test, mockall::automock)]
pub trait Clock {
    /// Current time, whole seconds
    fn now(&self) -> NaiveDateTime;
}

/// Local wall-clock time, truncated to whole seconds
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        let now = Local::now().naive_local();
        now.with_nanosecond(0).unwrap_or(now)
    }
}

/// An uploaded photo as received at the boundary
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    /// Original file name; its extension is checked
    pub file_name: String,
    /// Raw file contents
    pub bytes: Vec<u8>,
}

/// Validates submissions, fits photos and persists records
pub struct HerdService {
    repository: Box<dyn HerdRepository>,
    clock: Box<dyn Clock>,
    photo: PhotoConfig,
    metrics: MetricsCollector,
}

impl HerdService {
    /// Service stamping records with the local clock
    pub fn new(repository: Box<dyn HerdRepository>, photo: PhotoConfig) -> Self {
        Self::with_clock(repository, Box::new(SystemClock), photo)
    }

    /// Service with an explicit clock
    pub fn with_clock(repository: Box<dyn HerdRepository>, clock: Box<dyn Clock>, photo: PhotoConfig) -> Self {
        Self {
            repository,
            clock,
            photo,
            metrics: MetricsCollector::new(),
        }
    }

    /// Create the workbook and any missing sheet
    pub fn initialize(&self) -> Result<()> {
        self.observe("initialize", self.repository.ensure_initialized())
    }

    /// Validate a new production record, fit its photo and append it
    pub fn submit_record(&self, form: &RecordForm, photo: &PhotoUpload) -> Result<StoredRow<ProductionRecord>> {
        self.observe("submit_record", self.try_submit_record(form, photo))
    }

    /// Rewrite the record at `row`; without a new photo the stored one is kept
    pub fn edit_record(&self, row: usize, form: &RecordForm, photo: Option<&PhotoUpload>) -> Result<ProductionRecord> {
        self.observe("edit_record", self.try_edit_record(row, form, photo))
    }

    /// Validate and append a calf record, copying the mother's name when
    /// the submission leaves it out
    pub fn register_calf(&self, form: &CalfForm) -> Result<StoredRow<CalfRecord>> {
        self.observe("register_calf", self.try_register_calf(form))
    }

    /// Production records with their row numbers
    pub fn records(&self) -> Result<Vec<StoredRow<ProductionRecord>>> {
        self.observe("read_records", self.repository.read_records_with_rows())
    }

    /// The production record at `row`
    pub fn record(&self, row: usize) -> Result<ProductionRecord> {
        self.observe("read_record", self.repository.read_record_by_row(row))
    }

    /// All calf records
    pub fn calves(&self) -> Result<Vec<CalfRecord>> {
        self.observe("read_calves", self.repository.read_all_calves())
    }

    /// Known cows, latest name per ID
    pub fn cows(&self) -> Result<Vec<CowSummary>> {
        self.observe("list_cows", self.repository.list_unique_cows())
    }

    /// Statistics over every production record; `None` for an empty sheet
    pub fn statistics(&self) -> Result<Option<HerdStatistics>> {
        let result = self
            .repository
            .read_all_records()
            .map(|records| HerdStatistics::from_records(&records));
        self.observe("statistics", result)
    }

    /// Counters for this service instance
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn try_submit_record(&self, form: &RecordForm, photo: &PhotoUpload) -> Result<StoredRow<ProductionRecord>> {
        let input = InputValidator::validate_record_form(form)?;
        let fitted = self.fit_upload(photo)?;
        let record = input.into_record(self.clock.now(), fitted.encoded);

        let row = self.repository.append_record(&record)?;
        self.metrics.record_append(Sheet::Records.name());
        info!(row, cow_id = %record.cow_id, litres = record.litres, "Production record saved");
        Ok(StoredRow { row, record })
    }

    fn try_edit_record(&self, row: usize, form: &RecordForm, photo: Option<&PhotoUpload>) -> Result<ProductionRecord> {
        let input = InputValidator::validate_record_form(form)?;
        let encoded = match photo {
            Some(upload) => self.fit_upload(upload)?.encoded,
            None => String::new(),
        };
        let record = input.into_record(self.clock.now(), encoded);

        self.repository.update_record(row, &record)?;
        self.metrics.record_update(Sheet::Records.name());
        info!(row, cow_id = %record.cow_id, photo_replaced = photo.is_some(), "Production record updated");
        self.repository.read_record_by_row(row)
    }

    fn try_register_calf(&self, form: &CalfForm) -> Result<StoredRow<CalfRecord>> {
        let mut input = InputValidator::validate_calf_form(form)?;
        let mother_name = match input.mother_name.take() {
            Some(name) => name,
            None => self.mother_name(&input.mother_id)?,
        };
        let calf = input.into_record(self.clock.now(), mother_name);

        let row = self.repository.append_calf(&calf)?;
        self.metrics.record_append(Sheet::Calves.name());
        info!(row, mother_id = %calf.mother_id, calf_id = %calf.calf_id, "Calf record saved");
        Ok(StoredRow { row, record: calf })
    }

    fn fit_upload(&self, upload: &PhotoUpload) -> Result<FittedPhoto> {
        let size = u64::try_from(upload.bytes.len()).unwrap_or(u64::MAX);
        InputValidator::validate_photo_upload(&upload.file_name, size, &self.photo)?;

        let fitted = fit_photo(&upload.bytes, self.photo.max_encoded_len)?;
        self.metrics.record_photo_fit(&fitted);
        Ok(fitted)
    }

    fn mother_name(&self, mother_id: &str) -> Result<String> {
        self.repository
            .list_unique_cows()?
            .into_iter()
            .find(|cow| cow.id == mother_id)
            .map(|cow| cow.name)
            .ok_or_else(|| HerdError::Validation(format!("unknown mother cow: {mother_id:?}")))
    }

    fn observe<T>(&self, operation: &'static str, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.metrics.record_error(err.kind(), operation);
            warn!(operation, kind = err.kind(), error = %err, "Operation failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductiveStatus;
    use crate::repository::MockHerdRepository;
    use chrono::NaiveDate;
    use image::{ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;

    fn fixed_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 14)
            .unwrap()
            .and_hms_opt(6, 30, 0)
            .unwrap()
    }

    fn clock() -> Box<dyn Clock> {
        let mut clock = MockClock::new();
        clock.expect_now().return_const(fixed_time());
        Box::new(clock)
    }

    fn form() -> RecordForm {
        RecordForm {
            operator: "Ana".into(),
            cow_id: "A1".into(),
            cow_name: "Bella".into(),
            litres: "15.5".into(),
            age: "4".into(),
            status: "Productiva".into(),
            calved: "Sí".into(),
            dry: "No".into(),
            offspring: "2".into(),
            births: "2".into(),
            vaccinations: vec!["Aftosa".into()],
            ailments: vec![],
        }
    }

    fn png_upload() -> PhotoUpload {
        let image = ImageBuffer::from_pixel(64, 48, Rgb([200_u8, 180, 160]));
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();
        PhotoUpload {
            file_name: "vaca.png".into(),
            bytes: bytes.into_inner(),
        }
    }

    #[test]
    fn test_submit_record_stamps_and_appends() {
        let mut repository = MockHerdRepository::new();
        repository
            .expect_append_record()
            .withf(|record| {
                record.timestamp == fixed_time()
                    && record.status == ProductiveStatus::Productive
                    && record.ailments == vec!["None".to_string()]
                    && !record.photo.is_empty()
            })
            .times(1)
            .returning(|_| Ok(2));

        let service = HerdService::with_clock(Box::new(repository), clock(), PhotoConfig::default());
        let stored = service.submit_record(&form(), &png_upload()).unwrap();

        assert_eq!(stored.row, 2);
        assert!((stored.record.litres - 15.5).abs() < f64::EPSILON);
        let metrics = service.metrics();
        assert_eq!(metrics.rows_appended_total, 1);
        assert_eq!(metrics.photos_fitted_total, 1);
    }

    #[test]
    fn test_submit_record_rejects_bad_extension_before_storing() {
        let mut repository = MockHerdRepository::new();
        repository.expect_append_record().never();

        let service = HerdService::with_clock(Box::new(repository), clock(), PhotoConfig::default());
        let mut upload = png_upload();
        upload.file_name = "vaca.bmp".into();

        let err = service.submit_record(&form(), &upload).unwrap_err();
        assert!(matches!(err, HerdError::Validation(_)));
        assert_eq!(service.metrics().errors_total, 1);
    }

    #[test]
    fn test_edit_record_without_photo_sends_empty_photo() {
        let mut repository = MockHerdRepository::new();
        repository
            .expect_update_record()
            .withf(|row, record| *row == 3 && record.photo.is_empty() && record.timestamp == fixed_time())
            .times(1)
            .returning(|_, _| Ok(()));
        repository.expect_read_record_by_row().returning(|_| {
            Ok(InputValidator::validate_record_form(&form())
                .unwrap()
                .into_record(fixed_time(), "c3RvcmVk".into()))
        });

        let service = HerdService::with_clock(Box::new(repository), clock(), PhotoConfig::default());
        let record = service.edit_record(3, &form(), None).unwrap();
        assert_eq!(record.photo, "c3RvcmVk");
        assert_eq!(service.metrics().rows_updated_total, 1);
    }

    #[test]
    fn test_edit_record_propagates_row_not_found() {
        let mut repository = MockHerdRepository::new();
        repository
            .expect_update_record()
            .returning(|row, _| Err(HerdError::RowNotFound { sheet: "Records", row }));

        let service = HerdService::with_clock(Box::new(repository), clock(), PhotoConfig::default());
        let err = service.edit_record(999, &form(), None).unwrap_err();
        assert!(matches!(err, HerdError::RowNotFound { row: 999, .. }));
    }

    #[test]
    fn test_register_calf_resolves_mother_name() {
        let mut repository = MockHerdRepository::new();
        repository.expect_list_unique_cows().returning(|| {
            Ok(vec![CowSummary {
                id: "A1".into(),
                name: "Bella II".into(),
            }])
        });
        repository
            .expect_append_calf()
            .withf(|calf| calf.mother_name == "Bella II" && calf.registered_at == fixed_time())
            .returning(|_| Ok(2));

        let service = HerdService::with_clock(Box::new(repository), clock(), PhotoConfig::default());
        let form = CalfForm {
            mother_id: "A1".into(),
            calf_id: "C1".into(),
            calf_name: "Luna".into(),
            birth_date: "2024-05-01".into(),
            sex: "Hembra".into(),
            ..CalfForm::default()
        };
        let stored = service.register_calf(&form).unwrap();
        assert_eq!(stored.record.mother_name, "Bella II");
    }

    #[test]
    fn test_register_calf_unknown_mother() {
        let mut repository = MockHerdRepository::new();
        repository.expect_list_unique_cows().returning(|| Ok(vec![]));
        repository.expect_append_calf().never();

        let service = HerdService::with_clock(Box::new(repository), clock(), PhotoConfig::default());
        let form = CalfForm {
            mother_id: "Z9".into(),
            calf_id: "C1".into(),
            calf_name: "Luna".into(),
            birth_date: "2024-05-01".into(),
            sex: "Macho".into(),
            ..CalfForm::default()
        };
        assert!(matches!(service.register_calf(&form), Err(HerdError::Validation(_))));
    }

    #[test]
    fn test_statistics_empty_sheet() {
        let mut repository = MockHerdRepository::new();
        repository.expect_read_all_records().returning(|| Ok(vec![]));

        let service = HerdService::with_clock(Box::new(repository), clock(), PhotoConfig::default());
        assert_eq!(service.statistics().unwrap(), None);
    }
}
