use metrics::{counter, histogram};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::photo::FittedPhoto;

/// Rows appended, labelled by sheet
pub const ROWS_APPENDED_TOTAL: &str = "herd_ledger_rows_appended_total";
/// Rows rewritten in place, labelled by sheet
pub const ROWS_UPDATED_TOTAL: &str = "herd_ledger_rows_updated_total";
/// Photos fitted
pub const PHOTOS_FITTED_TOTAL: &str = "herd_ledger_photos_fitted_total";
/// Photos stored with the last-resort encoding
pub const PHOTOS_OVER_BUDGET_TOTAL: &str = "herd_ledger_photos_over_budget_total";
/// Base64 length of stored photos
pub const PHOTO_ENCODED_LENGTH: &str = "herd_ledger_photo_encoded_length";
/// Grid encodings tried per photo
pub const PHOTO_FIT_ATTEMPTS: &str = "herd_ledger_photo_fit_attempts";
/// Failed operations, labelled by error kind and operation
pub const ERRORS_TOTAL: &str = "herd_ledger_errors_total";

/// Metrics collection and management
///
/// Everything is forwarded to the `metrics` facade; the local counters back
/// [`MetricsCollector::snapshot`].
#[derive(Debug, Default)]
pub struct MetricsCollector {
    rows_appended: AtomicU64,
    rows_updated: AtomicU64,
    photos_fitted: AtomicU64,
    photos_over_budget: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time copy of the local counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Rows appended
    pub rows_appended_total: u64,
    /// Rows updated
    pub rows_updated_total: u64,
    /// Photos fitted
    pub photos_fitted_total: u64,
    /// Photos over budget
    pub photos_over_budget_total: u64,
    /// Failed operations
    pub errors_total: u64,
}

impl MetricsCollector {
    /// Collector with all counters at zero
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a row appended to `sheet`
    pub fn record_append(&self, sheet: &'static str) {
        self.rows_appended.fetch_add(1, Ordering::Relaxed);
        counter!(ROWS_APPENDED_TOTAL, "sheet" => sheet).increment(1);
    }

    /// Record a row rewritten in place
    pub fn record_update(&self, sheet: &'static str) {
        self.rows_updated.fetch_add(1, Ordering::Relaxed);
        counter!(ROWS_UPDATED_TOTAL, "sheet" => sheet).increment(1);
    }

    /// Record the outcome of a photo fit
    pub fn record_photo_fit(&self, fitted: &FittedPhoto) {
        self.photos_fitted.fetch_add(1, Ordering::Relaxed);
        counter!(PHOTOS_FITTED_TOTAL).increment(1);
        histogram!(PHOTO_ENCODED_LENGTH).record(fitted.encoded_len() as f64);
        histogram!(PHOTO_FIT_ATTEMPTS).record(fitted.attempts as f64);

        if !fitted.within_budget {
            self.photos_over_budget.fetch_add(1, Ordering::Relaxed);
            counter!(PHOTOS_OVER_BUDGET_TOTAL).increment(1);
        }
    }

    /// Record error metrics
    pub fn record_error(&self, kind: &'static str, operation: &'static str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        counter!(ERRORS_TOTAL, "kind" => kind, "operation" => operation).increment(1);
    }

    /// Copy the current counter values
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rows_appended_total: self.rows_appended.load(Ordering::Relaxed),
            rows_updated_total: self.rows_updated.load(Ordering::Relaxed),
            photos_fitted_total: self.photos_fitted.load(Ordering::Relaxed),
            photos_over_budget_total: self.photos_over_budget.load(Ordering::Relaxed),
            errors_total: self.errors.load(Ordering::Relaxed),
        }
    }
}
