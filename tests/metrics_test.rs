//! Unit tests for metrics.rs module

use herd_ledger::metrics::{MetricsCollector, MetricsSnapshot};
use herd_ledger::photo::fit_photo;
use image::{ImageBuffer, ImageFormat, Rgb};
use std::io::Cursor;

fn png(width: u32, height: u32) -> Vec<u8> {
    let image = ImageBuffer::from_pixel(width, height, Rgb([120_u8, 90, 30]));
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

#[test]
fn test_metrics_collector_default() {
    let collector = MetricsCollector::default();
    assert_eq!(collector.snapshot(), MetricsSnapshot::default());
}

#[test]
fn test_record_appends_and_updates() {
    let collector = MetricsCollector::new();
    collector.record_append("Records");
    collector.record_append("Calves");
    collector.record_update("Records");

    let snapshot = collector.snapshot();
    assert_eq!(snapshot.rows_appended_total, 2);
    assert_eq!(snapshot.rows_updated_total, 1);
    assert_eq!(snapshot.errors_total, 0);
}

#[test]
fn test_record_photo_fit_within_budget() {
    let collector = MetricsCollector::new();
    let fitted = fit_photo(&png(100, 80), 32_000).unwrap();
    collector.record_photo_fit(&fitted);

    let snapshot = collector.snapshot();
    assert_eq!(snapshot.photos_fitted_total, 1);
    assert_eq!(snapshot.photos_over_budget_total, 0);
}

#[test]
fn test_record_photo_fit_over_budget() {
    let collector = MetricsCollector::new();
    let fitted = fit_photo(&png(100, 80), 4).unwrap();
    assert!(!fitted.within_budget);
    collector.record_photo_fit(&fitted);

    let snapshot = collector.snapshot();
    assert_eq!(snapshot.photos_fitted_total, 1);
    assert_eq!(snapshot.photos_over_budget_total, 1);
}

#[test]
fn test_record_multiple_errors() {
    let collector = MetricsCollector::new();
    collector.record_error("validation", "submit_record");
    collector.record_error("row_not_found", "edit_record");
    collector.record_error("io", "read_records");

    assert_eq!(collector.snapshot().errors_total, 3);
}

#[test]
fn test_snapshot_serializes() {
    let collector = MetricsCollector::new();
    collector.record_append("Records");
    let json = serde_json::to_value(collector.snapshot()).unwrap();
    assert_eq!(json["rows_appended_total"], 1);
    assert_eq!(json["errors_total"], 0);
}
