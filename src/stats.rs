//! Aggregate statistics over production records.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::models::{ProductionRecord, ProductiveStatus};

/// How many records the top-producers list keeps
pub const TOP_PRODUCERS: usize = 5;

/// Herd-wide figures derived from every production record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HerdStatistics {
    /// Number of production records
    pub total_records: usize,
    /// Litres across all records
    pub total_litres: f64,
    /// Mean litres per record
    pub average_litres: f64,
    /// Largest single record
    pub max_litres: f64,
    /// Smallest single record
    pub min_litres: f64,
    /// Records marked productive
    pub productive: usize,
    /// Records marked not productive
    pub not_productive: usize,
    /// Records marked resting
    pub resting: usize,
    /// Mean age in years
    pub average_age: f64,
    /// Records of cows that have calved
    pub calved: usize,
    /// Records of dry cows
    pub dry: usize,
    /// Records reporting at least one ailment
    pub with_ailments: usize,
    /// Sum of offspring counts
    pub total_offspring: u64,
    /// Mean offspring count
    pub average_offspring: f64,
    /// Mean birth count
    pub average_births: f64,
    /// Highest-litre records, best first
    pub top_producers: Vec<TopProducer>,
    /// Totals per operator, sorted by name
    pub by_operator: BTreeMap<String, OperatorTotals>,
}

/// One entry of the top-producers list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopProducer {
    /// Cow identifier
    pub cow_id: String,
    /// Cow name on that record
    pub cow_name: String,
    /// Litres on that record
    pub litres: f64,
    /// When the record was taken
    pub timestamp: NaiveDateTime,
}

/// Litres and record count for one operator
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct OperatorTotals {
    /// Litres recorded by the operator
    pub total_litres: f64,
    /// Records taken by the operator
    pub records: usize,
}

impl HerdStatistics {
    /// Compute statistics; `None` when there are no records.
    #[must_use]
    pub fn from_records(records: &[ProductionRecord]) -> Option<Self> {
        if records.is_empty() {
            return None;
        }
        let count = records.len() as f64;

        let total_litres: f64 = records.iter().map(|r| r.litres).sum();
        let max_litres = records.iter().map(|r| r.litres).fold(f64::NEG_INFINITY, f64::max);
        let min_litres = records.iter().map(|r| r.litres).fold(f64::INFINITY, f64::min);
        let with_status = |status: ProductiveStatus| records.iter().filter(|r| r.status == status).count();
        let total_age: u64 = records.iter().map(|r| u64::from(r.age)).sum();
        let total_offspring: u64 = records.iter().map(|r| u64::from(r.offspring)).sum();
        let total_births: u64 = records.iter().map(|r| u64::from(r.births)).sum();

        let mut ranked: Vec<&ProductionRecord> = records.iter().collect();
        // Stable sort keeps append order among equal producers
        ranked.sort_by(|a, b| b.litres.total_cmp(&a.litres));
        let top_producers = ranked
            .into_iter()
            .take(TOP_PRODUCERS)
            .map(|r| TopProducer {
                cow_id: r.cow_id.clone(),
                cow_name: r.cow_name.clone(),
                litres: r.litres,
                timestamp: r.timestamp,
            })
            .collect();

        let mut by_operator: BTreeMap<String, OperatorTotals> = BTreeMap::new();
        for record in records {
            let totals = by_operator.entry(record.operator.clone()).or_default();
            totals.total_litres += record.litres;
            totals.records += 1;
        }
        for totals in by_operator.values_mut() {
            totals.total_litres = round_to(totals.total_litres, 2);
        }

        Some(Self {
            total_records: records.len(),
            total_litres: round_to(total_litres, 2),
            average_litres: round_to(total_litres / count, 2),
            max_litres: round_to(max_litres, 2),
            min_litres: round_to(min_litres, 2),
            productive: with_status(ProductiveStatus::Productive),
            not_productive: with_status(ProductiveStatus::NotProductive),
            resting: with_status(ProductiveStatus::Resting),
            average_age: round_to(total_age as f64 / count, 1),
            calved: records.iter().filter(|r| r.calved).count(),
            dry: records.iter().filter(|r| r.dry).count(),
            with_ailments: records.iter().filter(|r| r.has_ailments()).count(),
            total_offspring,
            average_offspring: round_to(total_offspring as f64 / count, 1),
            average_births: round_to(total_births as f64 / count, 1),
            top_producers,
            by_operator,
        })
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10_f64.powi(places);
    (value * factor).round() / factor
}
