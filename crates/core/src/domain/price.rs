use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily close, dated in the exchange's local calendar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

pub fn closes(points: &[PricePoint]) -> Vec<f64> {
    points.iter().map(|p| p.close).collect()
}

/// Sorts ascending by date and collapses duplicate dates, keeping the last close seen.
pub fn normalize_series(mut points: Vec<PricePoint>) -> Vec<PricePoint> {
    points.sort_by_key(|p| p.date);

    let mut out: Vec<PricePoint> = Vec::with_capacity(points.len());
    for p in points {
        if let Some(last) = out.last_mut() {
            if last.date == p.date {
                *last = p;
                continue;
            }
        }
        out.push(p);
    }
    out
}
