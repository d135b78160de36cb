use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const TOTAL_TICKER: &str = "Total";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub ticker: String,
    pub buy_date: NaiveDate,
    pub buy_price: f64,
    pub sell_date: NaiveDate,
    pub sell_price: f64,
    pub cash_allocated: f64,
    pub shares: u64,
    pub investment: f64,
    pub value: f64,
    pub profit: f64,
}

/// One line of the report. `Empty` covers both "no data" (`reason: None`) and per-ticker
/// failures (`reason: Some(..)`); it never contributes to totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecommendationRow {
    Priced(Recommendation),
    Empty {
        ticker: String,
        reason: Option<String>,
    },
}

impl RecommendationRow {
    pub fn ticker(&self) -> &str {
        match self {
            RecommendationRow::Priced(r) => &r.ticker,
            RecommendationRow::Empty { ticker, .. } => ticker,
        }
    }

    pub fn as_priced(&self) -> Option<&Recommendation> {
        match self {
            RecommendationRow::Priced(r) => Some(r),
            RecommendationRow::Empty { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            RecommendationRow::Empty { reason, .. } => reason.as_deref(),
            RecommendationRow::Priced(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    /// The full cash amount, not the per-ticker split.
    pub cash: f64,
    pub shares: u64,
    pub investment: f64,
    pub value: f64,
    pub profit: f64,
}

impl Totals {
    /// Sums the priced rows. Fails if the share count does not fit in `u64`.
    pub fn from_rows(cash: f64, rows: &[RecommendationRow]) -> anyhow::Result<Self> {
        let mut shares = 0u64;
        let mut investment = 0.0;
        let mut value = 0.0;
        for r in rows.iter().filter_map(RecommendationRow::as_priced) {
            shares = shares
                .checked_add(r.shares)
                .with_context(|| format!("total share count overflows at {}", r.ticker))?;
            investment += r.investment;
            value += r.value;
        }

        Ok(Self {
            cash,
            shares,
            investment,
            value,
            profit: value - investment,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportTable {
    pub cash_per_stock: f64,
    pub rows: Vec<RecommendationRow>,
    pub totals: Totals,
}

impl ReportTable {
    pub fn new(
        cash: f64,
        cash_per_stock: f64,
        rows: Vec<RecommendationRow>,
    ) -> anyhow::Result<Self> {
        let totals = Totals::from_rows(cash, &rows)?;
        Ok(Self {
            cash_per_stock,
            rows,
            totals,
        })
    }

    /// Row count including the totals line.
    pub fn len(&self) -> usize {
        self.rows.len() + 1
    }

    /// Always false: the totals line is present even when there are no ticker rows.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// `(ticker, reason)` for every row that degraded because of an error.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rows
            .iter()
            .filter_map(|r| r.failure_reason().map(|reason| (r.ticker(), reason)))
    }
}
