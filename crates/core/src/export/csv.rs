use crate::domain::recommendation::{
    Recommendation, RecommendationRow, ReportTable, Totals, TOTAL_TICKER,
};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::io;

pub const CSV_FILE_NAME: &str = "stock_recommendations.csv";
pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// One CSV line. Field order is the column order; empty rows and the date/price cells of the
/// totals line are blank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CsvRow {
    #[serde(rename = "Ticker")]
    ticker: String,
    #[serde(rename = "Buy Date")]
    buy_date: Option<NaiveDate>,
    #[serde(rename = "Buy Price")]
    buy_price: Option<f64>,
    #[serde(rename = "Sell Date")]
    sell_date: Option<NaiveDate>,
    #[serde(rename = "Sell Price")]
    sell_price: Option<f64>,
    #[serde(rename = "Cash Allocated")]
    cash_allocated: Option<f64>,
    #[serde(rename = "Shares to Buy")]
    shares: Option<u64>,
    #[serde(rename = "Total Investment")]
    investment: Option<f64>,
    #[serde(rename = "Total Value")]
    value: Option<f64>,
    #[serde(rename = "Profit")]
    profit: Option<f64>,
}

impl CsvRow {
    fn blank(ticker: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            buy_date: None,
            buy_price: None,
            sell_date: None,
            sell_price: None,
            cash_allocated: None,
            shares: None,
            investment: None,
            value: None,
            profit: None,
        }
    }

    fn from_row(row: &RecommendationRow) -> Self {
        match row {
            RecommendationRow::Priced(r) => Self {
                ticker: r.ticker.clone(),
                buy_date: Some(r.buy_date),
                buy_price: Some(r.buy_price),
                sell_date: Some(r.sell_date),
                sell_price: Some(r.sell_price),
                cash_allocated: Some(r.cash_allocated),
                shares: Some(r.shares),
                investment: Some(r.investment),
                value: Some(r.value),
                profit: Some(r.profit),
            },
            RecommendationRow::Empty { ticker, .. } => Self::blank(ticker),
        }
    }

    fn from_totals(totals: &Totals) -> Self {
        Self {
            cash_allocated: Some(totals.cash),
            shares: Some(totals.shares),
            investment: Some(totals.investment),
            value: Some(totals.value),
            profit: Some(totals.profit),
            ..Self::blank(TOTAL_TICKER)
        }
    }

    fn into_row(self) -> Result<RecommendationRow> {
        if self == Self::blank(&self.ticker) {
            return Ok(RecommendationRow::Empty {
                ticker: self.ticker,
                reason: None,
            });
        }

        let ticker = self.ticker;
        let missing = |col: &str| format!("row {ticker}: missing {col}");
        Ok(RecommendationRow::Priced(Recommendation {
            buy_date: self.buy_date.with_context(|| missing("Buy Date"))?,
            buy_price: self.buy_price.with_context(|| missing("Buy Price"))?,
            sell_date: self.sell_date.with_context(|| missing("Sell Date"))?,
            sell_price: self.sell_price.with_context(|| missing("Sell Price"))?,
            cash_allocated: self
                .cash_allocated
                .with_context(|| missing("Cash Allocated"))?,
            shares: self.shares.with_context(|| missing("Shares to Buy"))?,
            investment: self.investment.with_context(|| missing("Total Investment"))?,
            value: self.value.with_context(|| missing("Total Value"))?,
            profit: self.profit.with_context(|| missing("Profit"))?,
            ticker,
        }))
    }

    fn into_totals(self) -> Result<Totals> {
        anyhow::ensure!(
            self.ticker == TOTAL_TICKER,
            "last CSV row must be the {TOTAL_TICKER} row (got {:?})",
            self.ticker
        );
        Ok(Totals {
            cash: self.cash_allocated.context("totals row: missing Cash Allocated")?,
            shares: self.shares.context("totals row: missing Shares to Buy")?,
            investment: self.investment.context("totals row: missing Total Investment")?,
            value: self.value.context("totals row: missing Total Value")?,
            profit: self.profit.context("totals row: missing Profit")?,
        })
    }
}

/// Writes the header, one line per ticker and the totals line.
pub fn write_csv<W: io::Write>(table: &ReportTable, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in &table.rows {
        wtr.serialize(CsvRow::from_row(row))
            .with_context(|| format!("failed to write CSV row for {}", row.ticker()))?;
    }
    wtr.serialize(CsvRow::from_totals(&table.totals))
        .context("failed to write CSV totals row")?;
    wtr.flush().context("failed to flush CSV writer")?;
    Ok(())
}

pub fn to_csv_string(table: &ReportTable) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(table, &mut buf)?;
    String::from_utf8(buf).context("CSV output is not UTF-8")
}

/// Reads a table written by [`write_csv`]. Failure reasons are not part of the file, so empty
/// rows come back with `reason: None`.
pub fn parse_csv<R: io::Read>(reader: R) -> Result<ReportTable> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut records = rdr
        .deserialize::<CsvRow>()
        .collect::<Result<Vec<_>, _>>()
        .context("failed to parse report CSV")?;

    let totals = records
        .pop()
        .context("report CSV has no rows")?
        .into_totals()?;
    let rows = records
        .into_iter()
        .map(CsvRow::into_row)
        .collect::<Result<Vec<_>>>()?;

    let cash_per_stock = if rows.is_empty() {
        totals.cash
    } else {
        totals.cash / rows.len() as f64
    };

    Ok(ReportTable {
        cash_per_stock,
        rows,
        totals,
    })
}
