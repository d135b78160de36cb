use crate::domain::price::{closes, PricePoint};
use crate::domain::profit::max_profit;
use crate::domain::recommendation::{Recommendation, RecommendationRow, ReportTable};
use crate::ingest::{Period, PriceProvider};
use anyhow::Context;
use futures::StreamExt;

pub const INVALID_CASH_PROMPT: &str = "Please enter a valid amount of cash.";

/// NSE large caps and banks the report covers unless `REPORT_TICKERS` says otherwise.
pub const DEFAULT_TICKERS: [&str; 23] = [
    "RELIANCE.NS",
    "TCS.NS",
    "INFY.NS",
    "HDFCBANK.NS",
    "ICICIBANK.NS",
    "KOTAKBANK.NS",
    "AXISBANK.NS",
    "WIPRO.NS",
    "ITC.NS",
    "SBIN.NS",
    "YESBANK.NS",
    "EQUITAS.NS",
    "BAJAJFINSV.NS",
    "HDFCLIFE.NS",
    "PNB.NS",
    "UNIONBANK.NS",
    "BANKBARODA.NS",
    "RBLBANK.NS",
    "TATASTEEL.NS",
    "NHPC.NS",
    "ONGC.NS",
    "IOC.NS",
    "BPCL.NS",
];

#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Tickers in report order. Cash is split evenly across all of them, including ones that
    /// later fail.
    pub tickers: Vec<String>,

    /// History window passed to the price provider.
    pub period: Period,

    /// Number of tickers fetched at once. 1 processes them strictly one after another.
    pub concurrency: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            tickers: DEFAULT_TICKERS.iter().map(|t| t.to_string()).collect(),
            period: Period::default(),
            concurrency: 4,
        }
    }
}

impl ReportOptions {
    pub fn from_env() -> Self {
        let mut out = Self::default();

        if let Ok(s) = std::env::var("REPORT_TICKERS") {
            let tickers = parse_tickers(&s);
            if !tickers.is_empty() {
                out.tickers = tickers;
            }
        }

        if let Ok(s) = std::env::var("REPORT_PERIOD") {
            match s.parse::<Period>() {
                Ok(p) => out.period = p,
                Err(err) => tracing::warn!(error = %err, "ignoring REPORT_PERIOD"),
            }
        }

        if let Ok(s) = std::env::var("REPORT_CONCURRENCY") {
            if let Some(n) = parse_concurrency(&s) {
                out.concurrency = n;
            }
        }

        out
    }
}

/// Parses a worker count, clamping 0 to 1. Unparsable values are logged and ignored.
pub fn parse_concurrency(s: &str) -> Option<usize> {
    match s.trim().parse::<usize>() {
        Ok(n) => Some(n.max(1)),
        Err(err) => {
            tracing::warn!(value = %s, error = %err, "ignoring REPORT_CONCURRENCY");
            None
        }
    }
}

/// Splits a comma-separated ticker list, dropping blanks.
pub fn parse_tickers(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn is_valid_cash(cash: f64) -> bool {
    cash.is_finite() && cash > 0.0
}

/// Fetches every ticker, sizes an even-split position on its best historical window and folds
/// the totals row. Per-ticker failures become empty rows; only invalid input is an error.
pub async fn build_report<P>(
    provider: &P,
    options: &ReportOptions,
    cash: f64,
) -> anyhow::Result<ReportTable>
where
    P: PriceProvider + ?Sized,
{
    anyhow::ensure!(
        is_valid_cash(cash),
        "cash must be a positive amount (got {cash})"
    );
    anyhow::ensure!(!options.tickers.is_empty(), "ticker list must be non-empty");

    let cash_per_stock = cash / options.tickers.len() as f64;
    let concurrency = options.concurrency.max(1);

    tracing::info!(
        provider = provider.provider_name(),
        tickers = options.tickers.len(),
        cash,
        cash_per_stock,
        period = %options.period,
        concurrency,
        "building allocation report"
    );

    // Tickers are cloned so each future owns its input and stays `Send` for any caller lifetime.
    // `buffered` keeps results in input order regardless of completion order.
    let period = options.period;
    let rows: Vec<RecommendationRow> = futures::stream::iter(options.tickers.iter().cloned())
        .map(move |ticker: String| async move {
            let outcome = evaluate_ticker(provider, &ticker, period, cash_per_stock).await;
            into_row(&ticker, outcome)
        })
        .buffered(concurrency)
        .collect()
        .await;

    let table = ReportTable::new(cash, cash_per_stock, rows)?;

    tracing::info!(
        priced = table.rows.iter().filter(|r| r.as_priced().is_some()).count(),
        failed = table.failures().count(),
        shares = table.totals.shares,
        profit = table.totals.profit,
        "allocation report built"
    );

    Ok(table)
}

async fn evaluate_ticker<P>(
    provider: &P,
    ticker: &str,
    period: Period,
    cash_per_stock: f64,
) -> anyhow::Result<Option<Recommendation>>
where
    P: PriceProvider + ?Sized,
{
    let series = provider
        .fetch_closes(ticker, period)
        .await
        .with_context(|| format!("fetch prices for {ticker} failed"))?;
    allocate(ticker, &series, cash_per_stock)
}

fn into_row(ticker: &str, outcome: anyhow::Result<Option<Recommendation>>) -> RecommendationRow {
    match outcome {
        Ok(Some(rec)) => RecommendationRow::Priced(rec),
        Ok(None) => {
            tracing::info!(%ticker, "no price history; leaving row empty");
            RecommendationRow::Empty {
                ticker: ticker.to_string(),
                reason: None,
            }
        }
        Err(err) => {
            let reason = format!("{err:#}");
            tracing::warn!(%ticker, error = %reason, "ticker failed; leaving row empty");
            RecommendationRow::Empty {
                ticker: ticker.to_string(),
                reason: Some(reason),
            }
        }
    }
}

/// Sizes one ticker's position. Returns `Ok(None)` for an empty series.
///
/// Shares are whole units, so realized profit is recomputed from the rounded position rather
/// than scaled from the per-share spread.
pub fn allocate(
    ticker: &str,
    series: &[PricePoint],
    cash_per_stock: f64,
) -> anyhow::Result<Option<Recommendation>> {
    if series.is_empty() {
        return Ok(None);
    }

    let window = max_profit(&closes(series))?;
    let buy = series[window.buy_index];
    let sell = series[window.sell_index];

    anyhow::ensure!(
        buy.close > 0.0,
        "buy price must be positive (got {} on {})",
        buy.close,
        buy.date
    );

    let whole_shares = (cash_per_stock / buy.close).floor();
    // `u64::MAX as f64` rounds up to 2^64, so the bound must be strict.
    anyhow::ensure!(
        whole_shares < u64::MAX as f64,
        "share count {whole_shares} at buy price {} does not fit in u64",
        buy.close
    );
    let shares = whole_shares as u64;
    let investment = shares as f64 * buy.close;
    let value = shares as f64 * sell.close;

    Ok(Some(Recommendation {
        ticker: ticker.to_string(),
        buy_date: buy.date,
        buy_price: buy.close,
        sell_date: sell.date,
        sell_price: sell.close,
        cash_allocated: cash_per_stock,
        shares,
        investment,
        value,
        profit: value - investment,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use chrono::{Duration, NaiveDate};
    use std::collections::HashMap;

    #[derive(Clone)]
    enum Canned {
        Prices(Vec<f64>),
        Fail(&'static str),
    }

    #[derive(Default)]
    struct StubProvider {
        responses: HashMap<String, Canned>,
        delays_ms: HashMap<String, u64>,
    }

    impl StubProvider {
        fn with(mut self, ticker: &str, canned: Canned) -> Self {
            self.responses.insert(ticker.to_string(), canned);
            self
        }

        fn delayed(mut self, ticker: &str, ms: u64) -> Self {
            self.delays_ms.insert(ticker.to_string(), ms);
            self
        }
    }

    fn series(prices: &[f64]) -> Vec<PricePoint> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| PricePoint::new(start + Duration::days(i as i64), p))
            .collect()
    }

    #[async_trait::async_trait]
    impl PriceProvider for StubProvider {
        fn provider_name(&self) -> &'static str {
            "stub"
        }

        async fn fetch_closes(&self, ticker: &str, _period: Period) -> Result<Vec<PricePoint>> {
            if let Some(ms) = self.delays_ms.get(ticker) {
                tokio::time::sleep(std::time::Duration::from_millis(*ms)).await;
            }
            match self.responses.get(ticker) {
                Some(Canned::Prices(p)) => Ok(series(p)),
                Some(Canned::Fail(msg)) => anyhow::bail!("{msg}"),
                None => Ok(Vec::new()),
            }
        }
    }

    fn options(tickers: &[&str]) -> ReportOptions {
        ReportOptions {
            tickers: tickers.iter().map(|t| t.to_string()).collect(),
            period: Period::Max,
            concurrency: 1,
        }
    }

    #[tokio::test]
    async fn builds_rows_in_order_with_totals() {
        let provider = StubProvider::default()
            .with("A", Canned::Prices(vec![7.0, 1.0, 5.0, 3.0, 6.0, 4.0]))
            .with("B", Canned::Fail("connection reset"))
            .with("C", Canned::Prices(vec![300.0, 250.0, 400.0]))
            .with("D", Canned::Prices(vec![]));

        let table = build_report(&provider, &options(&["A", "B", "C", "D"]), 4000.0)
            .await
            .unwrap();

        assert_eq!(table.len(), 5);
        assert_eq!(table.cash_per_stock, 4000.0 / 4.0);
        let tickers: Vec<_> = table.rows.iter().map(|r| r.ticker()).collect();
        assert_eq!(tickers, vec!["A", "B", "C", "D"]);

        let a = table.rows[0].as_priced().unwrap();
        assert_eq!((a.buy_price, a.sell_price), (1.0, 6.0));
        assert_eq!(a.buy_date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(a.sell_date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(a.shares, 1000);
        assert_eq!(a.profit, 5000.0);

        let c = table.rows[2].as_priced().unwrap();
        assert_eq!(c.shares, 4);
        assert_eq!(c.investment, 1000.0);
        assert_eq!(c.value, 1600.0);

        match &table.rows[1] {
            RecommendationRow::Empty { reason, .. } => {
                let reason = reason.as_deref().unwrap();
                assert!(reason.contains("fetch prices for B failed"));
                assert!(reason.contains("connection reset"));
            }
            other => panic!("expected empty row, got {other:?}"),
        }
        assert_eq!(
            table.rows[3],
            RecommendationRow::Empty {
                ticker: "D".to_string(),
                reason: None
            }
        );

        assert_eq!(table.totals.cash, 4000.0);
        assert_eq!(table.totals.shares, 1004);
        assert_eq!(table.totals.investment, 2000.0);
        assert_eq!(table.totals.value, 7600.0);
        assert_eq!(table.totals.profit, table.totals.value - table.totals.investment);
    }

    #[tokio::test]
    async fn concurrent_fetches_keep_ticker_order() {
        let provider = StubProvider::default()
            .with("SLOW", Canned::Prices(vec![1.0, 2.0]))
            .with("MID", Canned::Prices(vec![2.0, 3.0]))
            .with("FAST", Canned::Prices(vec![4.0, 5.0]))
            .delayed("SLOW", 40)
            .delayed("MID", 20);

        let mut opts = options(&["SLOW", "MID", "FAST"]);
        opts.concurrency = 3;

        let table = build_report(&provider, &opts, 300.0).await.unwrap();
        let tickers: Vec<_> = table.rows.iter().map(|r| r.ticker()).collect();
        assert_eq!(tickers, vec!["SLOW", "MID", "FAST"]);
        assert_eq!(table.totals.shares, 100 + 50 + 25);
    }

    #[tokio::test]
    async fn every_ticker_failing_still_yields_full_table() {
        let provider = StubProvider::default()
            .with("X", Canned::Fail("HTTP 500"))
            .with("Y", Canned::Fail("HTTP 503"));

        let table = build_report(&provider, &options(&["X", "Y"]), 1000.0)
            .await
            .unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.failures().count(), 2);
        assert_eq!(table.totals.shares, 0);
        assert_eq!(table.totals.investment, 0.0);
        assert_eq!(table.totals.profit, 0.0);
        assert_eq!(table.totals.cash, 1000.0);
    }

    #[tokio::test]
    async fn refuses_invalid_input() {
        let provider = StubProvider::default();
        for cash in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            assert!(build_report(&provider, &options(&["A"]), cash).await.is_err());
        }
        assert!(build_report(&provider, &options(&[]), 100.0).await.is_err());
    }

    #[test]
    fn realized_profit_uses_whole_shares() {
        let rec = allocate("R", &series(&[300.0, 450.0]), 1000.0)
            .unwrap()
            .unwrap();

        assert_eq!(rec.shares, 3);
        assert_eq!(rec.investment, 900.0);
        assert_eq!(rec.value, 1350.0);
        assert_eq!(rec.profit, 450.0);
        assert!(rec.investment <= rec.cash_allocated);
    }

    #[test]
    fn price_above_allocation_buys_nothing() {
        let rec = allocate("BIG", &series(&[5000.0, 6000.0]), 1000.0)
            .unwrap()
            .unwrap();
        assert_eq!(rec.shares, 0);
        assert_eq!((rec.investment, rec.value, rec.profit), (0.0, 0.0, 0.0));
    }

    #[test]
    fn falling_series_buys_and_sells_on_first_day() {
        let rec = allocate("DOWN", &series(&[10.0, 8.0, 5.0]), 100.0)
            .unwrap()
            .unwrap();
        assert_eq!(rec.buy_date, rec.sell_date);
        assert_eq!(rec.shares, 10);
        assert_eq!(rec.profit, 0.0);
    }

    #[test]
    fn non_positive_buy_price_is_an_error() {
        assert!(allocate("ZERO", &series(&[0.0, 1.0]), 100.0).is_err());
        assert!(allocate("EMPTY", &[], 100.0).unwrap().is_none());
    }

    #[test]
    fn share_count_beyond_u64_is_an_error() {
        let err = allocate("HUGE", &series(&[1.0, 2.0]), 1e20).unwrap_err();
        assert!(err.to_string().contains("does not fit in u64"));

        // 2^64 is exactly `u64::MAX as f64`; it must not saturate.
        assert!(allocate("EDGE", &series(&[1.0, 2.0]), 18_446_744_073_709_551_616.0).is_err());
    }

    #[tokio::test]
    async fn oversized_allocation_degrades_row_instead_of_saturating() {
        let provider = StubProvider::default()
            .with("HUGE", Canned::Prices(vec![1.0, 2.0]))
            .with("OK", Canned::Prices(vec![1e18, 2e18]));

        let table = build_report(&provider, &options(&["HUGE", "OK"]), 4e19)
            .await
            .unwrap();

        assert!(table.rows[0].failure_reason().unwrap().contains("does not fit in u64"));
        assert_eq!(table.rows[1].as_priced().unwrap().shares, 20);
        assert_eq!(table.totals.shares, 20);
    }

    #[test]
    fn concurrency_values_clamp_or_are_ignored() {
        assert_eq!(parse_concurrency("8"), Some(8));
        assert_eq!(parse_concurrency(" 0 "), Some(1));
        assert_eq!(parse_concurrency("lots"), None);
        assert_eq!(parse_concurrency("-2"), None);
    }

    #[test]
    fn parses_ticker_lists() {
        assert_eq!(
            parse_tickers(" TCS.NS, ,INFY.NS,"),
            vec!["TCS.NS".to_string(), "INFY.NS".to_string()]
        );
        assert_eq!(ReportOptions::default().tickers.len(), 23);
    }
}
