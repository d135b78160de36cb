use stockpick_core::domain::recommendation::{RecommendationRow, ReportTable, TOTAL_TICKER};

const HEADERS: [&str; 10] = [
    "Ticker",
    "Buy Date",
    "Buy Price",
    "Sell Date",
    "Sell Price",
    "Cash Allocated",
    "Shares to Buy",
    "Total Investment",
    "Total Value",
    "Profit",
];

const BLANK: &str = "-";

fn money(v: f64) -> String {
    format!("{v:.2}")
}

fn cells(row: &RecommendationRow) -> Vec<String> {
    match row {
        RecommendationRow::Priced(r) => vec![
            r.ticker.clone(),
            r.buy_date.to_string(),
            money(r.buy_price),
            r.sell_date.to_string(),
            money(r.sell_price),
            money(r.cash_allocated),
            r.shares.to_string(),
            money(r.investment),
            money(r.value),
            money(r.profit),
        ],
        RecommendationRow::Empty { ticker, .. } => {
            let mut out = vec![ticker.clone()];
            out.extend(std::iter::repeat(BLANK.to_string()).take(HEADERS.len() - 1));
            out
        }
    }
}

/// Fixed-width text rendering for the terminal; the CSV export keeps full precision.
pub fn render_table(table: &ReportTable, currency: &str) -> String {
    let totals = &table.totals;
    let mut lines: Vec<Vec<String>> = Vec::with_capacity(table.len() + 1);
    lines.push(HEADERS.iter().map(|h| h.to_string()).collect());
    lines.extend(table.rows.iter().map(cells));
    lines.push(vec![
        TOTAL_TICKER.to_string(),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
        money(totals.cash),
        totals.shares.to_string(),
        money(totals.investment),
        money(totals.value),
        money(totals.profit),
    ]);

    let mut widths = [0usize; HEADERS.len()];
    for line in &lines {
        for (w, cell) in widths.iter_mut().zip(line) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = format!("Investment Suggestions ({currency})\n");
    for (i, line) in lines.iter().enumerate() {
        let rendered: Vec<String> = line
            .iter()
            .zip(widths)
            .enumerate()
            .map(|(col, (cell, w))| {
                if col == 0 {
                    format!("{cell:<w$}")
                } else {
                    format!("{cell:>w$}")
                }
            })
            .collect();
        out.push_str(rendered.join("  ").trim_end());
        out.push('\n');
        if i == 0 || i == lines.len() - 2 {
            let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
            out.push_str(&rule.join("  "));
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use stockpick_core::domain::recommendation::Recommendation;

    #[test]
    fn renders_aligned_rows_and_totals() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let rows = vec![
            RecommendationRow::Priced(Recommendation {
                ticker: "TCS.NS".to_string(),
                buy_date: d,
                buy_price: 100.0,
                sell_date: d,
                sell_price: 150.5,
                cash_allocated: 500.0,
                shares: 5,
                investment: 500.0,
                value: 752.5,
                profit: 252.5,
            }),
            RecommendationRow::Empty {
                ticker: "PNB.NS".to_string(),
                reason: Some("HTTP 500".to_string()),
            },
        ];
        let table = ReportTable::new(1000.0, 500.0, rows).unwrap();

        let text = render_table(&table, "INR");
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines[0], "Investment Suggestions (INR)");
        assert!(lines[1].starts_with("Ticker"));
        assert!(lines[3].starts_with("TCS.NS"));
        assert!(lines[3].ends_with("252.50"));
        assert!(lines[4].starts_with("PNB.NS"));
        assert!(lines[4].ends_with('-'));
        assert!(lines[6].starts_with("Total"));
        assert!(lines[6].contains("1000.00"));
        assert_eq!(lines[1].len(), lines[2].len());
    }
}
