use serde::Serialize;
use std::fmt;

/// Best single trade over a price sequence: buy at `buy_index`, sell at `sell_index`.
///
/// `buy_index <= sell_index` always holds, and is strict whenever `profit > 0`.
/// When no trade makes money both indices are 0 and `profit` is 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProfitWindow {
    pub buy_index: usize,
    pub sell_index: usize,
    pub profit: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProfitError {
    EmptySeries,
    NonFinitePrice { index: usize },
}

impl fmt::Display for ProfitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfitError::EmptySeries => write!(f, "price series is empty"),
            ProfitError::NonFinitePrice { index } => {
                write!(f, "price at index {index} is not a finite number")
            }
        }
    }
}

impl std::error::Error for ProfitError {}

/// Single left-to-right scan. The running minimum is only a candidate buy point; it is committed
/// together with the sell point when the spread strictly beats the best so far, so a later low
/// never lands after the recorded sell. Equal spreads keep the earliest window.
pub fn max_profit(prices: &[f64]) -> Result<ProfitWindow, ProfitError> {
    let first = *prices.first().ok_or(ProfitError::EmptySeries)?;
    if !first.is_finite() {
        return Err(ProfitError::NonFinitePrice { index: 0 });
    }

    let mut best = ProfitWindow {
        buy_index: 0,
        sell_index: 0,
        profit: 0.0,
    };
    let mut min_price = first;
    let mut min_index = 0;

    for (i, &price) in prices.iter().enumerate().skip(1) {
        if !price.is_finite() {
            return Err(ProfitError::NonFinitePrice { index: i });
        }

        if price < min_price {
            min_price = price;
            min_index = i;
        } else if price - min_price > best.profit {
            best = ProfitWindow {
                buy_index: min_index,
                sell_index: i,
                profit: price - min_price,
            };
        }
    }

    Ok(best)
}
