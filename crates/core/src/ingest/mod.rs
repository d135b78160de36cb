pub mod period;
pub mod provider;
pub mod types;

pub use period::Period;
pub use provider::{PriceProvider, YahooChartProvider};
