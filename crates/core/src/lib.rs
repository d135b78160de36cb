pub mod domain;
pub mod export;
pub mod ingest;
pub mod report;
pub mod time;

pub mod config {
    const DEFAULT_CURRENCY: &str = "INR";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub price_provider_base_url: Option<String>,
        pub report_currency: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                price_provider_base_url: non_empty_var("PRICE_PROVIDER_BASE_URL"),
                report_currency: non_empty_var("REPORT_CURRENCY"),
                sentry_dsn: non_empty_var("SENTRY_DSN"),
            })
        }

        /// Label shown next to money columns; the report itself is currency-agnostic.
        pub fn currency(&self) -> &str {
            self.report_currency.as_deref().unwrap_or(DEFAULT_CURRENCY)
        }
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|s| !s.trim().is_empty())
    }
}
