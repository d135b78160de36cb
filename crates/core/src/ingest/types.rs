use serde::Deserialize;

// Subset of the Yahoo Finance v8 chart response we read.

#[derive(Debug, Clone, Deserialize)]
pub struct ChartEnvelope {
    pub chart: ChartBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartBody {
    #[serde(default)]
    pub result: Option<Vec<ChartResult>>,
    #[serde(default)]
    pub error: Option<ChartError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartError {
    pub code: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartResult {
    #[serde(default)]
    pub meta: ChartMeta,
    /// Absent when the symbol exists but has no bars in the requested range.
    #[serde(default)]
    pub timestamp: Vec<i64>,
    #[serde(default)]
    pub indicators: Indicators,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartMeta {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    /// Exchange offset from UTC in seconds.
    #[serde(default)]
    pub gmtoffset: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Vec<QuoteBlock>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuoteBlock {
    #[serde(default)]
    pub close: Vec<Option<f64>>,
}
