//! External daily exchange-rate table.
//!
//! The currency source is a third-party JSON document (the Central Bank of
//! Russia daily feed by default) of the shape:
//!
//! ```json
//! { "Valute": { "USD": { "Value": 90.0, ... }, "EUR": { "Value": 98.1, ... } } }
//! ```
//!
//! Anything that lacks this shape is a [`RateSourceError::Payload`].

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

/// Errors raised while fetching the daily rate table.
#[derive(Debug, thiserror::Error)]
pub enum RateSourceError {
    /// The HTTP client could not be constructed.
    #[error("rate source client error: {0}")]
    Client(String),

    /// The request failed (connection refused, timeout, ...).
    #[error("rate source request failed: {0}")]
    Http(String),

    /// The source answered with a non-success status.
    #[error("rate source returned HTTP {0}")]
    Status(u16),

    /// The body was not the expected JSON shape.
    #[error("unexpected rate source payload: {0}")]
    Payload(String),
}

/// One day's exchange rates keyed by currency code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateTable {
    rates: BTreeMap<String, f64>,
}

impl RateTable {
    /// Build a table from `(code, rate)` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            rates: pairs.into_iter().map(|(code, rate)| (code.into(), rate)).collect(),
        }
    }

    /// The rate for `currency`, if the table has one.
    pub fn get(&self, currency: &str) -> Option<f64> {
        self.rates.get(currency).copied()
    }

    /// Iterate over every `(code, rate)` pair in code order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.rates.iter().map(|(code, rate)| (code.as_str(), *rate))
    }

    /// Number of currencies in the table.
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// Whether the table has no currencies.
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

/// Source of the daily exchange-rate table.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Fetch today's full rate table.
    ///
    /// # Errors
    ///
    /// Returns [`RateSourceError`] on network failure, non-2xx status, or an
    /// unexpected payload.
    async fn fetch_daily_rates(&self) -> Result<RateTable, RateSourceError>;
}

/// Rate source backed by a single HTTP GET.
pub struct HttpRateSource {
    client: reqwest::Client,
    url: String,
}

impl HttpRateSource {
    /// Create a source for `url` whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`RateSourceError::Client`] if the HTTP client cannot be built.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, RateSourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RateSourceError::Client(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.to_owned(),
        })
    }

    /// The URL this source fetches from.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fetch_daily_rates(&self) -> Result<RateTable, RateSourceError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| RateSourceError::Http(format!("GET {} failed: {e}", self.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RateSourceError::Status(status.as_u16()));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| RateSourceError::Payload(format!("body is not JSON: {e}")))?;

        let table = parse_daily_rates(&json)?;
        tracing::debug!(currencies = table.len(), url = self.url, "Fetched daily rate table");
        Ok(table)
    }
}

/// Extract the rate table from a daily feed document.
///
/// # Errors
///
/// Returns [`RateSourceError::Payload`] if `Valute` is missing or not an
/// object, or if any entry lacks a finite numeric `Value`.
pub fn parse_daily_rates(json: &Value) -> Result<RateTable, RateSourceError> {
    let valute = json
        .get("Valute")
        .and_then(Value::as_object)
        .ok_or_else(|| RateSourceError::Payload("missing `Valute` object".to_owned()))?;

    let mut rates = BTreeMap::new();
    for (code, entry) in valute {
        let value = entry
            .get("Value")
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                RateSourceError::Payload(format!("currency {code} has no numeric `Value`"))
            })?;
        rates.insert(code.clone(), value);
    }

    Ok(RateTable { rates })
}
