//! USD exchange-rate fetching
//!
//! Fetches the daily currency listing from the Central Bank of Russia and
//! extracts the USD quotation. All failures are absorbed at the
//! [`RateSource`] seam: callers see `None`, details go to the log.

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Daily currency listing endpoint of the Central Bank of Russia
pub const CBR_DAILY_URL: &str = "https://www.cbr.ru/scripts/XML_daily.asp";

/// Character code of the currency this bot reports
const USD_CODE: &str = "USD";

/// Timeout for the outbound rate request
const HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum RateError {
    #[error("rate request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed rates XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("currency {0} not present in response")]
    CurrencyNotFound(String),
    #[error("unparseable rate value: {0:?}")]
    BadValue(String),
}

/// Source of the current USD-to-RUB rate
///
/// The trait boundary lets the conversation flow run against a stub in tests.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Current rate, or `None` when it could not be obtained
    async fn fetch_usd_rate(&self) -> Option<f64>;
}

/// HTTP client for the CBR daily listing
pub struct CbrRates {
    http: reqwest::Client,
    url: String,
}

impl CbrRates {
    /// Client pointed at the production CBR endpoint
    #[must_use]
    pub fn new() -> Self {
        Self::with_url(CBR_DAILY_URL)
    }

    /// Client pointed at an alternative endpoint
    #[must_use]
    pub fn with_url(url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            url: url.into(),
        }
    }

    async fn fetch(&self) -> Result<f64, RateError> {
        let body = self
            .http
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_rate(&body, USD_CODE)
    }
}

impl Default for CbrRates {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateSource for CbrRates {
    async fn fetch_usd_rate(&self) -> Option<f64> {
        match self.fetch().await {
            Ok(rate) => Some(rate),
            Err(e) => {
                warn!("Failed to fetch USD rate: {e}");
                None
            }
        }
    }
}

enum Field {
    CharCode,
    Value,
}

/// Extracts the quotation of `code` from a CBR daily-listing document.
///
/// The listing is a sequence of `<Valute>` entries carrying a `<CharCode>`
/// and a decimal-comma `<Value>`; the comma is normalized to a point before
/// parsing.
///
/// # Errors
///
/// Returns a [`RateError`] on malformed XML, a missing entry for `code`, or
/// a value that does not parse as a number.
pub fn parse_rate(xml: &str, code: &str) -> Result<f64, RateError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut char_code: Option<String> = None;
    let mut value: Option<String> = None;
    let mut current: Option<Field> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"Valute" => {
                    char_code = None;
                    value = None;
                }
                b"CharCode" => current = Some(Field::CharCode),
                b"Value" => current = Some(Field::Value),
                _ => current = None,
            },
            Event::Text(t) => {
                if let Some(field) = current.take() {
                    let text = t.unescape()?.into_owned();
                    match field {
                        Field::CharCode => char_code = Some(text),
                        Field::Value => value = Some(text),
                    }
                }
            }
            Event::End(e) if e.name().as_ref() == b"Valute" => {
                if char_code.as_deref() == Some(code) {
                    let raw = value.unwrap_or_default();
                    return raw
                        .replace(',', ".")
                        .parse::<f64>()
                        .map_err(|_| RateError::BadValue(raw));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Err(RateError::CurrencyNotFound(code.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAILY_LISTING: &str = r#"<?xml version="1.0" encoding="windows-1251"?>
<ValCurs Date="05.08.2026" name="Foreign Currency Market">
    <Valute ID="R01010">
        <NumCode>036</NumCode>
        <CharCode>AUD</CharCode>
        <Nominal>1</Nominal>
        <Name>Австралийский доллар</Name>
        <Value>60,1475</Value>
    </Valute>
    <Valute ID="R01235">
        <NumCode>840</NumCode>
        <CharCode>USD</CharCode>
        <Nominal>1</Nominal>
        <Name>Доллар США</Name>
        <Value>93,25</Value>
    </Valute>
    <Valute ID="R01239">
        <NumCode>978</NumCode>
        <CharCode>EUR</CharCode>
        <Nominal>1</Nominal>
        <Name>Евро</Name>
        <Value>101,0417</Value>
    </Valute>
</ValCurs>"#;

    #[test]
    fn test_parses_decimal_comma_value() -> Result<(), RateError> {
        let rate = parse_rate(DAILY_LISTING, "USD")?;
        assert!((rate - 93.25).abs() < f64::EPSILON);
        Ok(())
    }

    #[test]
    fn test_other_entries_do_not_shadow_requested_code() -> Result<(), RateError> {
        let rate = parse_rate(DAILY_LISTING, "EUR")?;
        assert!((rate - 101.0417).abs() < f64::EPSILON);
        Ok(())
    }

    #[test]
    fn test_missing_entry_is_an_error() {
        let listing = r#"<ValCurs><Valute><CharCode>EUR</CharCode><Value>101,04</Value></Valute></ValCurs>"#;
        assert!(matches!(
            parse_rate(listing, "USD"),
            Err(RateError::CurrencyNotFound(_))
        ));
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        let garbage = r#"<ValCurs><Valute><CharCode>USD</WrongTag></ValCurs>"#;
        assert!(parse_rate(garbage, "USD").is_err());
    }

    #[test]
    fn test_non_xml_body_is_an_error() {
        assert!(parse_rate("Сервис временно недоступен", "USD").is_err());
    }

    #[test]
    fn test_unparseable_value_is_an_error() {
        let listing =
            r#"<ValCurs><Valute><CharCode>USD</CharCode><Value>n/a</Value></Valute></ValCurs>"#;
        assert!(matches!(
            parse_rate(listing, "USD"),
            Err(RateError::BadValue(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_absorbed_to_none() {
        // Port 9 (discard) is closed in any sane environment
        let rates = CbrRates::with_url("http://127.0.0.1:9/rates");
        assert_eq!(rates.fetch_usd_rate().await, None);
    }
}
