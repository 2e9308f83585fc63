//! USD-rate Telegram bot
//!
//! A long-polling bot that asks the user for their name and reports the
//! current USD-to-RUB exchange rate published by the Central Bank of Russia,
//! keeping the rate in Redis for a short window when Redis is reachable.

/// Telegram bot implementation
pub mod bot;
/// Best-effort Redis cache for the fetched rate
pub mod cache;
/// Configuration management
pub mod config;
/// Exchange-rate fetching and XML parsing
pub mod rates;
