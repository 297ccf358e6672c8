//! Gator - A command-line blog aggregator
//!
//! Users register, add and follow RSS feeds, and a background scraper
//! periodically fetches the least recently fetched feed and stores new posts.

pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod fetcher;
pub mod handlers;
pub mod middleware;
pub mod scraper;

pub use error::{GatorError, Result};
