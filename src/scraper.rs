//! Background feed scraping.
//!
//! Each cycle picks the single feed fetched longest ago, stamps it, fetches it and
//! stores any posts not seen before. Cycles run back to back on a fixed interval
//! until the shutdown signal fires.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::db::{Database, NewPost};
use crate::error::{GatorError, Result};
use crate::fetcher::{parse_pub_date, FeedSource};

/// Parse a duration such as `30s`, `1m`, `1h30m` or `1.5h`.
///
/// Units: `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`. Zero durations are rejected.
pub fn parse_interval(input: &str) -> Result<Duration> {
    let invalid = || GatorError::InvalidInterval(input.to_string());

    let mut rest = input.trim();
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total_nanos = 0f64;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_end == 0 {
            return Err(invalid());
        }
        let value: f64 = rest[..number_end].parse().map_err(|_| invalid())?;
        rest = &rest[number_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_end] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return Err(invalid()),
        };
        total_nanos += value * nanos_per_unit;
        rest = &rest[unit_end..];
    }

    if total_nanos < 1.0 || total_nanos > u64::MAX as f64 {
        return Err(invalid());
    }
    Ok(Duration::from_nanos(total_nanos as u64))
}

/// Outcome of one scrape cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub feed_id: i64,
    pub feed_name: String,
    pub inserted: usize,
    /// Items whose URL was already stored.
    pub duplicates: usize,
    /// Items dropped for a missing link, bad date or failed insert.
    pub skipped: usize,
}

pub struct Scraper {
    db: Database,
    source: Arc<dyn FeedSource>,
}

impl Scraper {
    pub fn new(db: Database, source: Arc<dyn FeedSource>) -> Self {
        Self { db, source }
    }

    /// Run a single cycle. Returns `Ok(None)` when there are no feeds.
    ///
    /// A failed fetch is returned as an error after the feed has been stamped,
    /// so the next cycle moves on to another feed. Per-item problems are logged
    /// and never abort the cycle.
    pub async fn scrape_once(&self) -> Result<Option<CycleReport>> {
        let Some(feed) = self.db.get_next_feed_to_fetch().await? else {
            debug!("No feeds to fetch");
            return Ok(None);
        };

        // Stamp before the fetch so a slow or broken feed goes to the back of the rotation.
        self.db
            .mark_feed_fetched(feed.id)
            .await?
            .ok_or_else(|| GatorError::FeedNotFound(feed.url.clone()))?;

        info!("Fetching feed '{}' ({})", feed.name, feed.url);
        let parsed = self.source.fetch(&feed.url).await?;
        debug!(
            "Feed '{}' has channel title {:?} and {} items",
            feed.name,
            parsed.title,
            parsed.items.len()
        );

        let mut report = CycleReport {
            feed_id: feed.id,
            feed_name: feed.name.clone(),
            ..Default::default()
        };

        for item in parsed.items {
            if item.link.is_empty() {
                warn!("Skipping entry with no link: {}", item.title);
                report.skipped += 1;
                continue;
            }

            let published_at = match parse_pub_date(&item.pub_date) {
                Ok(dt) => dt,
                Err(e) => {
                    warn!("Skipping {}: {}", item.link, e);
                    report.skipped += 1;
                    continue;
                }
            };

            let post = NewPost {
                title: item.title,
                url: item.link,
                description: item.description,
                published_at,
                feed_id: feed.id,
            };

            match self.db.create_post(&post).await {
                Ok(_) => report.inserted += 1,
                Err(e) if e.is_unique_violation() => {
                    debug!("Already stored: {}", post.url);
                    report.duplicates += 1;
                }
                Err(e) => {
                    warn!("Couldn't create post {}: {}", post.url, e);
                    report.skipped += 1;
                }
            }
        }

        info!(
            "Feed '{}': {} new, {} already stored, {} skipped",
            feed.name, report.inserted, report.duplicates, report.skipped
        );
        Ok(Some(report))
    }

    /// Scrape immediately, then once per `interval`, until `shutdown` reads `true`
    /// or its sender is dropped. A slow cycle delays the next tick rather than
    /// overlapping with it.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!("Collecting feeds every {:?}", interval);

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }

            if *shutdown.borrow() {
                break;
            }

            if let Err(e) = self.scrape_once().await {
                error!("Failed to scrape feed: {}", e);
            }
        }

        info!("Scraper stopped");
    }
}
