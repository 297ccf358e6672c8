use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_rs::model::FeedType;
use feed_rs::parser;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{GatorError, Result};

/// chrono format for publish dates: RFC 1123 with a numeric zone,
/// e.g. `Mon, 02 Jan 2006 15:04:05 -0700`.
pub const PUB_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Largest feed document we are willing to read.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

const USER_AGENT: &str = "gator/0.1 (Blog Aggregator)";

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Parse a publish date written in [`PUB_DATE_FORMAT`].
///
/// The weekday has to be a real day name but is not checked against the date;
/// plenty of feeds get it wrong.
pub fn parse_pub_date(raw: &str) -> Result<DateTime<Utc>> {
    let invalid = |reason: &str| GatorError::InvalidDate(format!("{:?}: {}", raw, reason));

    let (weekday, rest) = raw
        .trim()
        .split_once(", ")
        .ok_or_else(|| invalid("missing weekday"))?;
    if !WEEKDAYS.contains(&weekday) {
        return Err(invalid("unknown weekday"));
    }

    DateTime::parse_from_str(rest, "%d %b %Y %H:%M:%S %z")
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| invalid(&e.to_string()))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFeed {
    pub title: String,
    pub items: Vec<ParsedItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedItem {
    pub title: String,
    pub link: String,
    pub description: Option<String>,
    /// Raw publish date as it appeared in the document; empty when absent.
    pub pub_date: String,
}

/// Something that can turn a feed URL into a parsed document.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ParsedFeed>;
}

pub struct HttpFetcher {
    client: Client,
    max_body_bytes: usize,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GatorError::Fetch(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_body_bytes: MAX_BODY_BYTES,
        })
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Parse a feed document into channel and item records.
    pub fn parse(bytes: &[u8]) -> Result<ParsedFeed> {
        let parsed = parser::parse(bytes)
            .map_err(|e| GatorError::Fetch(format!("failed to parse feed: {}", e)))?;

        // feed_rs normalizes dates and drops the original <pubDate> text
        let raw_dates = match parsed.feed_type {
            FeedType::RSS0 | FeedType::RSS2 => {
                let dates = Self::extract_pub_dates_from_xml(bytes);
                if dates.len() == parsed.entries.len() {
                    Some(dates)
                } else {
                    warn!(
                        "Found {} <item> blocks for {} entries, using parsed dates",
                        dates.len(),
                        parsed.entries.len()
                    );
                    None
                }
            }
            _ => None,
        };

        let title = parsed
            .title
            .map(|t| t.content)
            .unwrap_or_default();

        let items = parsed
            .entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                let link = entry
                    .links
                    .first()
                    .map(|l| l.href.clone())
                    .unwrap_or_default();

                let pub_date = match &raw_dates {
                    Some(dates) => dates.get(index).cloned().flatten(),
                    None => entry
                        .published
                        .or(entry.updated)
                        .map(|dt| dt.format(PUB_DATE_FORMAT).to_string()),
                }
                .unwrap_or_default();

                ParsedItem {
                    title: entry.title.map(|t| t.content).unwrap_or_default(),
                    description: entry
                        .summary
                        .map(|s| s.content)
                        .filter(|s| !s.trim().is_empty()),
                    link,
                    pub_date,
                }
            })
            .collect();

        Ok(ParsedFeed { title, items })
    }

    /// Raw <pubDate> text of each RSS <item>, in document order.
    pub fn extract_pub_dates_from_xml(xml_bytes: &[u8]) -> Vec<Option<String>> {
        let xml_str = match std::str::from_utf8(xml_bytes) {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };

        Self::item_blocks(xml_str)
            .into_iter()
            .map(|item| Self::extract_xml_element(item, "pubDate"))
            .collect()
    }

    /// Contents of every `<item>` element, attributes and all.
    fn item_blocks(xml: &str) -> Vec<&str> {
        let mut blocks = Vec::new();
        let mut rest = xml;

        while let Some(pos) = rest.find("<item") {
            let after = &rest[pos + "<item".len()..];
            match after.chars().next() {
                Some(c) if c == '>' || c.is_whitespace() => {
                    let end = after.find("</item>").unwrap_or(after.len());
                    blocks.push(&after[..end]);
                    rest = &after[end..];
                }
                Some('/') if after.starts_with("/>") => {
                    blocks.push("");
                    rest = after;
                }
                // <items>, <itemCount> and friends
                _ => rest = after,
            }
        }

        blocks
    }

    pub fn extract_xml_element(xml: &str, tag: &str) -> Option<String> {
        let start_tag = format!("<{}>", tag);
        let end_tag = format!("</{}>", tag);

        let start = xml.find(&start_tag)? + start_tag.len();
        let end = xml[start..].find(&end_tag)? + start;

        Some(xml[start..end].trim().to_string())
    }
}

#[async_trait]
impl FeedSource for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<ParsedFeed> {
        debug!("Fetching feed: {}", url);

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GatorError::Fetch(format!("request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(GatorError::Fetch(format!(
                "{} returned HTTP {}",
                url,
                response.status()
            )));
        }

        let too_large = || {
            GatorError::Fetch(format!(
                "{} is larger than {} bytes",
                url, self.max_body_bytes
            ))
        };

        if let Some(length) = response.content_length() {
            if length > self.max_body_bytes as u64 {
                return Err(too_large());
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| GatorError::Fetch(format!("failed to read {}: {}", url, e)))?
        {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        Self::parse(&body)
    }
}
