//! USGS earthquake API client.
//!
//! Provides blocking HTTP access to the FDSN event query service.
//! Uses reqwest with rustls for TLS.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::blocking::Client;
use tracing::{debug, instrument, warn};

use crate::errors::QuakeError;
use crate::models::FeatureCollection;

/// Default request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// User agent string for API requests.
const USER_AGENT: &str = concat!("quakescope/", env!("CARGO_PKG_VERSION"));

/// USGS base URL for the FDSN event service.
const USGS_BASE_URL: &str = "https://earthquake.usgs.gov";

/// Time span loaded by a full fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    #[default]
    Day,
    Week,
    Month,
    /// Everything the service returns by default (its window is 30 days)
    All,
}

impl TimeRange {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::All => "all",
        }
    }

    /// How far back the window starts.
    #[must_use]
    pub fn horizon(self) -> chrono::Duration {
        match self {
            Self::Day => chrono::Duration::days(1),
            Self::Week => chrono::Duration::days(7),
            Self::Month | Self::All => chrono::Duration::days(30),
        }
    }
}

impl std::str::FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "all" => Ok(Self::All),
            _ => Err(format!("unknown time range: {s} (expected: day, week, month, all)")),
        }
    }
}

/// Parameters of one event query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedQuery {
    pub start: DateTime<Utc>,
    pub min_magnitude: f64,
}

impl FeedQuery {
    /// Query-string pairs, always ordered by ascending time.
    #[must_use]
    pub fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("format", "geojson".to_string()),
            ("starttime", self.start.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ("minmagnitude", self.min_magnitude.to_string()),
            ("orderby", "time-asc".to_string()),
        ]
    }
}

/// Anything that can answer an event query.
pub trait FeedSource: Send + Sync {
    /// Run `query` and return the matching events.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    fn query(&self, query: &FeedQuery) -> Result<FeatureCollection, QuakeError>;
}

/// Client for USGS earthquake API.
pub struct UsgsClient {
    client: Client,
    base_url: String,
}

impl UsgsClient {
    /// Create a new USGS client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new() -> Result<Self, QuakeError> {
        Self::with_base_url(USGS_BASE_URL)
    }

    /// Create a client against another FDSN-compatible host.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn with_base_url(base_url: &str) -> Result<Self, QuakeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn query_url(&self) -> String {
        format!("{}/fdsnws/event/1/query", self.base_url)
    }
}

impl FeedSource for UsgsClient {
    #[instrument(skip(self), fields(start = %query.start, min_mag = query.min_magnitude))]
    fn query(&self, query: &FeedQuery) -> Result<FeatureCollection, QuakeError> {
        let url = self.query_url();
        debug!("querying {}", url);

        let response = self.client.get(&url).query(&query.params()).send()?;

        // Check status before parsing
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(QuakeError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let mut feed: FeatureCollection = response.json()?;
        feed.validate()?;

        // Without an id an event cannot be deduplicated
        feed.features.retain(|f| match f.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!("dropping event: {}", e);
                false
            }
        });

        debug!(
            "fetched {} events ({} of {} reported, api {})",
            feed.features.len(),
            feed.metadata.title,
            feed.metadata.count,
            feed.metadata.api
        );
        Ok(feed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_time_range_round_trip() {
        for range in [TimeRange::Day, TimeRange::Week, TimeRange::Month, TimeRange::All] {
            let parsed: TimeRange = range.as_str().parse().expect("failed to parse");
            assert_eq!(parsed, range);
        }
        assert!("year".parse::<TimeRange>().is_err());
    }

    #[test]
    fn test_horizons() {
        assert_eq!(TimeRange::Day.horizon(), chrono::Duration::days(1));
        assert_eq!(TimeRange::Week.horizon(), chrono::Duration::days(7));
        assert_eq!(TimeRange::Month.horizon(), chrono::Duration::days(30));
    }

    #[test]
    fn test_query_params() {
        let query = FeedQuery {
            start: Utc
                .with_ymd_and_hms(2024, 5, 1, 6, 30, 0)
                .single()
                .expect("valid date"),
            min_magnitude: 2.5,
        };
        let params = query.params();
        assert!(params.contains(&("starttime", "2024-05-01T06:30:00.000Z".to_string())));
        assert!(params.contains(&("minmagnitude", "2.5".to_string())));
        assert!(params.contains(&("orderby", "time-asc".to_string())));
        assert!(params.contains(&("format", "geojson".to_string())));
    }

    #[test]
    fn test_query_url() {
        let client = UsgsClient::with_base_url("http://localhost:9000/").expect("client");
        assert_eq!(client.query_url(), "http://localhost:9000/fdsnws/event/1/query");
    }
}
