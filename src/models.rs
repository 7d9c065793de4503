//! Data models for USGS earthquake API responses.
//!
//! These structures match the GeoJSON format returned by the FDSN event
//! service (`format=geojson`). Most properties are optional there, so the
//! decoder is lenient and only the event id is required.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::QuakeError;

/// Top-level GeoJSON response from the event service.
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureCollection {
    /// Always "FeatureCollection"
    #[serde(rename = "type")]
    pub type_: String,

    /// Feed metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// Earthquake events
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Validate the response structure.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a feature collection.
    pub fn validate(&self) -> Result<(), QuakeError> {
        if self.type_ != "FeatureCollection" {
            return Err(QuakeError::InvalidResponse(format!(
                "expected type 'FeatureCollection', got '{}'",
                self.type_
            )));
        }
        Ok(())
    }
}

/// Metadata about the feed response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Metadata {
    /// Human-readable title
    pub title: String,

    /// API version string
    pub api: String,

    /// Number of events in response
    pub count: usize,
}

/// A single earthquake event.
#[derive(Debug, Clone, Deserialize)]
pub struct Feature {
    /// Unique event ID (stable dedupe key)
    pub id: String,

    /// Geographic location
    #[serde(default, deserialize_with = "null_as_default")]
    pub geometry: Geometry,

    /// Event properties
    pub properties: Properties,
}

impl Feature {
    /// Validate the event structure.
    ///
    /// # Errors
    ///
    /// Returns an error if the event has no identity.
    pub fn validate(&self) -> Result<(), QuakeError> {
        if self.id.trim().is_empty() {
            return Err(QuakeError::Validation("empty event ID".into()));
        }
        Ok(())
    }

    /// Get the event time as a `DateTime<Utc>`.
    #[must_use]
    pub fn time(&self) -> Option<DateTime<Utc>> {
        self.properties
            .time
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }

    /// Event time in milliseconds since the epoch. Events without a time
    /// sort as the epoch.
    #[must_use]
    pub fn time_ms(&self) -> i64 {
        self.properties.time.unwrap_or(0)
    }

    /// Magnitude, if the feed reported one.
    #[must_use]
    pub fn magnitude(&self) -> Option<f64> {
        self.properties.mag
    }

    /// Get longitude (degrees).
    #[must_use]
    pub fn longitude(&self) -> f64 {
        self.geometry.coordinates.first().copied().unwrap_or(0.0)
    }

    /// Get latitude (degrees).
    #[must_use]
    pub fn latitude(&self) -> f64 {
        self.geometry.coordinates.get(1).copied().unwrap_or(0.0)
    }

    /// Get depth in kilometers (positive down).
    #[must_use]
    pub fn depth_km(&self) -> f64 {
        self.geometry.coordinates.get(2).copied().unwrap_or(0.0)
    }

    /// Place description, or `"Unknown"` when the feed left it blank.
    #[must_use]
    pub fn place(&self) -> &str {
        match self.properties.place.as_deref() {
            Some(p) if !p.trim().is_empty() => p,
            _ => "Unknown",
        }
    }

    /// Parsed PAGER alert level.
    #[must_use]
    pub fn alert(&self) -> Option<AlertLevel> {
        self.properties.alert.as_deref().and_then(|a| a.parse().ok())
    }

    /// Whether the event carries the tsunami flag.
    #[must_use]
    pub fn tsunami(&self) -> bool {
        self.properties.tsunami == Some(1)
    }
}

/// Treat an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Geographic geometry for an event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Geometry {
    /// Coordinates: [longitude, latitude, depth_km]
    #[serde(default)]
    pub coordinates: Vec<f64>,
}

/// Event properties from the event service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Properties {
    /// Magnitude value
    pub mag: Option<f64>,

    /// Magnitude type (mb, Ml, Mw, etc.)
    #[serde(rename = "magType")]
    pub mag_type: Option<String>,

    /// Human-readable place description
    pub place: Option<String>,

    /// Event time (ms since epoch)
    pub time: Option<i64>,

    /// Alert level: null, "green", "yellow", "orange", "red"
    pub alert: Option<String>,

    /// Tsunami flag: 0 or 1
    pub tsunami: Option<i32>,

    /// Event page URL
    pub url: Option<String>,

    /// Detail GeoJSON URL
    pub detail: Option<String>,

    /// Number of "Did You Feel It?" reports
    pub felt: Option<i32>,

    /// Community Decimal Intensity
    pub cdi: Option<f64>,

    /// Modified Mercalli Intensity
    pub mmi: Option<f64>,
}

/// PAGER alert level attached to significant events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Green,
    Yellow,
    Orange,
    Red,
}

impl AlertLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Orange => "orange",
            Self::Red => "red",
        }
    }
}

impl std::str::FromStr for AlertLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "green" => Ok(Self::Green),
            "yellow" => Ok(Self::Yellow),
            "orange" => Ok(Self::Orange),
            "red" => Ok(Self::Red),
            _ => Err(format!("unknown alert level: {s}")),
        }
    }
}

/// Simplified event for output.
///
/// This is the normalized structure we emit in JSON/NDJSON output.
#[derive(Debug, Clone, Serialize)]
pub struct OutputEvent {
    pub id: String,
    pub time: String,
    pub magnitude: Option<f64>,
    pub tier: &'static str,
    pub depth_km: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub place: String,
    pub region: String,
    pub felt: Option<i32>,
    pub mmi: Option<f64>,
    pub alert: Option<AlertLevel>,
    pub tsunami: bool,
    pub url: Option<String>,
}

impl From<&Feature> for OutputEvent {
    fn from(f: &Feature) -> Self {
        Self {
            id: f.id.clone(),
            time: f
                .time()
                .map_or_else(|| "unknown".into(), |t| t.to_rfc3339()),
            magnitude: f.magnitude(),
            tier: crate::classify::Tier::of(f.magnitude()).as_str(),
            depth_km: f.depth_km(),
            latitude: f.latitude(),
            longitude: f.longitude(),
            place: f.place().to_string(),
            region: crate::classify::region_of(f.properties.place.as_deref()),
            felt: f.properties.felt,
            mmi: f.properties.mmi,
            alert: f.alert(),
            tsunami: f.tsunami(),
            url: f.properties.url.clone(),
        }
    }
}

/// Build an event by hand. Used by tests across the crate.
#[cfg(test)]
#[must_use]
pub fn test_event(id: &str, mag: f64, time_ms: i64, place: &str) -> Feature {
    Feature {
        id: id.to_string(),
        geometry: Geometry {
            coordinates: vec![-122.4, 37.8, 10.0],
        },
        properties: Properties {
            mag: Some(mag),
            place: Some(place.to_string()),
            time: Some(time_ms),
            ..Properties::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "metadata": {"generated": 1700000000000, "url": "https://example", "title": "USGS Earthquakes",
                     "status": 200, "api": "1.14.1", "count": 2},
        "features": [
            {"type": "Feature", "id": "us7000abcd",
             "geometry": {"type": "Point", "coordinates": [142.1, 38.3, 24.5]},
             "properties": {"mag": 6.4, "place": "80 km E of Namie, Japan", "time": 1699990000000,
                            "updated": 1699990500000, "alert": "yellow", "tsunami": 1, "felt": 120,
                            "mmi": 5.8, "url": "https://earthquake.usgs.gov/earthquakes/eventpage/us7000abcd"}},
            {"type": "Feature", "id": "ci40000001",
             "geometry": {"type": "Point", "coordinates": [-117.5, 35.7, 8.0]},
             "properties": {"mag": null, "place": null, "time": 1699995000000}}
        ]
    }"#;

    #[test]
    fn test_parse_sample_feed() {
        let feed: FeatureCollection =
            serde_json::from_str(SAMPLE).expect("failed to parse sample feed");

        feed.validate().expect("invalid feed");
        assert_eq!(feed.metadata.count, 2);
        assert_eq!(feed.features.len(), 2);

        let first = &feed.features[0];
        assert_eq!(first.magnitude(), Some(6.4));
        assert!((first.depth_km() - 24.5).abs() < f64::EPSILON);
        assert_eq!(first.alert(), Some(AlertLevel::Yellow));
        assert!(first.tsunami());

        let second = &feed.features[1];
        assert_eq!(second.magnitude(), None);
        assert_eq!(second.place(), "Unknown");
        assert!(!second.tsunami());
    }

    #[test]
    fn test_malformed_record_does_not_fail_feed() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                {"id": "a", "geometry": null, "properties": {"mag": 4.1, "time": null}},
                {"id": "b", "properties": {"mag": 3.0}},
                {"id": "c", "geometry": {"coordinates": [10.0, 20.0, 5.0]},
                 "properties": {"mag": 2.7, "time": 1699995000000}}
            ]
        }"#;
        let feed: FeatureCollection = serde_json::from_str(json).expect("lenient parse");
        assert_eq!(feed.features.len(), 3);

        let a = &feed.features[0];
        assert_eq!(a.time(), None);
        assert_eq!(a.time_ms(), 0);
        assert!(a.latitude().abs() < f64::EPSILON);
        assert_eq!(feed.features[1].time(), None);
        assert!((feed.features[2].latitude() - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rejects_wrong_type() {
        let feed: FeatureCollection =
            serde_json::from_str(r#"{"type": "Feature"}"#).expect("parse");
        assert!(feed.validate().is_err());
    }

    #[test]
    fn test_empty_id_invalid() {
        let event = test_event("  ", 3.0, 0, "x");
        assert!(event.validate().is_err());
    }

    #[test]
    fn test_output_event_region() {
        let event = test_event("a", 5.5, 0, "12 km SSW of Ridgecrest, CA");
        let out = OutputEvent::from(&event);
        assert_eq!(out.region, "Ridgecrest, CA");
        assert_eq!(out.tier, "moderate");
    }
}
