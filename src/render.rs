//! View models for the dashboard page.
//!
//! Every call renders the full visible set: the page clears all markers or
//! globe entities before drawing a new [`View`]. Drawing itself is left to
//! the map/cluster and globe widgets in the browser.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::classify::Tier;
use crate::models::Feature;

/// Maximum number of entries in the sidebar list.
pub const LIST_LIMIT: usize = 50;

/// Map zoom used when flying to an event.
pub const FOCUS_ZOOM: u8 = 8;

const SECS_PER_MINUTE: i64 = 60;
const SECS_PER_HOUR: i64 = 3_600;
const SECS_PER_DAY: i64 = 86_400;
const SECS_PER_MONTH: i64 = 30 * SECS_PER_DAY;
const SECS_PER_YEAR: i64 = 365 * SECS_PER_DAY;

const EMPTY_MESSAGE: &str = "No earthquakes found.";

/// Active visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ViewMode {
    #[default]
    #[serde(rename = "2d")]
    Map2d,
    #[serde(rename = "3d")]
    Globe3d,
}

impl std::str::FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "2d" | "map" => Ok(Self::Map2d),
            "3d" | "globe" => Ok(Self::Globe3d),
            _ => Err(format!("unknown view mode: {s} (expected: 2d, 3d)")),
        }
    }
}

/// Settings handed to the marker-cluster widget.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ClusterConfig {
    pub max_cluster_radius: u32,
    pub disable_clustering_at_zoom: u8,
    /// Upper bound (exclusive) of the "small" size class
    pub small_below: usize,
    /// Upper bound (exclusive) of the "medium" size class
    pub medium_below: usize,
}

pub const CLUSTER_CONFIG: ClusterConfig = ClusterConfig {
    max_cluster_radius: 50,
    disable_clustering_at_zoom: 10,
    small_below: 10,
    medium_below: 100,
};

/// A 2D map marker.
#[derive(Debug, Clone, Serialize)]
pub struct Marker {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    pub color: &'static str,
    pub css_class: &'static str,
    pub popup_html: String,
}

/// A 3D globe point with a halo.
#[derive(Debug, Clone, Serialize)]
pub struct GlobeEntity {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    pub color: &'static str,
    pub point_px: f64,
    pub halo_radius_m: f64,
    pub description_html: String,
}

/// One row of the sidebar list.
#[derive(Debug, Clone, Serialize)]
pub struct ListItem {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    pub magnitude: String,
    pub color: &'static str,
    pub place: String,
    pub time_ago: String,
}

/// Everything the page needs to redraw.
#[derive(Debug, Clone, Serialize)]
pub struct View {
    pub mode: ViewMode,
    pub time_filtered: bool,
    pub visible_count: usize,
    pub markers: Vec<Marker>,
    pub entities: Vec<GlobeEntity>,
    pub list: Vec<ListItem>,
    /// Shown in place of the list (empty result, loading, fetch error)
    pub message: Option<String>,
    pub cluster: ClusterConfig,
    pub focus_zoom: u8,
}

impl View {
    /// A view with nothing drawn.
    fn empty(mode: ViewMode) -> Self {
        Self {
            mode,
            time_filtered: false,
            visible_count: 0,
            markers: Vec::new(),
            entities: Vec::new(),
            list: Vec::new(),
            message: None,
            cluster: CLUSTER_CONFIG,
            focus_zoom: FOCUS_ZOOM,
        }
    }
}

/// Render the visible events (oldest first) for the active view.
#[must_use]
pub fn render(events: &[Feature], mode: ViewMode, time_filtered: bool, now: DateTime<Utc>) -> View {
    let mut view = View {
        time_filtered,
        visible_count: events.len(),
        ..View::empty(mode)
    };

    if events.is_empty() {
        // During playback an empty frame is normal, not worth a message.
        if !time_filtered {
            view.message = Some(EMPTY_MESSAGE.to_string());
        }
        return view;
    }

    match mode {
        ViewMode::Map2d => view.markers = events.iter().map(marker).collect(),
        ViewMode::Globe3d => view.entities = events.iter().map(globe_entity).collect(),
    }

    view.list = events
        .iter()
        .rev()
        .take(LIST_LIMIT)
        .map(|e| list_item(e, now))
        .collect();

    view
}

fn marker(event: &Feature) -> Marker {
    let tier = Tier::of(event.magnitude());
    Marker {
        id: event.id.clone(),
        lat: event.latitude(),
        lon: event.longitude(),
        color: tier.color(),
        css_class: tier.css_class(),
        popup_html: popup_html(event),
    }
}

fn globe_entity(event: &Feature) -> GlobeEntity {
    let tier = Tier::of(event.magnitude());
    let mag = event.magnitude().filter(|m| m.is_finite()).unwrap_or(0.0).max(0.0);
    GlobeEntity {
        id: event.id.clone(),
        lat: event.latitude(),
        lon: event.longitude(),
        color: tier.color(),
        point_px: 4.0 + mag * 2.0,
        halo_radius_m: 20_000.0 * mag,
        description_html: popup_html(event),
    }
}

fn list_item(event: &Feature, now: DateTime<Utc>) -> ListItem {
    ListItem {
        id: event.id.clone(),
        lat: event.latitude(),
        lon: event.longitude(),
        magnitude: magnitude_label(event.magnitude()),
        color: Tier::of(event.magnitude()).color(),
        place: event.place().to_string(),
        time_ago: event
            .time()
            .map_or_else(|| "unknown".to_string(), |t| format_time_ago(t, now)),
    }
}

/// Magnitude with one decimal, `"?"` when missing.
#[must_use]
pub fn magnitude_label(mag: Option<f64>) -> String {
    mag.map_or_else(|| "?".into(), |m| format!("{m:.1}"))
}

/// Popup body shared by map markers and globe entities.
#[must_use]
pub fn popup_html(event: &Feature) -> String {
    let props = &event.properties;
    let color = Tier::of(event.magnitude()).color();
    let time = event
        .time()
        .map_or_else(|| "unknown".into(), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string());

    let mut html = format!(
        r#"<div class="custom-popup"><span class="place">{place}</span><span class="detail">Time: {time}</span><span class="detail">Depth: {depth} km</span>"#,
        place = escape_html(event.place()),
        depth = event.depth_km(),
    );

    if let Some(felt) = props.felt {
        let _ = write!(html, r#"<span class="detail">Felt: {felt}</span>"#);
    }
    if let Some(cdi) = props.cdi {
        let _ = write!(html, r#"<span class="detail">CDI: {cdi:.1}</span>"#);
    }
    if let Some(mmi) = props.mmi {
        let _ = write!(html, r#"<span class="detail">MMI: {mmi:.1}</span>"#);
    }
    if let Some(alert) = event.alert() {
        let _ = write!(
            html,
            r#"<span class="detail">Alert: {}</span>"#,
            alert.as_str().to_uppercase()
        );
    }
    if event.tsunami() {
        html.push_str(
            r#"<span class="detail" style="color: #ef4444; font-weight: bold;">Tsunami Warning</span>"#,
        );
    }

    let _ = write!(
        html,
        r#"<span class="mag" style="background-color: {color}">{mag}{mag_type}</span>"#,
        mag = magnitude_label(event.magnitude()),
        mag_type = props
            .mag_type
            .as_deref()
            .map_or_else(String::new, |t| format!(" {}", escape_html(t))),
    );
    if let Some(url) = props.url.as_deref().or(props.detail.as_deref()) {
        let _ = write!(
            html,
            r#"<a href="{}" target="_blank" rel="noopener" class="usgs-link">View on USGS</a>"#,
            escape_html(url)
        );
    }
    html.push_str("</div>");
    html
}

/// Relative age such as `"3 hours ago"`: the largest unit with a whole
/// value of at least one (365-day years, 30-day months).
#[must_use]
pub fn format_time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds().max(0);

    let units = [
        (SECS_PER_YEAR, "year"),
        (SECS_PER_MONTH, "month"),
        (SECS_PER_DAY, "day"),
        (SECS_PER_HOUR, "hour"),
        (SECS_PER_MINUTE, "minute"),
    ];

    for (size, name) in units {
        let value = seconds / size;
        if value >= 1 {
            return plural(value, name);
        }
    }
    plural(seconds, "second")
}

fn plural(value: i64, unit: &str) -> String {
    if value == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{value} {unit}s ago")
    }
}

/// Escape text for inclusion in HTML bodies and attribute values.
#[must_use]
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
