//! KML to GeoJSON conversion.
//!
//! `build` turns the placemarks of a parsed feed into a `FeatureCollection`
//! whose `properties` carry the icon and line style hints the map renderer
//! reads. Output order follows document order.

use quick_xml::escape::escape;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::FeedConfig;
use crate::kml::{KmlDocument, Placemark, PlacemarkGeometry};

const POINT_ICON_CLASS: &str = "inmap-point";
const POINT_ICON_SIZE: [u32; 2] = [7, 7];
const POINT_ICON_HTML: &str = "<span></span>";
const GPS_FIX_CLASS: &str = " inmap-icon-gps";
const QUICK_TEXT_HTML: &str = "Q";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct Feature {
    pub properties: Properties,
    pub geometry: Geometry,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Properties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<Icon>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub style: Style,
}

/// Marker hint consumed by the renderer as a div icon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Icon {
    #[serde(rename = "className")]
    pub class_name: String,
    #[serde(rename = "iconSize")]
    pub icon_size: [u32; 2],
    pub html: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Style {
    pub color: String,
}

/// Coordinates are kept as the feed's own numeric strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Vec<String>),
    LineString(Vec<Vec<String>>),
}

impl Default for Icon {
    fn default() -> Self {
        Self {
            class_name: POINT_ICON_CLASS.to_string(),
            icon_size: POINT_ICON_SIZE,
            html: POINT_ICON_HTML.to_string(),
        }
    }
}

impl FeatureCollection {
    pub fn empty() -> Self {
        Self { features: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for FeatureCollection {
    fn default() -> Self {
        Self::empty()
    }
}

// ============================================================================
// Event classification
// ============================================================================

/// Device events reported in the `Event` ExtendedData field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    TrackingOn,
    TrackingOff,
    TrackingInterval,
    TrackingMessage,
    SharedMapMessage,
    QuickText,
}

/// Replacement for the default point markup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IconHtml {
    /// Message icon markup from configuration
    MessageIcon,
    Literal(&'static str),
}

/// Change applied to the default point icon for an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IconDelta {
    class_suffix: &'static str,
    html: IconHtml,
}

/// Event label (trailing periods removed) to kind and icon change.
const EVENT_TABLE: &[(&str, EventKind, Option<IconDelta>)] = &[
    ("Tracking turned on from device", EventKind::TrackingOn, None),
    ("Tracking turned off from device", EventKind::TrackingOff, None),
    ("Tracking interval received", EventKind::TrackingInterval, None),
    ("Tracking message received", EventKind::TrackingMessage, None),
    (
        "Msg to shared map received",
        EventKind::SharedMapMessage,
        Some(IconDelta {
            class_suffix: " inmap-icon-message inmap-icon-custom",
            html: IconHtml::MessageIcon,
        }),
    ),
    (
        "Quick Text to MapShare received",
        EventKind::QuickText,
        Some(IconDelta {
            class_suffix: " inmap-icon-message inmap-icon-quick",
            html: IconHtml::Literal(QUICK_TEXT_HTML),
        }),
    ),
];

impl EventKind {
    /// Classify a raw event label, ignoring leading/trailing periods.
    /// Unknown labels return `None`.
    pub fn classify(label: &str) -> Option<Self> {
        Self::entry(label).map(|(_, kind, _)| *kind)
    }

    fn entry(label: &str) -> Option<&'static (&'static str, EventKind, Option<IconDelta>)> {
        let label = label.trim_matches('.');
        EVENT_TABLE.iter().find(|(name, _, _)| *name == label)
    }
}

fn apply_event(icon: &mut Icon, label: &str, config: &FeedConfig) {
    let Some((_, kind, delta)) = EventKind::entry(label) else {
        debug!(event = label, "Unclassified event, default icon kept");
        return;
    };
    let Some(delta) = delta else {
        return;
    };

    debug!(event = ?kind, "Styling event icon");
    icon.class_name.push_str(delta.class_suffix);
    icon.html = match delta.html {
        IconHtml::MessageIcon => config.message_icon.clone(),
        IconHtml::Literal(html) => html.to_string(),
    };
}

// ============================================================================
// Building
// ============================================================================

/// Render extracted key/value pairs as a two-column HTML table.
pub fn description_table(rows: &[(String, String)]) -> String {
    let mut html = String::from("<table>");
    for (key, value) in rows {
        html.push_str("<tr><th>");
        html.push_str(&escape(key.as_str()));
        html.push_str("</th><td>");
        html.push_str(&escape(value.as_str()));
        html.push_str("</td></tr>");
    }
    html.push_str("</table>");
    html
}

/// Split a coordinate tuple, accepting only 2 or 3 components.
fn parse_tuple(text: &str) -> Option<Vec<String>> {
    let parts: Vec<String> = text.split(',').map(|p| p.trim().to_string()).collect();
    (2..=3).contains(&parts.len()).then_some(parts)
}

fn parse_line(text: &str) -> Vec<Vec<String>> {
    // `lines()` handles LF and CRLF; split the remaining bare CRs too
    text.lines()
        .flat_map(|line| line.split('\r'))
        .filter_map(parse_tuple)
        .collect()
}

/// Convert one placemark; `index` is its position in the document.
fn build_feature(placemark: &Placemark, index: usize, config: &FeedConfig) -> Option<Feature> {
    let mut properties = Properties::default();

    let mut extracted: Vec<(String, String)> = Vec::new();
    for data in placemark.extended_data() {
        if !config.includes(&data.name) {
            continue;
        }
        if data.name == "Id" {
            properties.id = Some(data.value.clone());
        }
        // Repeated keys keep their first position and take the latest value
        match extracted.iter_mut().find(|(k, _)| *k == data.name) {
            Some(entry) => entry.1 = data.value.clone(),
            None => extracted.push((data.name.clone(), data.value.clone())),
        }
    }
    if !extracted.is_empty() {
        properties.description = Some(description_table(&extracted));
    }
    let lookup = |key: &str| {
        extracted
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    };

    let geometry = match placemark.geometry()? {
        PlacemarkGeometry::Point(text) => {
            let Some(coordinates) = parse_tuple(text) else {
                debug!(index = index, coordinates = text, "Dropping point with bad coordinates");
                return None;
            };

            let mut icon = Icon::default();
            if lookup("Valid GPS Fix") == Some("True") {
                icon.class_name.push_str(GPS_FIX_CLASS);
            }
            if let Some(event) = lookup("Event") {
                apply_event(&mut icon, event, config);
            }
            properties.icon = Some(icon);

            if let Some(when) = placemark.when() {
                properties.title = Some(
                    when.replace('T', " ")
                        .replace('Z', &format!(" (UTC) [#{}]", index)),
                );
            }

            Geometry::Point(coordinates)
        }
        PlacemarkGeometry::LineString(text) => {
            let rows = parse_line(text);
            if rows.is_empty() {
                debug!(index = index, "Dropping line with no usable coordinates");
                return None;
            }
            Geometry::LineString(rows)
        }
    };

    properties.style.color = config.tracking_colour.clone();

    Some(Feature {
        properties,
        geometry,
    })
}

/// Build the collection for every usable placemark in `doc`.
pub fn build(doc: &KmlDocument, config: &FeedConfig) -> FeatureCollection {
    let placemarks = doc.placemarks();
    let features: Vec<Feature> = placemarks
        .iter()
        .enumerate()
        .filter_map(|(i, placemark)| build_feature(placemark, i, config))
        .collect();

    debug!(
        placemarks = placemarks.len(),
        features = features.len(),
        "Built feature collection"
    );
    FeatureCollection { features }
}

// ============================================================================
// Tests
// ============================================================================
