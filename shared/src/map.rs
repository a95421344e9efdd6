//! Marker placement for the map widget and GeoJSON export.

use geojson::{feature::Id, Feature, FeatureCollection, Geometry, JsonObject, Value};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::model::{Incident, IncidentId, IncidentStatus, Severity};
use crate::{DEFAULT_MAP_CENTER, DEFAULT_MAP_ZOOM, PLACEHOLDER_JITTER_DEG};

pub const MAPS_SCRIPT_BASE: &str = "https://maps.googleapis.com/maps/api/js";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapMarker {
    pub incident_id: IncidentId,
    pub lat: f64,
    pub lng: f64,
    /// Position was made up because the report carried no coordinates.
    pub is_placeholder: bool,
    pub color: String,
    pub title: String,
    pub location: String,
    pub severity: Severity,
    pub status: IncidentStatus,
    pub casualty_count: u32,
    pub responder_count: u32,
}

#[must_use]
pub const fn marker_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Low => "green-500",
        Severity::Medium => "yellow-500",
        Severity::High => "red-500",
        Severity::Critical => "red-700",
    }
}

/// A point uniformly within ±`PLACEHOLDER_JITTER_DEG` of the default centre.
pub fn placeholder_position(rng: &mut impl Rng) -> (f64, f64) {
    let (lat, lng) = DEFAULT_MAP_CENTER;
    (
        lat + rng.gen_range(-PLACEHOLDER_JITTER_DEG..=PLACEHOLDER_JITTER_DEG),
        lng + rng.gen_range(-PLACEHOLDER_JITTER_DEG..=PLACEHOLDER_JITTER_DEG),
    )
}

/// One marker per unresolved incident, in input order.
pub fn build_markers<'a>(
    incidents: impl IntoIterator<Item = &'a Incident>,
    rng: &mut impl Rng,
) -> Vec<MapMarker> {
    incidents
        .into_iter()
        .filter(|incident| incident.status != IncidentStatus::Resolved)
        .map(|incident| {
            let (lat, lng, is_placeholder) = match incident.coordinates() {
                Some((lat, lng)) => (lat, lng, false),
                None => {
                    let (lat, lng) = placeholder_position(rng);
                    (lat, lng, true)
                }
            };
            MapMarker {
                incident_id: incident.id.clone(),
                lat,
                lng,
                is_placeholder,
                color: marker_color(incident.severity).to_string(),
                title: incident.title.clone(),
                location: incident.location_label(),
                severity: incident.severity,
                status: incident.status,
                casualty_count: incident.casualty_count.unwrap_or(0),
                responder_count: incident.responder_count.unwrap_or(0),
            }
        })
        .collect()
}

/// Keeps positions of markers that already exist so placeholders do not
/// jump around on every refresh.
pub fn refresh_markers(previous: &[MapMarker], incidents: &[Incident], rng: &mut impl Rng) -> Vec<MapMarker> {
    let mut markers = build_markers(incidents, rng);
    for marker in markers.iter_mut().filter(|m| m.is_placeholder) {
        if let Some(old) = previous
            .iter()
            .find(|old| old.is_placeholder && old.incident_id == marker.incident_id)
        {
            marker.lat = old.lat;
            marker.lng = old.lng;
        }
    }
    markers
}

#[must_use]
pub fn to_feature(marker: &MapMarker) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("title".into(), json!(marker.title));
    properties.insert("location".into(), json!(marker.location));
    properties.insert("severity".into(), json!(marker.severity.as_str()));
    properties.insert("status".into(), json!(marker.status.as_str()));
    properties.insert("color".into(), json!(marker.color));
    properties.insert("placeholder".into(), json!(marker.is_placeholder));
    properties.insert("casualties".into(), json!(marker.casualty_count));
    properties.insert("responders".into(), json!(marker.responder_count));

    Feature {
        bbox: None,
        // GeoJSON positions are [longitude, latitude]
        geometry: Some(Geometry::new(Value::Point(vec![marker.lng, marker.lat]))),
        id: Some(Id::String(marker.incident_id.to_string())),
        properties: Some(properties),
        foreign_members: None,
    }
}

#[must_use]
pub fn to_feature_collection(markers: &[MapMarker]) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: markers.iter().map(to_feature).collect(),
        foreign_members: None,
    }
}

#[must_use]
pub fn script_url(api_key: &str) -> String {
    let key: String = url::form_urlencoded::byte_serialize(api_key.as_bytes()).collect();
    format!("{MAPS_SCRIPT_BASE}?key={key}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MapAvailability {
    Available { script_url: String },
    Unavailable { reason: String },
}

impl MapAvailability {
    #[must_use]
    pub fn from_key(api_key: Option<&str>) -> Self {
        match api_key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(key) => Self::Available {
                script_url: script_url(key),
            },
            None => Self::Unavailable {
                reason: "Map integration requires an API key".to_string(),
            },
        }
    }

    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapViewport {
    pub center_lat: f64,
    pub center_lng: f64,
    pub zoom: u8,
}

impl Default for MapViewport {
    fn default() -> Self {
        Self {
            center_lat: DEFAULT_MAP_CENTER.0,
            center_lng: DEFAULT_MAP_CENTER.1,
            zoom: DEFAULT_MAP_ZOOM,
        }
    }
}
