//! The reconciled display set behind the map widget.
//!
//! Two writers feed this store: the position tracker owns the SELF marker and
//! its highlight circle, the search controller owns the RESULT markers. Each
//! writer replaces only its own layer, so the two never overwrite each other.
//! Readers only ever see an immutable [`MapSnapshot`].

use geojson::{feature::Id, Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{trace, warn};

use crate::geo::Geocoordinate;
use crate::{SELF_CIRCLE_ID, SELF_MARKER_ID};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    SelfLocation,
    SearchResult,
}

impl MarkerKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SelfLocation => "self",
            Self::SearchResult => "result",
        }
    }
}

/// Reference to an icon the shell renders. `anchor` is the point of the
/// image placed on the coordinate, in fractions of its size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IconRef {
    pub name: String,
    pub size_px: u32,
    pub anchor: (f64, f64),
}

impl IconRef {
    /// The circular dot used for the user's own position.
    #[must_use]
    pub fn self_dot() -> Self {
        Self {
            name: "self_dot".to_string(),
            size_px: 32,
            anchor: (0.5, 0.5),
        }
    }
}

/// Colors are packed `0xRRGGBBAA`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircleStyle {
    pub fill_rgba: u32,
    pub stroke_rgba: u32,
    pub stroke_width_px: f64,
}

impl Default for CircleStyle {
    fn default() -> Self {
        Self {
            fill_rgba: 0x2196_F333,
            stroke_rgba: 0x2196_F3FF,
            stroke_width_px: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapMarker {
    pub id: String,
    pub kind: MarkerKind,
    pub location: Geocoordinate,
    pub z_order: i32,
    pub title: String,
    pub subtitle: String,
    pub icon: Option<IconRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapCircle {
    pub id: String,
    pub center: Geocoordinate,
    pub radius_m: f64,
    pub style: CircleStyle,
}

/// Immutable view of the store, in render order: SELF first, then results
/// sorted by id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MapSnapshot {
    pub markers: Vec<MapMarker>,
    pub circles: Vec<MapCircle>,
}

impl MapSnapshot {
    #[must_use]
    pub fn self_marker(&self) -> Option<&MapMarker> {
        self.markers
            .iter()
            .find(|m| m.kind == MarkerKind::SelfLocation)
    }

    pub fn result_markers(&self) -> impl Iterator<Item = &MapMarker> {
        self.markers
            .iter()
            .filter(|m| m.kind == MarkerKind::SearchResult)
    }

    #[must_use]
    pub fn marker(&self, id: &str) -> Option<&MapMarker> {
        self.markers.iter().find(|m| m.id == id)
    }

    #[must_use]
    pub fn to_geojson(&self) -> FeatureCollection {
        let markers = self.markers.iter().map(|marker| {
            let mut properties = JsonObject::new();
            properties.insert("kind".into(), marker.kind.as_str().into());
            properties.insert("title".into(), marker.title.clone().into());
            properties.insert("subtitle".into(), marker.subtitle.clone().into());
            properties.insert("z_order".into(), marker.z_order.into());
            point_feature(&marker.id, marker.location, properties)
        });
        let circles = self.circles.iter().map(|circle| {
            let mut properties = JsonObject::new();
            properties.insert("kind".into(), "circle".into());
            properties.insert("radius_m".into(), circle.radius_m.into());
            point_feature(&circle.id, circle.center, properties)
        });

        FeatureCollection {
            bbox: None,
            features: markers.chain(circles).collect(),
            foreign_members: None,
        }
    }
}

fn point_feature(id: &str, at: Geocoordinate, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Point(vec![at.lng(), at.lat()]))),
        id: Some(Id::String(id.to_string())),
        properties: Some(properties),
        foreign_members: None,
    }
}

#[derive(Debug, Default)]
pub struct MapStateStore {
    self_marker: Option<MapMarker>,
    self_circle: Option<MapCircle>,
    results: BTreeMap<String, MapMarker>,
    revision: u64,
}

impl MapStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bumped on every call that changes the snapshot.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Replaces the SELF layer. Results are untouched. Returns whether the
    /// snapshot changed.
    pub fn upsert_self(&mut self, mut marker: MapMarker, mut circle: MapCircle) -> bool {
        marker.id = SELF_MARKER_ID.to_string();
        marker.kind = MarkerKind::SelfLocation;
        circle.id = SELF_CIRCLE_ID.to_string();

        if self.self_marker.as_ref() == Some(&marker) && self.self_circle.as_ref() == Some(&circle)
        {
            return false;
        }
        self.self_marker = Some(marker);
        self.self_circle = Some(circle);
        self.revision += 1;
        trace!(revision = self.revision, "self layer updated");
        true
    }

    /// Replaces the whole RESULT layer. SELF is untouched.
    ///
    /// Markers sharing an id collapse to the last one. A marker using the
    /// reserved SELF id is dropped. Returns whether the snapshot changed.
    pub fn replace_results(&mut self, markers: impl IntoIterator<Item = MapMarker>) -> bool {
        let mut results = BTreeMap::new();
        for mut marker in markers {
            if marker.id == SELF_MARKER_ID {
                warn!(title = %marker.title, "result marker uses the reserved self id, dropping");
                continue;
            }
            marker.kind = MarkerKind::SearchResult;
            results.insert(marker.id.clone(), marker);
        }

        if results == self.results {
            return false;
        }
        self.results = results;
        self.revision += 1;
        trace!(
            revision = self.revision,
            count = self.results.len(),
            "result layer replaced"
        );
        true
    }

    #[must_use]
    pub fn result_count(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn self_location(&self) -> Option<Geocoordinate> {
        self.self_marker.as_ref().map(|m| m.location)
    }

    #[must_use]
    pub fn snapshot(&self) -> MapSnapshot {
        MapSnapshot {
            markers: self
                .self_marker
                .iter()
                .chain(self.results.values())
                .cloned()
                .collect(),
            circles: self.self_circle.iter().cloned().collect(),
        }
    }
}
