use geo::Polygon;

use crate::geometry::Crs;

/// Attribute table row of a feature
pub type Properties = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct Feature<G> {
    pub properties: Properties,
    pub geometry: G,
}

impl<G> Feature<G> {
    pub fn new(properties: Properties, geometry: G) -> Self {
        Self {
            properties,
            geometry,
        }
    }
}

/// Ordered features sharing one coordinate reference system
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection<G> {
    pub features: Vec<Feature<G>>,
    pub crs: Option<Crs>,
}

impl<G> FeatureCollection<G> {
    pub fn new(features: Vec<Feature<G>>, crs: Option<Crs>) -> Self {
        Self { features, crs }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature<G>> {
        self.features.iter()
    }
}

/// Flat output of the conversion
pub type PolygonCollection = FeatureCollection<Polygon<f64>>;

impl PolygonCollection {
    /// Heights of all features in order, skipping any without a numeric `height`
    pub fn heights(&self) -> Vec<f64> {
        self.features
            .iter()
            .filter_map(|f| f.properties.get("height").and_then(|h| h.as_f64()))
            .collect()
    }
}
