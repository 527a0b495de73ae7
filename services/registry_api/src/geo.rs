//! GeoJSON geometries and the in-process spatial predicates used by
//! radius and bounding-box search.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometres.
const EARTH_RADIUS_KM: f64 = 6371.0088;

/// GeoJSON geometry, `[longitude, latitude]` positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point([f64; 2]),
    Polygon(Vec<Vec<[f64; 2]>>),
}

/// Coordinates as submitted: a GeoJSON object from the REST API, or the
/// raw text an indexer copies out of the contract's `coordinates` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coordinates {
    Geometry(Geometry),
    Text(String),
}

impl Coordinates {
    pub fn resolve(self) -> Result<Option<Geometry>, String> {
        match self {
            Coordinates::Geometry(g) => {
                g.validate()?;
                Ok(Some(g))
            }
            Coordinates::Text(text) => Geometry::parse_text(&text),
        }
    }
}

impl Geometry {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Geometry::Point(p) => check_position(p),
            Geometry::Polygon(rings) => {
                if rings.is_empty() {
                    return Err("polygon has no rings".into());
                }
                for ring in rings {
                    if ring.len() < 4 {
                        return Err("polygon ring needs at least 4 positions".into());
                    }
                    if ring.first() != ring.last() {
                        return Err("polygon ring must be closed".into());
                    }
                    for p in ring {
                        check_position(p)?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Parse the free-form coordinate text stored on chain: either GeoJSON
    /// or a `"lat,lon"` pair. Empty input yields `None`.
    pub fn parse_text(text: &str) -> Result<Option<Geometry>, String> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let geometry = if text.starts_with('{') {
            serde_json::from_str::<Geometry>(text).map_err(|e| format!("invalid GeoJSON: {e}"))?
        } else {
            let (lat, lon) = text
                .split_once(',')
                .ok_or_else(|| format!("expected \"lat,lon\", got {text:?}"))?;
            let lat: f64 = lat.trim().parse().map_err(|_| format!("bad latitude {lat:?}"))?;
            let lon: f64 = lon.trim().parse().map_err(|_| format!("bad longitude {lon:?}"))?;
            Geometry::Point([lon, lat])
        };
        geometry.validate()?;
        Ok(Some(geometry))
    }

    /// `(lat, lon)` used for distance queries: the point itself, or the
    /// vertex centroid of a polygon's exterior ring.
    pub fn anchor(&self) -> Option<(f64, f64)> {
        match self {
            Geometry::Point([lon, lat]) => Some((*lat, *lon)),
            Geometry::Polygon(rings) => {
                let ring = rings.first()?;
                // closing position repeats the first one
                let open = if ring.len() > 1 && ring.first() == ring.last() {
                    &ring[..ring.len() - 1]
                } else {
                    &ring[..]
                };
                if open.is_empty() {
                    return None;
                }
                let n = open.len() as f64;
                let lon = open.iter().map(|p| p[0]).sum::<f64>() / n;
                let lat = open.iter().map(|p| p[1]).sum::<f64>() / n;
                Some((lat, lon))
            }
        }
    }

    fn envelope(&self) -> BoundingBox {
        let positions: Vec<[f64; 2]> = match self {
            Geometry::Point(p) => vec![*p],
            Geometry::Polygon(rings) => rings.iter().flatten().copied().collect(),
        };
        let mut bb = BoundingBox {
            north: f64::MIN,
            south: f64::MAX,
            east: f64::MIN,
            west: f64::MAX,
        };
        for [lon, lat] in positions {
            bb.north = bb.north.max(lat);
            bb.south = bb.south.min(lat);
            bb.east = bb.east.max(lon);
            bb.west = bb.west.min(lon);
        }
        bb
    }
}

fn check_position(p: &[f64; 2]) -> Result<(), String> {
    let [lon, lat] = *p;
    if !(-180.0..=180.0).contains(&lon) {
        return Err(format!("longitude {lon} out of range"));
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err(format!("latitude {lat} out of range"));
    }
    Ok(())
}

/// Great-circle distance between two `(lat, lon)` points.
pub fn haversine_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

pub fn check_point(lat: f64, lon: f64) -> Result<(), String> {
    check_position(&[lon, lat])
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    pub fn validate(&self) -> Result<(), String> {
        check_point(self.north, self.east)?;
        check_point(self.south, self.west)?;
        if self.south > self.north {
            return Err("south must not exceed north".into());
        }
        if self.west > self.east {
            return Err("west must not exceed east".into());
        }
        Ok(())
    }

    pub fn intersects(&self, g: &Geometry) -> bool {
        let other = g.envelope();
        other.south <= self.north
            && other.north >= self.south
            && other.west <= self.east
            && other.east >= self.west
    }
}
