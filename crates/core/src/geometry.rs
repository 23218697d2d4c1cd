#![forbid(unsafe_code)]

use crate::model::{GeometryKind, ParcelCategory};
use serde_json::{Value, json};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    Point(LatLng),
    LineString(Vec<LatLng>),
    /// Closed ring: the first vertex is repeated at the end.
    Polygon(Vec<LatLng>),
}

impl Geometry {
    /// Builds a geometry from the editors' `[lat, lng]` notation. The
    /// category decides the shape; malformed or too-short input yields `None`.
    pub fn from_fixture(category: ParcelCategory, value: &Value) -> Option<Self> {
        match category.geometry_kind() {
            GeometryKind::Point => lat_lng(value).map(Geometry::Point),
            GeometryKind::Line => {
                let points = lat_lng_list(value)?;
                if points.len() < 2 {
                    return None;
                }
                Some(Geometry::LineString(points))
            }
            GeometryKind::Polygon => {
                let mut ring = lat_lng_list(value)?;
                if ring.len() < 3 {
                    return None;
                }
                if ring.first() != ring.last() {
                    ring.push(ring[0]);
                }
                Some(Geometry::Polygon(ring))
            }
        }
    }

    pub fn to_geojson(&self) -> Value {
        match self {
            Geometry::Point(point) => json!({
                "type": "Point",
                "coordinates": [point.lng, point.lat],
            }),
            Geometry::LineString(points) => json!({
                "type": "LineString",
                "coordinates": points.iter().map(|p| json!([p.lng, p.lat])).collect::<Vec<_>>(),
            }),
            Geometry::Polygon(ring) => json!({
                "type": "Polygon",
                "coordinates": [ring.iter().map(|p| json!([p.lng, p.lat])).collect::<Vec<_>>()],
            }),
        }
    }

    pub fn from_geojson(value: &Value) -> Option<Self> {
        let coordinates = value.get("coordinates")?;
        match value.get("type")?.as_str()? {
            "Point" => lng_lat(coordinates).map(Geometry::Point),
            "LineString" => lng_lat_list(coordinates).map(Geometry::LineString),
            "Polygon" => {
                let outer = coordinates.as_array()?.first()?;
                lng_lat_list(outer).map(Geometry::Polygon)
            }
            _ => None,
        }
    }
}

fn pair(value: &Value) -> Option<(f64, f64)> {
    let items = value.as_array()?;
    if items.len() != 2 {
        return None;
    }
    Some((items[0].as_f64()?, items[1].as_f64()?))
}

fn lat_lng(value: &Value) -> Option<LatLng> {
    pair(value).map(|(lat, lng)| LatLng { lat, lng })
}

fn lng_lat(value: &Value) -> Option<LatLng> {
    pair(value).map(|(lng, lat)| LatLng { lat, lng })
}

fn lat_lng_list(value: &Value) -> Option<Vec<LatLng>> {
    value.as_array()?.iter().map(lat_lng).collect()
}

fn lng_lat_list(value: &Value) -> Option<Vec<LatLng>> {
    value.as_array()?.iter().map(lng_lat).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_categories_swap_to_lng_lat() {
        let geometry =
            Geometry::from_fixture(ParcelCategory::House, &json!([50.1, 19.9])).expect("point");
        assert_eq!(
            geometry.to_geojson(),
            json!({"type": "Point", "coordinates": [19.9, 50.1]})
        );
    }

    #[test]
    fn polygons_are_closed_and_need_three_vertices() {
        let ring = json!([[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        let Some(Geometry::Polygon(points)) =
            Geometry::from_fixture(ParcelCategory::Agricultural, &ring)
        else {
            panic!("expected polygon");
        };
        assert_eq!(points.len(), 4);
        assert_eq!(points.first(), points.last());

        let too_short = json!([[1.0, 2.0], [3.0, 4.0]]);
        assert_eq!(
            Geometry::from_fixture(ParcelCategory::Agricultural, &too_short),
            None
        );
    }

    #[test]
    fn roads_need_two_points() {
        assert_eq!(
            Geometry::from_fixture(ParcelCategory::Road, &json!([[1.0, 2.0]])),
            None
        );
        assert!(matches!(
            Geometry::from_fixture(ParcelCategory::River, &json!([[1.0, 2.0], [1.5, 2.5]])),
            Some(Geometry::LineString(_))
        ));
    }

    #[test]
    fn geojson_is_read_back() {
        let original = Geometry::from_fixture(
            ParcelCategory::Forest,
            &json!([[1.0, 2.0], [3.0, 4.0], [5.0, 6.0], [1.0, 2.0]]),
        )
        .expect("polygon");
        let back = Geometry::from_geojson(&original.to_geojson()).expect("parsed");
        assert_eq!(back, original);
    }
}
