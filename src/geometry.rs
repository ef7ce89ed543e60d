//! Geometry type/coord enums, header record, envelope record, and the consumer contract
//! (§3, §4.4 data model; "Design Notes" §9 callback-heavy dispatch).
//!
//! Grounded on `examples/georust-geozero/geozero/src/geometry_processor.rs` for the
//! trait-with-default-no-op-methods idiom, and `examples/georust-geozero/geozero/src/wkb/wkb_common.rs`
//! for the type/dimension modelling; the five-callback shape itself (narrower than the
//! teacher's twenty-some per-type `GeomProcessor` methods) comes from
//! `original_source/gpkg/geomio.c`'s `geom_consumer_t` / `geom_header_t`, since the spec's
//! two-pass writer needs the child count computed *after* recursion, which rules out
//! per-type begin/end methods that take a `size` up front (see `wkb::writer`).

use crate::error::Result;

/// Maximum nesting depth a writer must tolerate before failing cleanly (§5).
pub const GEOM_MAX_DEPTH: usize = 25;

/// Closed tag set of geometry classes (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeomType {
    Geometry,
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
    CircularString,
    CompoundCurve,
    CurvePolygon,
    Surface,
    Curve,
    LinearRing,
}

impl GeomType {
    /// Base WKB type code (1..14), before the XYZ/XYM/XYZM dimension modifier.
    pub fn wkb_base_code(self) -> u32 {
        match self {
            GeomType::Geometry => 0,
            GeomType::Point => 1,
            GeomType::LineString => 2,
            GeomType::Polygon => 3,
            GeomType::MultiPoint => 4,
            GeomType::MultiLineString => 5,
            GeomType::MultiPolygon => 6,
            GeomType::GeometryCollection => 7,
            GeomType::CircularString => 8,
            GeomType::CompoundCurve => 9,
            GeomType::CurvePolygon => 10,
            GeomType::Surface => 14,
            GeomType::Curve => 13,
            GeomType::LinearRing => 2, // never emitted tagged; promoted to LineString
        }
    }

    pub fn from_wkb_base_code(code: u32) -> Option<Self> {
        Some(match code {
            1 => GeomType::Point,
            2 => GeomType::LineString,
            3 => GeomType::Polygon,
            4 => GeomType::MultiPoint,
            5 => GeomType::MultiLineString,
            6 => GeomType::MultiPolygon,
            7 => GeomType::GeometryCollection,
            8 => GeomType::CircularString,
            9 => GeomType::CompoundCurve,
            10 => GeomType::CurvePolygon,
            13 => GeomType::Curve,
            14 => GeomType::Surface,
            _ => return None,
        })
    }

    /// WKT keyword, case preserved as emitted by the writer.
    pub fn wkt_keyword(self) -> &'static str {
        match self {
            GeomType::Geometry => "Geometry",
            GeomType::Point => "Point",
            GeomType::LineString | GeomType::LinearRing => "LineString",
            GeomType::Polygon => "Polygon",
            GeomType::MultiPoint => "MultiPoint",
            GeomType::MultiLineString => "MultiLineString",
            GeomType::MultiPolygon => "MultiPolygon",
            GeomType::GeometryCollection => "GeometryCollection",
            GeomType::CircularString => "CircularString",
            GeomType::CompoundCurve => "CompoundCurve",
            GeomType::CurvePolygon => "CurvePolygon",
            GeomType::Surface => "Surface",
            GeomType::Curve => "Curve",
        }
    }

    /// §3 assignability: can a column declared as `target` accept a value of `self`'s type?
    pub fn is_assignable_to(self, target: GeomType) -> bool {
        if self == target || target == GeomType::Geometry {
            return true;
        }
        match (self, target) {
            (GeomType::LinearRing, GeomType::LineString) => true,
            (GeomType::LineString, GeomType::Curve) => true,
            (GeomType::LinearRing, GeomType::Curve) => true,
            (GeomType::CircularString, GeomType::Curve) => true,
            (GeomType::CompoundCurve, GeomType::Curve) => true,
            (GeomType::Polygon, GeomType::CurvePolygon) => true,
            (GeomType::Polygon, GeomType::Surface) => true,
            (GeomType::CurvePolygon, GeomType::Surface) => true,
            (GeomType::Point, GeomType::Geometry) => true,
            (_, GeomType::GeometryCollection) => matches!(
                self,
                GeomType::MultiPoint
                    | GeomType::MultiLineString
                    | GeomType::MultiPolygon
                    | GeomType::GeometryCollection
            ),
            _ => false,
        }
    }
}

/// One of the four coordinate dimensionalities (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordType {
    Xy,
    Xyz,
    Xym,
    Xyzm,
}

impl CoordType {
    pub fn ordinate_count(self) -> usize {
        match self {
            CoordType::Xy => 2,
            CoordType::Xyz | CoordType::Xym => 3,
            CoordType::Xyzm => 4,
        }
    }

    pub fn has_z(self) -> bool {
        matches!(self, CoordType::Xyz | CoordType::Xyzm)
    }

    pub fn has_m(self) -> bool {
        matches!(self, CoordType::Xym | CoordType::Xyzm)
    }

    /// WKB dimension modifier added to the base type code.
    pub fn wkb_modifier(self) -> u32 {
        match self {
            CoordType::Xy => 0,
            CoordType::Xyz => 1000,
            CoordType::Xym => 2000,
            CoordType::Xyzm => 3000,
        }
    }

    pub fn from_wkb_modifier(modifier: u32) -> Option<Self> {
        Some(match modifier {
            0 => CoordType::Xy,
            1000 => CoordType::Xyz,
            2000 => CoordType::Xym,
            3000 => CoordType::Xyzm,
            _ => return None,
        })
    }

    /// WKT dimension tag, `None` for plain XY.
    pub fn wkt_tag(self) -> Option<&'static str> {
        match self {
            CoordType::Xy => None,
            CoordType::Xyz => Some("Z"),
            CoordType::Xym => Some("M"),
            CoordType::Xyzm => Some("ZM"),
        }
    }

    pub fn from_zm_flags(z: bool, m: bool) -> Self {
        match (z, m) {
            (false, false) => CoordType::Xy,
            (true, false) => CoordType::Xyz,
            (false, true) => CoordType::Xym,
            (true, true) => CoordType::Xyzm,
        }
    }
}

/// (geometry-type, coordinate-type, ordinate-count) — travels with every visitor call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryHeader {
    pub geom_type: GeomType,
    pub coord_type: CoordType,
}

impl GeometryHeader {
    pub fn new(geom_type: GeomType, coord_type: CoordType) -> Self {
        GeometryHeader {
            geom_type,
            coord_type,
        }
    }

    pub fn ordinate_count(self) -> usize {
        self.coord_type.ordinate_count()
    }

    pub fn with_type(self, geom_type: GeomType) -> Self {
        GeometryHeader {
            geom_type,
            ..self
        }
    }
}

/// One axis of the 4-axis bounding box: a presence flag plus a `(min, max)` pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Axis {
    pub present: bool,
    pub min: f64,
    pub max: f64,
}

impl Axis {
    /// Initial state before any coordinate has been accumulated.
    pub const EMPTY: Axis = Axis {
        present: false,
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
    };
}

impl Default for Axis {
    fn default() -> Self {
        Axis::EMPTY
    }
}

/// 4-axis axis-aligned bounding box (§3).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Envelope {
    pub x: Axis,
    pub y: Axis,
    pub z: Axis,
    pub m: Axis,
}

impl Envelope {
    pub fn empty() -> Self {
        Envelope::default()
    }

    /// The GPKG envelope "shape" code: 0 none, 1 XY, 2 XYZ, 3 XYM, 4 XYZM.
    pub fn shape_code(&self) -> u8 {
        match (self.z.present, self.m.present) {
            (false, false) if !self.x.present && !self.y.present => 0,
            (false, false) => 1,
            (true, false) => 2,
            (false, true) => 3,
            (true, true) => 4,
        }
    }
}

/// A record of five callbacks driven by a geometry producer (§3, §9).
///
/// Every callback returns success or a propagated error; unset callbacks default to no-ops
/// that return success, matching the source's `geom_consumer_t` where an unset function
/// pointer is treated as a no-op.
#[allow(unused_variables)]
pub trait GeomConsumer {
    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        Ok(())
    }

    fn begin_geometry(&mut self, header: GeometryHeader) -> Result<()> {
        Ok(())
    }

    fn end_geometry(&mut self, header: GeometryHeader) -> Result<()> {
        Ok(())
    }

    /// `coords` holds `point_count * header.ordinate_count()` ordinates; `skip_count`
    /// ordinates at the front repeat the last point of a previous batch (circular-string
    /// carry-over, §4.5) and must not be re-emitted as a new point.
    fn coordinates(
        &mut self,
        header: GeometryHeader,
        point_count: usize,
        coords: &[f64],
        skip_count: usize,
    ) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignability_follows_hierarchy() {
        assert!(GeomType::LinearRing.is_assignable_to(GeomType::LineString));
        assert!(GeomType::Polygon.is_assignable_to(GeomType::CurvePolygon));
        assert!(GeomType::MultiPolygon.is_assignable_to(GeomType::Geometry));
        assert!(!GeomType::Point.is_assignable_to(GeomType::LineString));
    }

    #[test]
    fn coord_type_round_trips_through_wkb_modifier() {
        for ct in [CoordType::Xy, CoordType::Xyz, CoordType::Xym, CoordType::Xyzm] {
            assert_eq!(CoordType::from_wkb_modifier(ct.wkb_modifier()), Some(ct));
        }
    }
}
