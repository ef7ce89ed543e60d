//! WKT pretty-printer (§4.6): a depth-stack `GeomConsumer` that defers opening a
//! geometry's `(` until its first coordinate or child arrives, so an empty geometry
//! renders as `TYPE EMPTY` instead of `TYPE()`.
//!
//! Grounded on `examples/georust-geozero/geozero/src/wkt/wkt_writer.rs`'s
//! `geom_begin`/`tagged_geom_begin`/`geom_end` helpers, generalized from the teacher's
//! up-front `size: usize` (which lets it know emptiness immediately) to this crate's
//! two-pass contract, where emptiness is only known once `end_geometry` arrives with no
//! intervening calls.

use crate::error::Result;
use crate::geometry::{GeomConsumer, GeomType, GeometryHeader};

struct Frame {
    geom_type: GeomType,
    /// Precomputed `"TYPE"` or `"TYPE Z"` etc.; empty string for an untagged member
    /// (a polygon ring, a multi-geometry member, a bare compound-curve line segment).
    tag: String,
    pending_open: bool,
    point_index: usize,
    child_index: usize,
}

/// Decides whether `child` needs its own keyword when nested directly under `parent`
/// (§4.6): `GeometryCollection` members are always tagged; `Polygon`/`CurvePolygon` rings
/// and `Multi*` members that match their container's singular type are bare coordinate
/// lists; a `CompoundCurve`'s `CircularString` segments keep their tag, its line segments
/// don't.
fn is_tagged(parent: Option<GeomType>, child: GeomType) -> bool {
    match parent {
        None => true,
        Some(GeomType::GeometryCollection) => true,
        Some(GeomType::Polygon)
            if matches!(child, GeomType::LinearRing | GeomType::LineString) =>
        {
            false
        }
        Some(GeomType::CurvePolygon)
            if matches!(child, GeomType::LinearRing | GeomType::LineString) =>
        {
            false
        }
        Some(GeomType::CurvePolygon)
            if matches!(child, GeomType::CircularString | GeomType::CompoundCurve) =>
        {
            true
        }
        Some(GeomType::MultiPoint) if child == GeomType::Point => false,
        Some(GeomType::MultiLineString) if child == GeomType::LineString => false,
        Some(GeomType::MultiPolygon) if child == GeomType::Polygon => false,
        Some(GeomType::CompoundCurve) if child == GeomType::LineString => false,
        Some(GeomType::CompoundCurve) if child == GeomType::CircularString => true,
        _ => true,
    }
}

fn tag_for(header: GeometryHeader) -> String {
    let mut tag = header.geom_type.wkt_keyword().to_uppercase();
    if let Some(dim) = header.coord_type.wkt_tag() {
        tag.push(' ');
        tag.push_str(dim);
    }
    tag
}

/// Writes WKT text into a caller-owned buffer as a [`GeomConsumer`] is driven.
pub struct WktWriter<'a> {
    out: &'a mut String,
    stack: Vec<Frame>,
}

impl<'a> WktWriter<'a> {
    pub fn new(out: &'a mut String) -> Self {
        WktWriter {
            out,
            stack: Vec::new(),
        }
    }

    /// Flushes the pending `TAG(` for the frame at `idx`, marking it non-empty. Must be
    /// called before any content (a coordinate or a nested child) is appended.
    fn ensure_open(&mut self, idx: usize) {
        if self.stack[idx].pending_open {
            if !self.stack[idx].tag.is_empty() {
                let tag = self.stack[idx].tag.clone();
                self.out.push_str(&tag);
            }
            self.out.push('(');
            self.stack[idx].pending_open = false;
        }
    }
}

impl GeomConsumer for WktWriter<'_> {
    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        Ok(())
    }

    fn begin_geometry(&mut self, header: GeometryHeader) -> Result<()> {
        let parent_type = self.stack.last().map(|f| f.geom_type);
        if let Some(idx) = self.stack.len().checked_sub(1) {
            self.ensure_open(idx);
            if self.stack[idx].child_index > 0 {
                self.out.push(',');
            }
            self.stack[idx].child_index += 1;
        }

        let tagged = is_tagged(parent_type, header.geom_type);
        let tag = if tagged { tag_for(header) } else { String::new() };
        self.stack.push(Frame {
            geom_type: header.geom_type,
            tag,
            pending_open: true,
            point_index: 0,
            child_index: 0,
        });
        Ok(())
    }

    fn end_geometry(&mut self, _header: GeometryHeader) -> Result<()> {
        let frame = self
            .stack
            .pop()
            .expect("end_geometry without a matching begin_geometry");
        if frame.pending_open {
            if frame.tag.is_empty() {
                self.out.push_str("()");
            } else {
                self.out.push_str(&frame.tag);
                self.out.push_str(" EMPTY");
            }
        } else {
            self.out.push(')');
        }
        Ok(())
    }

    fn coordinates(
        &mut self,
        header: GeometryHeader,
        point_count: usize,
        coords: &[f64],
        skip_count: usize,
    ) -> Result<()> {
        let idx = self.stack.len() - 1;
        self.ensure_open(idx);
        let stride = header.ordinate_count();
        for point in coords[skip_count..point_count * stride].chunks(stride) {
            if self.stack[idx].point_index > 0 {
                self.out.push(',');
            }
            for (i, ordinate) in point.iter().enumerate() {
                if i > 0 {
                    self.out.push(' ');
                }
                self.out.push_str(&ordinate.to_string());
            }
            self.stack[idx].point_index += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::CoordType;

    fn write(f: impl FnOnce(&mut WktWriter)) -> String {
        let mut out = String::new();
        {
            let mut writer = WktWriter::new(&mut out);
            writer.begin().unwrap();
            f(&mut writer);
            writer.end().unwrap();
        }
        out
    }

    #[test]
    fn writes_point() {
        let text = write(|w| {
            let header = GeometryHeader::new(GeomType::Point, CoordType::Xy);
            w.begin_geometry(header).unwrap();
            w.coordinates(header, 1, &[1.0, 2.0], 0).unwrap();
            w.end_geometry(header).unwrap();
        });
        assert_eq!(text, "POINT(1 2)");
    }

    #[test]
    fn writes_empty_point() {
        let text = write(|w| {
            let header = GeometryHeader::new(GeomType::Point, CoordType::Xyz);
            w.begin_geometry(header).unwrap();
            w.end_geometry(header).unwrap();
        });
        assert_eq!(text, "POINT Z EMPTY");
    }

    #[test]
    fn writes_polygon_with_untagged_rings() {
        let text = write(|w| {
            let poly = GeometryHeader::new(GeomType::Polygon, CoordType::Xy);
            let ring = GeometryHeader::new(GeomType::LinearRing, CoordType::Xy);
            w.begin_geometry(poly).unwrap();
            w.begin_geometry(ring).unwrap();
            w.coordinates(
                ring,
                5,
                &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0],
                0,
            )
            .unwrap();
            w.end_geometry(ring).unwrap();
            w.end_geometry(poly).unwrap();
        });
        assert_eq!(text, "POLYGON((0 0,0 1,1 1,1 0,0 0))");
    }

    #[test]
    fn writes_compoundcurve_with_mixed_tagging() {
        let text = write(|w| {
            let cc = GeometryHeader::new(GeomType::CompoundCurve, CoordType::Xy);
            let line = GeometryHeader::new(GeomType::LineString, CoordType::Xy);
            let arc = GeometryHeader::new(GeomType::CircularString, CoordType::Xy);
            w.begin_geometry(cc).unwrap();
            w.begin_geometry(line).unwrap();
            w.coordinates(line, 2, &[0.0, 0.0, 1.0, 1.0], 0).unwrap();
            w.end_geometry(line).unwrap();
            w.begin_geometry(arc).unwrap();
            w.coordinates(arc, 3, &[1.0, 1.0, 2.0, 2.0, 3.0, 1.0], 0)
                .unwrap();
            w.end_geometry(arc).unwrap();
            w.end_geometry(cc).unwrap();
        });
        assert_eq!(
            text,
            "COMPOUNDCURVE((0 0,1 1),CIRCULARSTRING(1 1,2 2,3 1))"
        );
    }

    #[test]
    fn writes_geometrycollection_members_tagged() {
        let text = write(|w| {
            let gc = GeometryHeader::new(GeomType::GeometryCollection, CoordType::Xy);
            let pt = GeometryHeader::new(GeomType::Point, CoordType::Xy);
            w.begin_geometry(gc).unwrap();
            w.begin_geometry(pt).unwrap();
            w.coordinates(pt, 1, &[1.0, 2.0], 0).unwrap();
            w.end_geometry(pt).unwrap();
            w.end_geometry(gc).unwrap();
        });
        assert_eq!(text, "GEOMETRYCOLLECTION(POINT(1 2))");
    }
}
