//! Arc-aware 4-axis bounding box accumulation (§4.4, §8 property 3/4).
//!
//! Ported from `original_source/gpkg/geomio.c` lines 48-322 and 620-681
//! (`intersection2DLSSFCT`, `find_center_circularArc`, `normalize_angle`, `contains_angle`,
//! `get_bounds`, `get_radius`, `forward_azimuth2D`, `get_angle`, `get_arc_angle`,
//! `geom_envelope_fill_arc`, `geom_envelope_fill_simple`, `geom_envelope_init`,
//! `geom_envelope_accumulate`, `geom_envelope_finalize`) — no Rust example repo computes arc
//! extrema; `geozero`'s `bbox.rs` is a straight coordinate min/max with no arc awareness.

use crate::error::Result;
use crate::geometry::{Axis, CoordType, Envelope, GeomConsumer, GeomType, GeometryHeader};

/// Accumulates an [`Envelope`] while being driven as a [`GeomConsumer`] by any codec reader.
#[derive(Debug, Default, Clone)]
pub struct EnvelopeAccumulator {
    envelope: Envelope,
}

impl EnvelopeAccumulator {
    pub fn new() -> Self {
        EnvelopeAccumulator {
            envelope: Envelope::empty(),
        }
    }

    /// Mark axes present according to the coordinate type (X/Y always, Z/M when present).
    pub fn accumulate_header(&mut self, header: GeometryHeader) {
        self.envelope.x.present = true;
        self.envelope.y.present = true;
        if header.coord_type.has_z() {
            self.envelope.z.present = true;
        }
        if header.coord_type.has_m() {
            self.envelope.m.present = true;
        }
    }

    /// Dispatches to the arc branch for `CircularString`, otherwise walks coordinates and
    /// min/maxes each present axis.
    pub fn fill(&mut self, header: GeometryHeader, point_count: usize, coords: &[f64]) {
        if header.geom_type == GeomType::CircularString {
            fill_arc(&mut self.envelope, header.coord_type, point_count, coords);
        } else {
            fill_simple(&mut self.envelope, header.coord_type, point_count, coords);
        }
    }

    /// If the X or Y range is still untouched, the geometry is empty: fill every axis with
    /// the quiet-NaN sentinel and report `true`. Returns the finalized envelope either way.
    pub fn finalize(mut self) -> (Envelope, bool) {
        let untouched = |a: Axis| a.min == f64::INFINITY && a.max == f64::NEG_INFINITY;
        if untouched(self.envelope.x) || untouched(self.envelope.y) {
            let nan_axis = Axis {
                present: false,
                min: f64::NAN,
                max: f64::NAN,
            };
            self.envelope.x = nan_axis;
            self.envelope.y = nan_axis;
            self.envelope.z = nan_axis;
            self.envelope.m = nan_axis;
            (self.envelope, true)
        } else {
            (self.envelope, false)
        }
    }
}

impl GeomConsumer for EnvelopeAccumulator {
    fn begin_geometry(&mut self, header: GeometryHeader) -> Result<()> {
        self.accumulate_header(header);
        Ok(())
    }

    fn coordinates(
        &mut self,
        header: GeometryHeader,
        point_count: usize,
        coords: &[f64],
        _skip_count: usize,
    ) -> Result<()> {
        self.fill(header, point_count, coords);
        Ok(())
    }
}

fn min_max(value: f64, axis: &mut Axis) {
    if value < axis.min {
        axis.min = value;
    }
    if value > axis.max {
        axis.max = value;
    }
}

fn fill_simple(envelope: &mut Envelope, coord_type: CoordType, point_count: usize, coords: &[f64]) {
    let stride = coord_type.ordinate_count();
    for i in 0..point_count {
        let base = i * stride;
        min_max(coords[base], &mut envelope.x);
        min_max(coords[base + 1], &mut envelope.y);
        if coord_type.has_z() {
            // XYZ: z at offset 2. XYZM: z at offset 2, m at offset 3.
            min_max(coords[base + 2], &mut envelope.z);
        }
        if coord_type.has_m() {
            let m_offset = if coord_type == CoordType::Xym { 2 } else { 3 };
            min_max(coords[base + m_offset], &mut envelope.m);
        }
    }
}

fn fill_arc(envelope: &mut Envelope, coord_type: CoordType, point_count: usize, coords: &[f64]) {
    if point_count < 3 {
        return;
    }
    let stride = coord_type.ordinate_count();
    let mut processed = 0;
    while processed <= point_count - 3 {
        let offset = processed * stride;
        let (p1x, p1y, p2x, p2y, p3x, p3y) = match coord_type {
            CoordType::Xy => (
                coords[offset],
                coords[offset + 1],
                coords[offset + 2],
                coords[offset + 3],
                coords[offset + 4],
                coords[offset + 5],
            ),
            CoordType::Xyz | CoordType::Xym => {
                for i in (2..9).step_by(3) {
                    let axis = if coord_type == CoordType::Xyz {
                        &mut envelope.z
                    } else {
                        &mut envelope.m
                    };
                    min_max(coords[offset + i], axis);
                }
                (
                    coords[offset],
                    coords[offset + 1],
                    coords[offset + 3],
                    coords[offset + 4],
                    coords[offset + 6],
                    coords[offset + 7],
                )
            }
            CoordType::Xyzm => {
                let mut i = 2;
                while i < 11 {
                    min_max(coords[offset + i], &mut envelope.z);
                    min_max(coords[offset + i + 1], &mut envelope.m);
                    i += 4;
                }
                (
                    coords[offset],
                    coords[offset + 1],
                    coords[offset + 4],
                    coords[offset + 5],
                    coords[offset + 8],
                    coords[offset + 9],
                )
            }
        };

        let center = find_center(p1x, p1y, p2x, p2y, p3x, p3y);
        let radius = get_radius(center.0, center.1, p1x, p1y);
        let start_angle = get_angle(center.0, center.1, p1x, p1y);
        let intermediate_angle = get_angle(center.0, center.1, p2x, p2y);
        let end_angle = get_angle(center.0, center.1, p3x, p3y);
        let arc_angle = get_arc_angle(start_angle, intermediate_angle, end_angle);
        let bounds = get_bounds(
            center.0, center.1, radius, p1x, p1y, p3x, p3y, start_angle, arc_angle,
        );

        min_max(bounds.0, &mut envelope.x);
        min_max(bounds.2, &mut envelope.x);
        min_max(bounds.1, &mut envelope.y);
        min_max(bounds.3, &mut envelope.y);

        processed += 2;
    }
}

fn intersect_lines(x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64, x4: f64, y4: f64) -> (f64, f64) {
    let denom = (y2 - y1) * (x4 - x3) - (x2 - x1) * (y4 - y3);
    if denom.abs() < 1e-10 {
        ((x2 + x3) / 2.0, (y2 + y3) / 2.0)
    } else {
        let s = ((x1 - x3) * (y4 - y3) - (y1 - y3) * (x4 - x3)) / denom;
        (x1 + s * (x2 - x1), y1 + s * (y2 - y1))
    }
}

fn find_center(p1x: f64, p1y: f64, p2x: f64, p2y: f64, p3x: f64, p3y: f64) -> (f64, f64) {
    let p1_eq_p2 = p1x == p2x && p1y == p2y;
    let p1_eq_p3 = p1x == p3x && p1y == p3y;
    let p2_eq_p3 = p2x == p3x && p2y == p3y;

    if p1_eq_p2 && p1_eq_p3 {
        (p1x, p1y)
    } else if p1_eq_p2 || p1_eq_p3 || p2_eq_p3 {
        if p1_eq_p2 {
            ((p1x + p3x) / 2.0, (p1y + p3y) / 2.0)
        } else {
            ((p1x + p2x) / 2.0, (p1y + p2y) / 2.0)
        }
    } else {
        let c1x = (p1x + p2x) / 2.0;
        let c1y = (p1y + p2y) / 2.0;
        let c2x = (p2x + p3x) / 2.0;
        let c2y = (p2y + p3y) / 2.0;
        let d1x = p2x - p1x;
        let d1y = p2y - p1y;
        let d2x = p3x - p2x;
        let d2y = p3y - p2y;
        intersect_lines(c1x, c1y, c1x + d1y, c1y - d1x, c2x, c2y, c2x + d2y, c2y - d2x)
    }
}

fn get_radius(cx: f64, cy: f64, x: f64, y: f64) -> f64 {
    let dx = x - cx;
    let dy = y - cy;
    (dx * dx + dy * dy).sqrt()
}

fn forward_azimuth_2d(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    let angle = (y2 - y1).atan2(x2 - x1);
    let azimuth = std::f64::consts::FRAC_PI_2 - angle;
    if azimuth < 0.0 {
        azimuth + 2.0 * std::f64::consts::PI
    } else {
        azimuth
    }
}

/// Clockwise-from-north angle in degrees, per the codebase convention (§4.4 step 3).
fn get_angle(cx: f64, cy: f64, x: f64, y: f64) -> f64 {
    90.0 - forward_azimuth_2d(cx, cy, x, y).to_degrees()
}

fn normalize_angle(angle: f64) -> f64 {
    if angle <= -180.0 {
        angle + 360.0
    } else if angle > 180.0 {
        angle - 360.0
    } else {
        angle
    }
}

fn contains_angle(start_angle: f64, arc_angle: f64, target_angle: f64) -> bool {
    if arc_angle >= 360.0 || arc_angle <= -360.0 {
        return true;
    }
    let start_angle = normalize_angle(start_angle);
    let end_angle = start_angle + arc_angle;
    let theta2 = normalize_angle(target_angle);
    if arc_angle >= 0.0 {
        if end_angle > 180.0 && theta2 < start_angle {
            theta2 + 360.0 <= end_angle
        } else {
            theta2 >= start_angle && theta2 <= end_angle
        }
    } else if end_angle <= -180.0 && theta2 >= start_angle {
        theta2 - 360.0 >= end_angle
    } else {
        theta2 >= end_angle && theta2 <= start_angle
    }
}

fn get_arc_angle(start_angle: f64, intermediate_angle: f64, end_angle: f64) -> f64 {
    let mut start_angle = start_angle;
    let mut intermediate_angle = intermediate_angle;
    let mut end_angle = end_angle;
    if start_angle < 0.0 {
        start_angle += 360.0;
    }
    if intermediate_angle < 0.0 {
        intermediate_angle += 360.0;
    }
    if end_angle < 0.0 {
        end_angle += 360.0;
    }
    let arc_angle = end_angle - start_angle;
    if start_angle < end_angle {
        if contains_angle(start_angle, arc_angle, intermediate_angle) {
            arc_angle
        } else {
            arc_angle - 360.0
        }
    } else if contains_angle(start_angle, arc_angle + 360.0, intermediate_angle) {
        arc_angle + 360.0
    } else {
        arc_angle
    }
}

#[allow(clippy::too_many_arguments)]
fn get_bounds(
    cx: f64,
    cy: f64,
    radius: f64,
    start_x: f64,
    start_y: f64,
    end_x: f64,
    end_y: f64,
    start_angle: f64,
    arc_angle: f64,
) -> (f64, f64, f64, f64) {
    let (mut x_min, mut y_min, mut x_max, mut y_max);
    if arc_angle >= 360.0 || arc_angle <= -360.0 {
        x_min = -radius;
        y_min = -radius;
        x_max = radius;
        y_max = radius;
    } else {
        x_min = start_x.min(end_x) - cx;
        y_min = start_y.min(end_y) - cy;
        x_max = start_x.max(end_x) - cx;
        y_max = start_y.max(end_y) - cy;

        if contains_angle(start_angle, arc_angle, 0.0) {
            if x_min > radius {
                x_min = radius;
            }
            if x_max < radius {
                x_max = radius;
            }
        }
        if contains_angle(start_angle, arc_angle, 90.0) {
            if y_min > radius {
                y_min = radius;
            }
            if y_max < radius {
                y_max = radius;
            }
        }
        if contains_angle(start_angle, arc_angle, 180.0) {
            if x_min > -radius {
                x_min = -radius;
            }
            if x_max < -radius {
                x_max = -radius;
            }
        }
        if contains_angle(start_angle, arc_angle, 270.0) {
            if y_min > -radius {
                y_min = -radius;
            }
            if y_max < -radius {
                y_max = -radius;
            }
        }
    }

    let bx0 = cx + x_min;
    let by0 = cy + y_min;
    (bx0, by0, bx0 + (x_max - x_min), by0 + (y_max - y_min))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::CoordType;

    #[test]
    fn simple_envelope_tracks_min_max() {
        let mut acc = EnvelopeAccumulator::new();
        let header = GeometryHeader::new(GeomType::LineString, CoordType::Xy);
        acc.accumulate_header(header);
        acc.fill(header, 2, &[1.0, 2.0, 3.0, 4.0]);
        let (env, empty) = acc.finalize();
        assert!(!empty);
        assert_eq!((env.x.min, env.x.max), (1.0, 3.0));
        assert_eq!((env.y.min, env.y.max), (2.0, 4.0));
    }

    #[test]
    fn empty_geometry_reports_nan_sentinels() {
        let acc = EnvelopeAccumulator::new();
        let (env, empty) = acc.finalize();
        assert!(empty);
        assert!(env.x.min.is_nan() && env.x.max.is_nan());
    }

    #[test]
    fn collinear_arc_degenerates_to_chord_bounds() {
        // S6-adjacent: a straight "arc" through collinear points should bound like its chord.
        let mut acc = EnvelopeAccumulator::new();
        let header = GeometryHeader::new(GeomType::CircularString, CoordType::Xy);
        acc.accumulate_header(header);
        acc.fill(header, 3, &[0.0, 0.0, 1.0, 0.0, 2.0, 0.0]);
        let (env, _) = acc.finalize();
        assert!((env.x.min - 0.0).abs() < 1e-9);
        assert!((env.x.max - 2.0).abs() < 1e-9);
        assert!((env.y.min - 0.0).abs() < 1e-9);
        assert!((env.y.max - 0.0).abs() < 1e-9);
    }

    #[test]
    fn arc_crest_extends_envelope_beyond_chord() {
        // S6: CircularString(0 0, 1 1, 2 0) should have maxY == 1, the arc's crest.
        let mut acc = EnvelopeAccumulator::new();
        let header = GeometryHeader::new(GeomType::CircularString, CoordType::Xy);
        acc.accumulate_header(header);
        acc.fill(header, 3, &[0.0, 0.0, 1.0, 1.0, 2.0, 0.0]);
        let (env, _) = acc.finalize();
        assert!((env.y.min - 0.0).abs() < 1e-9);
        assert!((env.y.max - 1.0).abs() < 1e-9);
        assert!((env.x.min - 0.0).abs() < 1e-9);
        assert!((env.x.max - 2.0).abs() < 1e-9);
    }
}
