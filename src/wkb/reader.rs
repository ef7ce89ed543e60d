use crate::error::{GpkgError, Result};
use crate::geometry::{CoordType, GeomConsumer, GeomType, GeometryHeader, GEOM_MAX_DEPTH};
use crate::stream::{BinaryStream, Endian};
use crate::wkb::{WkbDialect, COORD_BATCH_SIZE, SPATIALITE_SUB_MARKER, SPATIALITE_TRAILER};

/// Parse one WKB geometry from `stream`, driving `consumer` in document order.
pub fn read_geometry<C: GeomConsumer>(
    stream: &mut BinaryStream,
    dialect: WkbDialect,
    consumer: &mut C,
) -> Result<()> {
    consumer.begin()?;
    read_one(stream, dialect, consumer, 0, true)?;
    if dialect == WkbDialect::SpatiaLite {
        let trailer = stream.read_u8()?;
        if trailer != SPATIALITE_TRAILER {
            return Err(GpkgError::Format {
                column: stream.position(),
                message: format!("expected SpatiaLite trailer 0xFE, got {trailer:#04x}"),
            });
        }
    }
    consumer.end()
}

fn read_type_code(
    stream: &mut BinaryStream,
    dialect: WkbDialect,
    is_root: bool,
) -> Result<u32> {
    match dialect {
        WkbDialect::Iso => {
            let endian_byte = stream.read_u8()?;
            let endian = if endian_byte == 0 {
                Endian::Big
            } else {
                Endian::Little
            };
            stream.set_endian(endian);
            stream.read_u32()
        }
        WkbDialect::SpatiaLite => {
            let marker = stream.read_u8()?;
            let expected = if is_root { 0x7C } else { SPATIALITE_SUB_MARKER };
            if marker != expected {
                return Err(GpkgError::Format {
                    column: stream.position(),
                    message: format!(
                        "expected SpatiaLite class marker {expected:#04x}, got {marker:#04x}"
                    ),
                });
            }
            stream.read_u32()
        }
    }
}

fn decode_type_code(code: u32) -> Result<GeometryHeader> {
    let modifier = (code / 1000) * 1000;
    let base = code - modifier;
    let geom_type = GeomType::from_wkb_base_code(base).ok_or(GpkgError::UnknownTypeCode(code))?;
    let coord_type =
        CoordType::from_wkb_modifier(modifier).ok_or(GpkgError::UnknownTypeCode(code))?;
    Ok(GeometryHeader::new(geom_type, coord_type))
}

fn read_one<C: GeomConsumer>(
    stream: &mut BinaryStream,
    dialect: WkbDialect,
    consumer: &mut C,
    depth: usize,
    is_root: bool,
) -> Result<GeometryHeader> {
    if depth > GEOM_MAX_DEPTH {
        return Err(GpkgError::DepthOverflow(depth));
    }
    let code = read_type_code(stream, dialect, is_root)?;
    let header = decode_type_code(code)?;

    consumer.begin_geometry(header)?;
    match header.geom_type {
        GeomType::Point => read_point_body(stream, header, consumer)?,
        GeomType::LineString | GeomType::LinearRing => {
            read_linestring_body(stream, header, consumer)?
        }
        GeomType::CircularString => read_circularstring_body(stream, header, consumer)?,
        GeomType::Polygon => read_polygon_body(stream, header, consumer)?,
        GeomType::CurvePolygon => {
            read_curvepolygon_body(stream, dialect, header, consumer, depth)?
        }
        GeomType::CompoundCurve => {
            read_compoundcurve_body(stream, dialect, header, consumer, depth)?
        }
        GeomType::MultiPoint => {
            read_multi_body(stream, dialect, header, GeomType::Point, consumer, depth)?
        }
        GeomType::MultiLineString => read_multi_body(
            stream,
            dialect,
            header,
            GeomType::LineString,
            consumer,
            depth,
        )?,
        GeomType::MultiPolygon => {
            read_multi_body(stream, dialect, header, GeomType::Polygon, consumer, depth)?
        }
        GeomType::GeometryCollection => {
            read_collection_body(stream, dialect, header, consumer, depth)?
        }
        GeomType::Geometry | GeomType::Surface | GeomType::Curve => {
            return Err(GpkgError::UnknownTypeCode(code))
        }
    }
    consumer.end_geometry(header)?;
    Ok(header)
}

fn read_point_body<C: GeomConsumer>(
    stream: &mut BinaryStream,
    header: GeometryHeader,
    consumer: &mut C,
) -> Result<()> {
    let n = header.ordinate_count();
    let mut coords = Vec::with_capacity(n);
    for _ in 0..n {
        coords.push(stream.read_double()?);
    }
    if coords.iter().all(|v| v.is_nan()) {
        return Ok(());
    }
    consumer.coordinates(header, 1, &coords, 0)
}

/// Plain batched coordinate streaming, no arc carry-over (LineString/LinearRing rings).
fn read_points_simple<C: GeomConsumer>(
    stream: &mut BinaryStream,
    header: GeometryHeader,
    count: usize,
    consumer: &mut C,
) -> Result<()> {
    let stride = header.ordinate_count();
    let mut remaining = count;
    while remaining > 0 {
        let batch = remaining.min(COORD_BATCH_SIZE);
        let mut coords = Vec::with_capacity(batch * stride);
        for _ in 0..batch * stride {
            coords.push(stream.read_double()?);
        }
        consumer.coordinates(header, batch, &coords, 0)?;
        remaining -= batch;
    }
    Ok(())
}

/// Batched coordinate streaming for `CircularString`: every batch after the first repeats
/// the previous batch's last point as a `skip_coords` prefix so arc triplets straddling a
/// batch boundary are never split (§4.5).
fn read_points_arc<C: GeomConsumer>(
    stream: &mut BinaryStream,
    header: GeometryHeader,
    count: usize,
    consumer: &mut C,
) -> Result<()> {
    if count == 0 {
        return Ok(());
    }
    let stride = header.ordinate_count();
    let mut start = 0usize;
    let mut carry: Option<Vec<f64>> = None;
    while start < count {
        let available = count - start;
        let room = if carry.is_some() {
            COORD_BATCH_SIZE - 1
        } else {
            COORD_BATCH_SIZE
        };
        let new_points = available.min(room);
        let skip_count = if carry.is_some() { stride } else { 0 };
        let mut coords = Vec::with_capacity((new_points + carry.is_some() as usize) * stride);
        if let Some(prev) = &carry {
            coords.extend_from_slice(prev);
        }
        for _ in 0..new_points * stride {
            coords.push(stream.read_double()?);
        }
        let batch_points = new_points + carry.is_some() as usize;
        consumer.coordinates(header, batch_points, &coords, skip_count)?;
        carry = Some(coords[coords.len() - stride..].to_vec());
        start += new_points;
    }
    Ok(())
}

fn read_linestring_body<C: GeomConsumer>(
    stream: &mut BinaryStream,
    header: GeometryHeader,
    consumer: &mut C,
) -> Result<()> {
    let count = stream.read_u32()? as usize;
    read_points_simple(stream, header, count, consumer)
}

fn read_circularstring_body<C: GeomConsumer>(
    stream: &mut BinaryStream,
    header: GeometryHeader,
    consumer: &mut C,
) -> Result<()> {
    let count = stream.read_u32()? as usize;
    if count != 0 && (count < 3 || (count - 3) % 2 != 0) {
        return Err(GpkgError::BadArity(count));
    }
    read_points_arc(stream, header, count, consumer)
}

fn read_polygon_body<C: GeomConsumer>(
    stream: &mut BinaryStream,
    header: GeometryHeader,
    consumer: &mut C,
) -> Result<()> {
    let ring_count = stream.read_u32()? as usize;
    let ring_header = header.with_type(GeomType::LinearRing);
    for _ in 0..ring_count {
        consumer.begin_geometry(ring_header)?;
        read_linestring_body(stream, ring_header, consumer)?;
        consumer.end_geometry(ring_header)?;
    }
    Ok(())
}

fn require_child(
    child: GeometryHeader,
    parent: GeometryHeader,
    allowed: &[GeomType],
) -> Result<()> {
    if child.coord_type != parent.coord_type {
        return Err(GpkgError::DimensionMismatch {
            parent: format!("{:?}", parent.coord_type),
            child: format!("{:?}", child.coord_type),
        });
    }
    if !allowed.contains(&child.geom_type) {
        return Err(GpkgError::Format {
            column: 0,
            message: format!(
                "unexpected child geometry type {:?} inside {:?}",
                child.geom_type, parent.geom_type
            ),
        });
    }
    Ok(())
}

fn read_curvepolygon_body<C: GeomConsumer>(
    stream: &mut BinaryStream,
    dialect: WkbDialect,
    header: GeometryHeader,
    consumer: &mut C,
    depth: usize,
) -> Result<()> {
    let ring_count = stream.read_u32()? as usize;
    for _ in 0..ring_count {
        let child = read_one(stream, dialect, consumer, depth + 1, false)?;
        require_child(
            child,
            header,
            &[
                GeomType::LineString,
                GeomType::CircularString,
                GeomType::CompoundCurve,
            ],
        )?;
    }
    Ok(())
}

fn read_compoundcurve_body<C: GeomConsumer>(
    stream: &mut BinaryStream,
    dialect: WkbDialect,
    header: GeometryHeader,
    consumer: &mut C,
    depth: usize,
) -> Result<()> {
    let child_count = stream.read_u32()? as usize;
    for _ in 0..child_count {
        let child = read_one(stream, dialect, consumer, depth + 1, false)?;
        require_child(
            child,
            header,
            &[GeomType::LineString, GeomType::CircularString],
        )?;
    }
    Ok(())
}

fn read_multi_body<C: GeomConsumer>(
    stream: &mut BinaryStream,
    dialect: WkbDialect,
    header: GeometryHeader,
    child_type: GeomType,
    consumer: &mut C,
    depth: usize,
) -> Result<()> {
    let child_count = stream.read_u32()? as usize;
    for _ in 0..child_count {
        let child = read_one(stream, dialect, consumer, depth + 1, false)?;
        require_child(child, header, &[child_type])?;
    }
    Ok(())
}

fn read_collection_body<C: GeomConsumer>(
    stream: &mut BinaryStream,
    dialect: WkbDialect,
    header: GeometryHeader,
    consumer: &mut C,
    depth: usize,
) -> Result<()> {
    let child_count = stream.read_u32()? as usize;
    for _ in 0..child_count {
        let child = read_one(stream, dialect, consumer, depth + 1, false)?;
        if child.coord_type != header.coord_type {
            return Err(GpkgError::DimensionMismatch {
                parent: format!("{:?}", header.coord_type),
                child: format!("{:?}", child.coord_type),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::EnvelopeAccumulator;

    fn point_xy_hex() -> Vec<u8> {
        // S1: Point(1 2), ISO WKB, little-endian.
        hex::decode("0101000000000000000000F03F0000000000000040").unwrap()
    }

    #[test]
    fn reads_point_s1() {
        let bytes = point_xy_hex();
        let mut stream = BinaryStream::from_slice(&bytes);
        let mut acc = EnvelopeAccumulator::new();
        read_geometry(&mut stream, WkbDialect::Iso, &mut acc).unwrap();
        let (env, empty) = acc.finalize();
        assert!(!empty);
        assert_eq!(env.x.min, 1.0);
        assert_eq!(env.y.min, 2.0);
    }

    #[test]
    fn empty_point_has_no_coordinates_callback() {
        let mut bytes = vec![1u8, 1, 0, 0, 0];
        bytes.extend_from_slice(&f64::NAN.to_le_bytes());
        bytes.extend_from_slice(&f64::NAN.to_le_bytes());
        let mut stream = BinaryStream::from_slice(&bytes);
        let mut acc = EnvelopeAccumulator::new();
        read_geometry(&mut stream, WkbDialect::Iso, &mut acc).unwrap();
        let (_, empty) = acc.finalize();
        assert!(empty);
    }

    #[test]
    fn circularstring_bad_arity_rejected() {
        // point_count = 4, which violates (n-3)%2==0.
        let mut bytes = vec![1u8, 8, 0, 0, 0];
        bytes.extend_from_slice(&4u32.to_le_bytes());
        let mut stream = BinaryStream::from_slice(&bytes);
        let mut acc = EnvelopeAccumulator::new();
        assert!(matches!(
            read_geometry(&mut stream, WkbDialect::Iso, &mut acc),
            Err(GpkgError::BadArity(4))
        ));
    }

    #[test]
    fn depth_overflow_fails_cleanly() {
        // A GeometryCollection nested deeper than GEOM_MAX_DEPTH allows.
        let mut bytes = Vec::new();
        for _ in 0..=GEOM_MAX_DEPTH + 1 {
            bytes.push(1u8);
            bytes.extend_from_slice(&7u32.to_le_bytes()); // GeometryCollection
            bytes.extend_from_slice(&1u32.to_le_bytes()); // one child
        }
        let mut stream = BinaryStream::from_slice(&bytes);
        let mut acc = EnvelopeAccumulator::new();
        assert!(matches!(
            read_geometry(&mut stream, WkbDialect::Iso, &mut acc),
            Err(GpkgError::DepthOverflow(_))
        ));
    }
}
