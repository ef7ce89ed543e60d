//! Container-blob codec (§4.7): GeoPackage-binary and Spatialite-blob headers wrapped
//! around a WKB payload (§4.5), with the envelope those headers carry computed on the fly
//! as the payload is written.
//!
//! Grounded on `examples/georust-geozero/geozero/src/wkb/wkb_writer.rs`'s
//! `write_gpkg_header` (magic/flags/srid/envelope byte layout) and
//! `examples/georust-geozero/geozero/src/wkb/wkb_reader.rs`'s `read_gpkg_header` /
//! `read_spatialite_header` for the matching read side, generalized from the teacher's
//! envelope (known up front, since its `GeomProcessor` receives sizes before recursing) to
//! this crate's on-the-fly `EnvelopeAccumulator`, and composed with the two-pass
//! `wkb::WkbWriter` via a transient reborrow, since both need direct `&mut BinaryStream`
//! access at once (see `with_wkb`).

use crate::envelope::EnvelopeAccumulator;
use crate::error::{GpkgError, Result};
use crate::geometry::{Axis, CoordType, Envelope, GeomConsumer, GeomType, GeometryHeader};
use crate::stream::{BinaryStream, Endian};
use crate::wkb::{self, WkbDialect, WkbWriter, SPATIALITE_TRAILER};

const GPKG_MAGIC: [u8; 2] = *b"GP";

/// Which container header wraps the WKB payload (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobDialect {
    Gpkg,
    SpatiaLite,
}

impl BlobDialect {
    fn wkb_dialect(self) -> WkbDialect {
        match self {
            BlobDialect::Gpkg => WkbDialect::Iso,
            BlobDialect::SpatiaLite => WkbDialect::SpatiaLite,
        }
    }
}

/// Header fields read ahead of the WKB payload, useful on their own for SQL bindings that
/// only need the SRID or a quick envelope (§4.9 "If an envelope axis is missing, compute it
/// lazily").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlobHeader {
    pub srid: i32,
    /// Only meaningful for the GeoPackage dialect, which carries an explicit empty bit;
    /// the Spatialite header has none, so this is always `false` there and callers must
    /// decode the payload to learn true emptiness.
    pub empty: bool,
    pub envelope: Envelope,
}

fn envelope_pairs(shape: u8) -> usize {
    match shape {
        0 => 0,
        1 => 2,
        2 | 3 => 3,
        4 => 4,
        _ => unreachable!("envelope shape code out of range: {shape}"),
    }
}

fn gpkg_header_len(shape: u8) -> usize {
    8 + envelope_pairs(shape) * 16
}

const SPATIALITE_HEADER_LEN: usize = 1 + 1 + 4 + 32;

fn validate_axis(axis: Axis) -> Result<()> {
    if axis.present && axis.min > axis.max {
        return Err(GpkgError::BadEnvelope(format!(
            "axis min {} is greater than max {}",
            axis.min, axis.max
        )));
    }
    Ok(())
}

/// Writes a container-blob header around a WKB payload while accumulating the envelope
/// that header needs, driven as a single [`GeomConsumer`] (§4.7 "Writer orchestration").
pub struct BlobWriter<'a> {
    stream: &'a mut BinaryStream,
    dialect: BlobDialect,
    srid: i32,
    envelope: EnvelopeAccumulator,
    shape: u8,
    wkb_start: Vec<usize>,
    wkb_children: Vec<u32>,
}

impl<'a> BlobWriter<'a> {
    pub fn new(stream: &'a mut BinaryStream, dialect: BlobDialect, srid: i32) -> Self {
        BlobWriter {
            stream,
            dialect,
            srid,
            envelope: EnvelopeAccumulator::new(),
            shape: 0,
            wkb_start: Vec::new(),
            wkb_children: Vec::new(),
        }
    }

    /// Reconstitutes the embedded two-pass WKB writer over a reborrow of the stream,
    /// threading its `start`/`children` stacks through by value, since a `WkbWriter` can't
    /// be stored alongside a second live borrow of the same stream (§9 two-pass writing).
    fn with_wkb<F, T>(&mut self, f: F) -> T
    where
        F: FnOnce(&mut WkbWriter) -> T,
    {
        let mut wkb = WkbWriter::new(&mut *self.stream, self.dialect.wkb_dialect());
        wkb.start = std::mem::take(&mut self.wkb_start);
        wkb.children = std::mem::take(&mut self.wkb_children);
        let result = f(&mut wkb);
        self.wkb_start = std::mem::take(&mut wkb.start);
        self.wkb_children = std::mem::take(&mut wkb.children);
        result
    }

    fn write_gpkg_header(&mut self, envelope: Envelope, empty: bool) -> Result<()> {
        let endian_bit = if self.stream.endian() == Endian::Little {
            1u8
        } else {
            0
        };
        let flags = ((empty as u8) << 4) | ((self.shape & 0b111) << 1) | endian_bit;
        self.stream.write_nu8(&GPKG_MAGIC)?;
        self.stream.write_u8(0)?; // version
        self.stream.write_u8(flags)?;
        self.stream.write_i32(self.srid)?;
        if self.shape >= 1 {
            self.stream.write_double(envelope.x.min)?;
            self.stream.write_double(envelope.x.max)?;
            self.stream.write_double(envelope.y.min)?;
            self.stream.write_double(envelope.y.max)?;
        }
        if self.shape == 2 || self.shape == 4 {
            self.stream.write_double(envelope.z.min)?;
            self.stream.write_double(envelope.z.max)?;
        }
        if self.shape == 3 || self.shape == 4 {
            self.stream.write_double(envelope.m.min)?;
            self.stream.write_double(envelope.m.max)?;
        }
        Ok(())
    }

    fn write_spatialite_header(&mut self, envelope: Envelope) -> Result<()> {
        let endian_bit = if self.stream.endian() == Endian::Little {
            1u8
        } else {
            0
        };
        self.stream.write_u8(0)?;
        self.stream.write_u8(endian_bit)?;
        self.stream.write_i32(self.srid)?;
        self.stream.write_double(envelope.x.min)?;
        self.stream.write_double(envelope.y.min)?;
        self.stream.write_double(envelope.x.max)?;
        self.stream.write_double(envelope.y.max)?;
        Ok(())
    }
}

impl GeomConsumer for BlobWriter<'_> {
    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        if self.dialect == BlobDialect::SpatiaLite {
            self.stream.write_u8(SPATIALITE_TRAILER)?;
        }
        let end_pos = self.stream.position();
        let (envelope, empty) = std::mem::take(&mut self.envelope).finalize();
        self.stream.seek(0)?;
        match self.dialect {
            BlobDialect::Gpkg => self.write_gpkg_header(envelope, empty)?,
            BlobDialect::SpatiaLite => self.write_spatialite_header(envelope)?,
        }
        self.stream.seek(end_pos)?;
        self.stream.flip();
        Ok(())
    }

    fn begin_geometry(&mut self, header: GeometryHeader) -> Result<()> {
        if self.wkb_start.is_empty() {
            // Outermost geometry: reserve the container header now, since its size must be
            // fixed before the payload (and its eventual child count) is known. A Point
            // root always reserves a shape-0 (no envelope) header (§4.7); any other root
            // type reserves a header sized for its coordinate type's envelope shape.
            self.shape = if header.geom_type == GeomType::Point {
                0
            } else {
                match header.coord_type {
                    CoordType::Xy => 1,
                    CoordType::Xyz => 2,
                    CoordType::Xym => 3,
                    CoordType::Xyzm => 4,
                }
            };
            let header_len = match self.dialect {
                BlobDialect::Gpkg => gpkg_header_len(self.shape),
                BlobDialect::SpatiaLite => SPATIALITE_HEADER_LEN,
            };
            self.stream.relseek(header_len as i64)?;
        }
        self.envelope.begin_geometry(header)?;
        self.with_wkb(|wkb| wkb.begin_geometry(header))
    }

    fn coordinates(
        &mut self,
        header: GeometryHeader,
        point_count: usize,
        coords: &[f64],
        skip_count: usize,
    ) -> Result<()> {
        self.envelope
            .coordinates(header, point_count, coords, skip_count)?;
        self.with_wkb(|wkb| wkb.coordinates(header, point_count, coords, skip_count))
    }

    fn end_geometry(&mut self, header: GeometryHeader) -> Result<()> {
        self.with_wkb(|wkb| wkb.end_geometry(header))
    }
}

fn read_gpkg_envelope(stream: &mut BinaryStream, shape: u8) -> Result<Envelope> {
    let mut envelope = Envelope::empty();
    if shape == 0 {
        return Ok(envelope);
    }
    envelope.x.present = true;
    envelope.x.min = stream.read_double()?;
    envelope.x.max = stream.read_double()?;
    envelope.y.present = true;
    envelope.y.min = stream.read_double()?;
    envelope.y.max = stream.read_double()?;
    if shape == 2 || shape == 4 {
        envelope.z.present = true;
        envelope.z.min = stream.read_double()?;
        envelope.z.max = stream.read_double()?;
    }
    if shape == 3 || shape == 4 {
        envelope.m.present = true;
        envelope.m.min = stream.read_double()?;
        envelope.m.max = stream.read_double()?;
    }
    validate_axis(envelope.x)?;
    validate_axis(envelope.y)?;
    validate_axis(envelope.z)?;
    validate_axis(envelope.m)?;
    Ok(envelope)
}

/// Parses a GeoPackage-binary header without touching the WKB payload that follows.
pub fn read_gpkg_header(stream: &mut BinaryStream) -> Result<BlobHeader> {
    let magic = stream.read_nu8(2)?;
    if magic != GPKG_MAGIC {
        return Err(GpkgError::BadMagic([magic[0], magic[1]]));
    }
    let version = stream.read_u8()?;
    if version != 0 {
        return Err(GpkgError::BadVersion(version));
    }
    let flags = stream.read_u8()?;
    let endian = if flags & 0b1 != 0 {
        Endian::Little
    } else {
        Endian::Big
    };
    stream.set_endian(endian);
    let empty = flags & 0b1_0000 != 0;
    let shape = (flags >> 1) & 0b111;
    let srid = stream.read_i32()?;
    let envelope = read_gpkg_envelope(stream, shape)?;
    if empty {
        for axis in [envelope.x, envelope.y, envelope.z, envelope.m] {
            if axis.present && (!axis.min.is_nan() || !axis.max.is_nan()) {
                return Err(GpkgError::BadEnvelope(
                    "empty flag set but envelope carries non-NaN bounds".to_string(),
                ));
            }
        }
    }
    Ok(BlobHeader {
        srid,
        empty,
        envelope,
    })
}

/// Parses a Spatialite-blob header without touching the WKB payload that follows.
pub fn read_spatialite_header(stream: &mut BinaryStream) -> Result<BlobHeader> {
    let start = stream.read_u8()?;
    if start != 0 {
        return Err(GpkgError::Format {
            column: 0,
            message: format!("expected Spatialite blob start byte 0x00, got {start:#04x}"),
        });
    }
    let endian_byte = stream.read_u8()?;
    let endian = if endian_byte & 0b1 != 0 {
        Endian::Little
    } else {
        Endian::Big
    };
    stream.set_endian(endian);
    let srid = stream.read_i32()?;
    let minx = stream.read_double()?;
    let miny = stream.read_double()?;
    let maxx = stream.read_double()?;
    let maxy = stream.read_double()?;
    let envelope = Envelope {
        x: Axis {
            present: true,
            min: minx,
            max: maxx,
        },
        y: Axis {
            present: true,
            min: miny,
            max: maxy,
        },
        z: Axis::EMPTY,
        m: Axis::EMPTY,
    };
    validate_axis(envelope.x)?;
    validate_axis(envelope.y)?;
    Ok(BlobHeader {
        srid,
        empty: false,
        envelope,
    })
}

/// Reads a full GeoPackage-binary blob, driving `consumer` over the WKB payload and
/// returning the header fields read ahead of it.
pub fn read_gpkg_blob<C: GeomConsumer>(
    stream: &mut BinaryStream,
    consumer: &mut C,
) -> Result<BlobHeader> {
    let header = read_gpkg_header(stream)?;
    wkb::read_geometry(stream, WkbDialect::Iso, consumer)?;
    Ok(header)
}

/// Reads a full Spatialite-blob, driving `consumer` over the WKB payload and returning the
/// header fields read ahead of it.
pub fn read_spatialite_blob<C: GeomConsumer>(
    stream: &mut BinaryStream,
    consumer: &mut C,
) -> Result<BlobHeader> {
    let header = read_spatialite_header(stream)?;
    wkb::read_geometry(stream, WkbDialect::SpatiaLite, consumer)?;
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{CoordType, GeomType};

    fn write_point(dialect: BlobDialect, srid: i32, xy: (f64, f64)) -> Vec<u8> {
        let mut stream = BinaryStream::with_capacity(64);
        let mut writer = BlobWriter::new(&mut stream, dialect, srid);
        let header = GeometryHeader::new(GeomType::Point, CoordType::Xy);
        writer.begin().unwrap();
        writer.begin_geometry(header).unwrap();
        writer.coordinates(header, 1, &[xy.0, xy.1], 0).unwrap();
        writer.end_geometry(header).unwrap();
        writer.end().unwrap();
        stream.as_slice().to_vec()
    }

    #[test]
    fn gpkg_point_s1_round_trips() {
        let bytes = write_point(BlobDialect::Gpkg, 4326, (1.0, 2.0));
        assert_eq!(&bytes[0..2], b"GP");
        let mut stream = BinaryStream::from_slice(&bytes);
        let mut env = EnvelopeAccumulator::new();
        let header = read_gpkg_blob(&mut stream, &mut env).unwrap();
        assert_eq!(header.srid, 4326);
        assert!(!header.empty);
        // A Point root reserves no envelope in the container header (§4.7).
        assert!(!header.envelope.x.present);
        let (finalized, empty) = env.finalize();
        assert!(!empty);
        assert_eq!(finalized.x.min, 1.0);
        assert_eq!(finalized.y.min, 2.0);
    }

    #[test]
    fn gpkg_empty_point_sets_empty_flag_s4() {
        let mut stream = BinaryStream::with_capacity(64);
        let mut writer = BlobWriter::new(&mut stream, BlobDialect::Gpkg, 0);
        let header = GeometryHeader::new(GeomType::Point, CoordType::Xy);
        writer.begin().unwrap();
        writer.begin_geometry(header).unwrap();
        writer.end_geometry(header).unwrap();
        writer.end().unwrap();
        let bytes = stream.as_slice().to_vec();
        let mut round = BinaryStream::from_slice(&bytes);
        let mut env = EnvelopeAccumulator::new();
        let parsed = read_gpkg_blob(&mut round, &mut env).unwrap();
        assert!(parsed.empty);
        assert!(env.finalize().1);
    }

    #[test]
    fn gpkg_linestring_carries_envelope() {
        let mut stream = BinaryStream::with_capacity(128);
        let mut writer = BlobWriter::new(&mut stream, BlobDialect::Gpkg, 0);
        let header = GeometryHeader::new(GeomType::LineString, CoordType::Xy);
        writer.begin().unwrap();
        writer.begin_geometry(header).unwrap();
        writer
            .coordinates(header, 2, &[1.0, 2.0, 3.0, 4.0], 0)
            .unwrap();
        writer.end_geometry(header).unwrap();
        writer.end().unwrap();
        let bytes = stream.as_slice().to_vec();
        let mut round = BinaryStream::from_slice(&bytes);
        let mut env = EnvelopeAccumulator::new();
        let parsed = read_gpkg_blob(&mut round, &mut env).unwrap();
        assert!(parsed.envelope.x.present);
        assert_eq!((parsed.envelope.x.min, parsed.envelope.x.max), (1.0, 3.0));
        assert_eq!((parsed.envelope.y.min, parsed.envelope.y.max), (2.0, 4.0));
    }

    #[test]
    fn gpkg_collection_round_trips_nested_members_s5() {
        let mut stream = BinaryStream::with_capacity(256);
        let mut writer = BlobWriter::new(&mut stream, BlobDialect::Gpkg, 0);
        let gc = GeometryHeader::new(GeomType::GeometryCollection, CoordType::Xy);
        let pt = GeometryHeader::new(GeomType::Point, CoordType::Xy);
        let ls = GeometryHeader::new(GeomType::LineString, CoordType::Xy);
        writer.begin().unwrap();
        writer.begin_geometry(gc).unwrap();
        writer.begin_geometry(pt).unwrap();
        writer.coordinates(pt, 1, &[1.0, 2.0], 0).unwrap();
        writer.end_geometry(pt).unwrap();
        writer.begin_geometry(ls).unwrap();
        writer
            .coordinates(ls, 2, &[3.0, 4.0, 5.0, 6.0], 0)
            .unwrap();
        writer.end_geometry(ls).unwrap();
        writer.end_geometry(gc).unwrap();
        writer.end().unwrap();
        let bytes = stream.as_slice().to_vec();

        let mut round = BinaryStream::from_slice(&bytes);
        let mut env = EnvelopeAccumulator::new();
        read_gpkg_blob(&mut round, &mut env).unwrap();
        let (finalized, empty) = env.finalize();
        assert!(!empty);
        assert_eq!((finalized.x.min, finalized.x.max), (1.0, 5.0));
        assert_eq!((finalized.y.min, finalized.y.max), (2.0, 6.0));
    }

    #[test]
    fn spatialite_point_round_trips() {
        let bytes = write_point(BlobDialect::SpatiaLite, 4326, (1.0, 2.0));
        assert_eq!(bytes[0], 0x00);
        assert_eq!(*bytes.last().unwrap(), 0xFE);
        let mut stream = BinaryStream::from_slice(&bytes);
        let mut env = EnvelopeAccumulator::new();
        let header = read_spatialite_blob(&mut stream, &mut env).unwrap();
        assert_eq!(header.srid, 4326);
        assert_eq!((header.envelope.x.min, header.envelope.x.max), (1.0, 1.0));
        let (finalized, _) = env.finalize();
        assert_eq!(finalized.x.min, 1.0);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let bytes = vec![b'X', b'X', 0, 0, 0, 0, 0, 0];
        let mut stream = BinaryStream::from_slice(&bytes);
        assert!(matches!(
            read_gpkg_header(&mut stream),
            Err(GpkgError::BadMagic(_))
        ));
    }

    #[test]
    fn envelope_with_min_greater_than_max_is_rejected() {
        let mut stream = BinaryStream::with_capacity(64);
        stream.write_nu8(&GPKG_MAGIC).unwrap();
        stream.write_u8(0).unwrap();
        stream.write_u8(0b0000_0011).unwrap(); // shape=1 (XY), little-endian
        stream.write_i32(0).unwrap();
        stream.write_double(5.0).unwrap(); // minx
        stream.write_double(1.0).unwrap(); // maxx < minx
        stream.write_double(0.0).unwrap();
        stream.write_double(0.0).unwrap();
        stream.flip();
        assert!(matches!(
            read_gpkg_header(&mut stream),
            Err(GpkgError::BadEnvelope(_))
        ));
    }
}
