use crate::error::{GpkgError, Result};
use crate::geometry::{GeomConsumer, GeomType, GeometryHeader, GEOM_MAX_DEPTH};
use crate::stream::{BinaryStream, Endian};
use crate::wkb::{WkbDialect, SPATIALITE_SUB_MARKER, SPATIALITE_TRAILER};

/// Two-pass WKB writer: `begin_geometry` reserves header space before the child count is
/// known, `coordinates` streams ordinates through, `end_geometry` seeks back and patches
/// the header once the count is known (§4.5, §9 "two-pass writing with seek-back").
pub struct WkbWriter<'a> {
    pub(crate) stream: &'a mut BinaryStream,
    pub(crate) dialect: WkbDialect,
    /// Stack of stream positions where each open geometry's header begins. `blob::BlobWriter`
    /// threads this through its own reborrow of the writer (§9 two-pass writing).
    pub(crate) start: Vec<usize>,
    pub(crate) children: Vec<u32>,
}

impl<'a> WkbWriter<'a> {
    pub fn new(stream: &'a mut BinaryStream, dialect: WkbDialect) -> Self {
        WkbWriter {
            stream,
            dialect,
            start: Vec::new(),
            children: Vec::new(),
        }
    }
}

impl GeomConsumer for WkbWriter<'_> {
    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        if self.dialect == WkbDialect::SpatiaLite {
            self.stream.write_u8(SPATIALITE_TRAILER)?;
        }
        self.stream.flip();
        Ok(())
    }

    fn begin_geometry(&mut self, header: GeometryHeader) -> Result<()> {
        if self.start.len() > GEOM_MAX_DEPTH {
            return Err(GpkgError::DepthOverflow(self.start.len()));
        }
        if let Some(parent_children) = self.children.last_mut() {
            *parent_children += 1;
        }
        let is_root = self.start.is_empty();
        let header_size: i64 = match header.geom_type {
            GeomType::Point => 5,
            GeomType::LinearRing => {
                if is_root {
                    9
                } else {
                    4
                }
            }
            _ => 9,
        };
        self.start.push(self.stream.position());
        self.children.push(0);
        self.stream.relseek(header_size)
    }

    fn coordinates(
        &mut self,
        header: GeometryHeader,
        point_count: usize,
        coords: &[f64],
        skip_count: usize,
    ) -> Result<()> {
        let stride = header.ordinate_count();
        let skip_points = skip_count / stride;
        let new_points = point_count - skip_points;
        for v in &coords[skip_count..skip_count + new_points * stride] {
            self.stream.write_double(*v)?;
        }
        if let Some(children) = self.children.last_mut() {
            *children += new_points as u32;
        }
        Ok(())
    }

    fn end_geometry(&mut self, header: GeometryHeader) -> Result<()> {
        let current_pos = self.stream.position();
        let children = self
            .children
            .pop()
            .expect("end_geometry without a matching begin_geometry");
        let start = self
            .start
            .pop()
            .expect("end_geometry without a matching begin_geometry");
        let depth = self.start.len();

        if header.geom_type == GeomType::LinearRing && depth > 0 {
            // A nested ring emits only its point count; its framing is the parent's.
            self.stream.seek(start)?;
            self.stream.write_u32(children)?;
            self.stream.seek(current_pos)?;
            return Ok(());
        }

        if matches!(
            header.geom_type,
            GeomType::Geometry | GeomType::Surface | GeomType::Curve
        ) {
            return Err(GpkgError::Format {
                column: start,
                message: format!(
                    "{:?} has no WKB wire representation of its own",
                    header.geom_type
                ),
            });
        }

        // A root-level linear ring has no WKB encoding; silently promote it to LineString.
        let wire_type = if header.geom_type == GeomType::LinearRing {
            GeomType::LineString
        } else {
            header.geom_type
        };

        self.stream.seek(start)?;
        let marker = match self.dialect {
            WkbDialect::Iso => {
                if self.stream.endian() == Endian::Little {
                    1
                } else {
                    0
                }
            }
            WkbDialect::SpatiaLite => {
                if depth == 0 {
                    0x7C
                } else {
                    SPATIALITE_SUB_MARKER
                }
            }
        };
        self.stream.write_u8(marker)?;
        self.stream
            .write_u32(wire_type.wkb_base_code() + header.coord_type.wkb_modifier())?;

        let mut final_pos = current_pos;
        if wire_type == GeomType::Point {
            if children == 0 {
                for _ in 0..header.ordinate_count() {
                    self.stream.write_double(f64::NAN)?;
                }
                final_pos = self.stream.position();
            }
        } else {
            self.stream.write_u32(children)?;
        }
        self.stream.seek(final_pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::CoordType;
    use crate::wkb::read_geometry;

    #[test]
    fn point_round_trips_byte_for_byte_s1() {
        let expected =
            hex::decode("0101000000000000000000F03F0000000000000040").unwrap();
        let mut stream = BinaryStream::with_capacity(32);
        let mut writer = WkbWriter::new(&mut stream, WkbDialect::Iso);
        let header = GeometryHeader::new(GeomType::Point, CoordType::Xy);
        writer.begin().unwrap();
        writer.begin_geometry(header).unwrap();
        writer
            .coordinates(header, 1, &[1.0, 2.0], 0)
            .unwrap();
        writer.end_geometry(header).unwrap();
        writer.end().unwrap();
        assert_eq!(stream.as_slice(), expected.as_slice());
    }

    #[test]
    fn empty_point_writes_nan_ordinates() {
        let mut stream = BinaryStream::with_capacity(32);
        let mut writer = WkbWriter::new(&mut stream, WkbDialect::Iso);
        let header = GeometryHeader::new(GeomType::Point, CoordType::Xy);
        writer.begin().unwrap();
        writer.begin_geometry(header).unwrap();
        writer.end_geometry(header).unwrap();
        writer.end().unwrap();
        let bytes = stream.as_slice().to_vec();
        let mut round = BinaryStream::from_slice(&bytes);
        let mut env = crate::envelope::EnvelopeAccumulator::new();
        read_geometry(&mut round, WkbDialect::Iso, &mut env).unwrap();
        assert!(env.finalize().1);
    }

    #[test]
    fn wkb_reader_writer_byte_exact_round_trip() {
        // S3: LineString(1 2, 3 4)
        let hex_str = concat!(
            "010200000002000000",
            "000000000000F03F",
            "0000000000000040",
            "0000000000000840",
            "0000000000001040",
        );
        let expected = hex::decode(hex_str).unwrap();
        let mut stream = BinaryStream::from_slice(&expected);
        let mut out_stream = BinaryStream::with_capacity(64);
        let mut writer = WkbWriter::new(&mut out_stream, WkbDialect::Iso);
        read_geometry(&mut stream, WkbDialect::Iso, &mut writer).unwrap();
        assert_eq!(out_stream.as_slice(), expected.as_slice());
    }
}
