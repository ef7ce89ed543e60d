//! Seekable byte buffer with endianness and growable/fixed modes (§4.1).
//!
//! Grounded on `original_source/gpkg/binstream.h`'s `binstream_t` state (`data`, `limit`,
//! `limit_set`, `position`, `capacity`, `endianness`, `growable`) — no example repo carries
//! an equivalent abstraction, since `geozero`'s codecs read/write directly against
//! `std::io::Read`/`Write` plus `scroll`, which assumes a caller-managed cursor and exposes
//! neither growable capacity nor backward seek. [`byteorder`] (already a teacher dependency)
//! does the actual bit-pattern encode/decode at each endianness.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{GpkgError, Result};

/// Byte order used to encode/decode multi-byte fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Default for Endian {
    fn default() -> Self {
        Endian::Little
    }
}

/// A seekable byte buffer, either a fixed caller-owned slice or a growable heap buffer.
///
/// Invariant: `0 <= position <= length <= capacity`. When fixed, `length == capacity` and
/// writes past `capacity` fail; when growable, writes grow the backing `Vec` by ×1.5 or to
/// the exact need, whichever is larger.
#[derive(Debug, Clone)]
pub struct BinaryStream {
    data: Vec<u8>,
    length: usize,
    position: usize,
    endian: Endian,
    growable: bool,
}

impl BinaryStream {
    /// Wrap an externally owned byte slice as a fixed, read-oriented stream.
    pub fn from_slice(data: &[u8]) -> Self {
        BinaryStream {
            data: data.to_vec(),
            length: data.len(),
            position: 0,
            endian: Endian::default(),
            growable: false,
        }
    }

    /// Consume a `Vec<u8>` as a fixed stream without copying.
    pub fn from_vec_fixed(data: Vec<u8>) -> Self {
        let length = data.len();
        BinaryStream {
            data,
            length,
            position: 0,
            endian: Endian::default(),
            growable: false,
        }
    }

    /// A growable stream with a given initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        BinaryStream {
            data: Vec::with_capacity(capacity),
            length: 0,
            position: 0,
            endian: Endian::default(),
            growable: true,
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    fn remaining(&self) -> usize {
        self.length - self.position
    }

    fn ensure_room(&mut self, additional: usize) -> Result<()> {
        let needed_len = self.position + additional;
        if needed_len <= self.length {
            return Ok(());
        }
        if needed_len > self.data.len() {
            if !self.growable {
                return Err(GpkgError::SeekPastLimit(needed_len));
            }
            let grown = ((self.data.len() as f64) * 1.5).ceil() as usize;
            let new_cap = grown.max(needed_len);
            self.data.resize(new_cap, 0);
        }
        self.length = needed_len;
        Ok(())
    }

    /// Absolute seek. On a growable stream, seeking past `length` grows the buffer and
    /// advances `length`; on a fixed stream this is rejected.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.length {
            if !self.growable {
                return Err(GpkgError::SeekPastLimit(pos));
            }
            self.ensure_room(pos - self.length)?;
        }
        self.position = pos;
        Ok(())
    }

    /// Relative seek; rejects a `delta` that would move `position` below zero.
    pub fn relseek(&mut self, delta: i64) -> Result<()> {
        let new_pos = self.position as i64 + delta;
        if new_pos < 0 {
            return Err(GpkgError::NegativeSeek);
        }
        self.seek(new_pos as usize)
    }

    /// Set `length = position; position = 0`. The contract a writer uses to hand off a
    /// completed buffer to a reader or caller.
    pub fn flip(&mut self) {
        self.length = self.position;
        self.position = 0;
    }

    /// `data[position..length]`. Callers must not retain this across growing writes.
    pub fn data_pointer(&self) -> &[u8] {
        &self.data[self.position..self.length]
    }

    /// The full `[0..length]` view, typically read after `flip`.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.length]
    }

    pub fn into_vec(mut self) -> Vec<u8> {
        self.data.truncate(self.length);
        self.data
    }

    fn require(&self, n: usize) -> Result<()> {
        if self.remaining() < n {
            Err(GpkgError::Truncated {
                needed: n - self.remaining(),
            })
        } else {
            Ok(())
        }
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.require(1)?;
        let v = self.data[self.position];
        self.position += 1;
        Ok(v)
    }

    pub fn read_nu8(&mut self, n: usize) -> Result<Vec<u8>> {
        self.require(n)?;
        let v = self.data[self.position..self.position + n].to_vec();
        self.position += n;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.require(4)?;
        let v = match self.endian {
            Endian::Little => LittleEndian::read_u32(&self.data[self.position..]),
            Endian::Big => BigEndian::read_u32(&self.data[self.position..]),
        };
        self.position += 4;
        Ok(v)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.require(4)?;
        let v = match self.endian {
            Endian::Little => LittleEndian::read_i32(&self.data[self.position..]),
            Endian::Big => BigEndian::read_i32(&self.data[self.position..]),
        };
        self.position += 4;
        Ok(v)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.require(8)?;
        let v = match self.endian {
            Endian::Little => LittleEndian::read_u64(&self.data[self.position..]),
            Endian::Big => BigEndian::read_u64(&self.data[self.position..]),
        };
        self.position += 8;
        Ok(v)
    }

    /// IEEE-754 double: the bit pattern is read as a 64-bit integer and reinterpreted.
    pub fn read_double(&mut self) -> Result<f64> {
        let bits = self.read_u64()?;
        Ok(f64::from_bits(bits))
    }

    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        self.ensure_room(1)?;
        self.data[self.position] = v;
        self.position += 1;
        Ok(())
    }

    pub fn write_nu8(&mut self, v: &[u8]) -> Result<()> {
        self.ensure_room(v.len())?;
        self.data[self.position..self.position + v.len()].copy_from_slice(v);
        self.position += v.len();
        Ok(())
    }

    pub fn write_u32(&mut self, v: u32) -> Result<()> {
        self.ensure_room(4)?;
        match self.endian {
            Endian::Little => LittleEndian::write_u32(&mut self.data[self.position..], v),
            Endian::Big => BigEndian::write_u32(&mut self.data[self.position..], v),
        }
        self.position += 4;
        Ok(())
    }

    pub fn write_i32(&mut self, v: i32) -> Result<()> {
        self.ensure_room(4)?;
        match self.endian {
            Endian::Little => LittleEndian::write_i32(&mut self.data[self.position..], v),
            Endian::Big => BigEndian::write_i32(&mut self.data[self.position..], v),
        }
        self.position += 4;
        Ok(())
    }

    pub fn write_u64(&mut self, v: u64) -> Result<()> {
        self.ensure_room(8)?;
        match self.endian {
            Endian::Little => LittleEndian::write_u64(&mut self.data[self.position..], v),
            Endian::Big => BigEndian::write_u64(&mut self.data[self.position..], v),
        }
        self.position += 8;
        Ok(())
    }

    pub fn write_double(&mut self, v: f64) -> Result<()> {
        self.write_u64(v.to_bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growable_round_trip() {
        let mut s = BinaryStream::with_capacity(8);
        s.write_u8(1).unwrap();
        s.write_u32(0xdead_beef).unwrap();
        s.write_double(1.5).unwrap();
        s.flip();
        assert_eq!(s.read_u8().unwrap(), 1);
        assert_eq!(s.read_u32().unwrap(), 0xdead_beef);
        assert_eq!(s.read_double().unwrap(), 1.5);
    }

    #[test]
    fn fixed_write_past_capacity_fails() {
        let mut s = BinaryStream::from_vec_fixed(vec![0; 2]);
        assert!(s.write_u32(1).is_err());
    }

    #[test]
    fn fixed_seek_past_length_fails() {
        let mut s = BinaryStream::from_slice(&[1, 2, 3]);
        assert!(matches!(s.seek(10), Err(GpkgError::SeekPastLimit(10))));
    }

    #[test]
    fn relseek_below_zero_fails() {
        let mut s = BinaryStream::from_slice(&[1, 2, 3]);
        assert!(matches!(s.relseek(-1), Err(GpkgError::NegativeSeek)));
    }

    #[test]
    fn endian_toggle_affects_subsequent_reads() {
        let mut s = BinaryStream::from_slice(&[0x00, 0x00, 0x00, 0x01]);
        s.set_endian(Endian::Big);
        assert_eq!(s.read_u32().unwrap(), 1);
    }

    #[test]
    fn truncated_read_reports_needed_bytes() {
        let mut s = BinaryStream::from_slice(&[0x01]);
        match s.read_u32() {
            Err(GpkgError::Truncated { needed }) => assert_eq!(needed, 3),
            other => panic!("expected Truncated, got {other:?}"),
        }
    }
}
