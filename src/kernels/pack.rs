//! Per-encoding unpack and pack codecs.
//!
//! Integer encodings unpack to native S32 with the significant bits aligned
//! to the top of the word; unsigned encodings have their sign bit flipped so
//! silence becomes zero. Packing shifts back down, truncating anything below
//! the target depth. Float encodings unpack to native F64.

use super::Lane;

/// Conversion between one wire encoding and its canonical working encoding.
pub(crate) trait SampleCodec: Send + Sync {
    /// Decode `elements` wire samples into the canonical encoding.
    fn unpack(&self, lane: &mut Lane<'_>, elements: usize);

    /// Encode `elements` canonical samples into the wire encoding.
    fn pack(&self, lane: &mut Lane<'_>, elements: usize);
}

/// Integer codec, parameterized by container size, depth, sign and byte order.
pub(crate) struct IntCodec {
    pub(crate) bytes: usize,
    pub(crate) depth: u32,
    pub(crate) signed: bool,
    pub(crate) big_endian: bool,
}

impl IntCodec {
    #[inline]
    fn load(&self, raw: &[u8]) -> u32 {
        if self.big_endian {
            raw.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32)
        } else {
            raw.iter().rev().fold(0u32, |acc, &b| (acc << 8) | b as u32)
        }
    }

    #[inline]
    fn store(&self, value: u32, out: &mut [u8; 4]) -> usize {
        for i in 0..self.bytes {
            let shift = if self.big_endian {
                8 * (self.bytes - 1 - i)
            } else {
                8 * i
            };
            out[i] = (value >> shift) as u8;
        }
        self.bytes
    }
}

impl SampleCodec for IntCodec {
    fn unpack(&self, lane: &mut Lane<'_>, elements: usize) {
        let shift = 32 - self.depth;
        for i in 0..elements {
            let offset = i * self.bytes;
            let raw = self.load(&lane.src()[offset..offset + self.bytes]);
            let mut value = raw << shift;
            if !self.signed {
                value ^= 0x8000_0000;
            }
            lane.write(i * 4, &value.to_ne_bytes());
        }
    }

    fn pack(&self, lane: &mut Lane<'_>, elements: usize) {
        let shift = 32 - self.depth;
        let mut out = [0u8; 4];
        for i in 0..elements {
            let value = lane.read_i32(i * 4);
            let value = if self.signed {
                (value >> shift) as u32
            } else {
                ((value as u32) ^ 0x8000_0000) >> shift
            };
            let len = self.store(value, &mut out);
            lane.write(i * self.bytes, &out[..len]);
        }
    }
}

/// Float codec for 32- and 64-bit IEEE encodings in either byte order.
pub(crate) struct FloatCodec {
    pub(crate) bytes: usize,
    pub(crate) big_endian: bool,
}

impl SampleCodec for FloatCodec {
    fn unpack(&self, lane: &mut Lane<'_>, elements: usize) {
        for i in 0..elements {
            let offset = i * self.bytes;
            let src = &lane.src()[offset..offset + self.bytes];
            let value = if self.bytes == 4 {
                let raw = [src[0], src[1], src[2], src[3]];
                let v = if self.big_endian {
                    f32::from_be_bytes(raw)
                } else {
                    f32::from_le_bytes(raw)
                };
                v as f64
            } else {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(src);
                if self.big_endian {
                    f64::from_be_bytes(raw)
                } else {
                    f64::from_le_bytes(raw)
                }
            };
            lane.write(i * 8, &value.to_ne_bytes());
        }
    }

    fn pack(&self, lane: &mut Lane<'_>, elements: usize) {
        for i in 0..elements {
            let value = lane.read_f64(i * 8);
            let offset = i * self.bytes;
            if self.bytes == 4 {
                let v = value as f32;
                let raw = if self.big_endian {
                    v.to_be_bytes()
                } else {
                    v.to_le_bytes()
                };
                lane.write(offset, &raw);
            } else {
                let raw = if self.big_endian {
                    value.to_be_bytes()
                } else {
                    value.to_le_bytes()
                };
                lane.write(offset, &raw);
            }
        }
    }
}
