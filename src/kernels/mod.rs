//! Numeric kernels used by the conversion stages.
//!
//! Every kernel works on byte views of caller or scratch memory and reads
//! and writes samples with native-endian `from_ne_bytes`/`to_ne_bytes`, so
//! no alignment is required of the buffers.
//!
//! - [`pack`]: per-encoding unpack/pack codecs
//! - [`convert`]: bulk S32 ↔ F64 conversion
//! - [`mix`]: channel-mix matrix derivation and application
//! - [`quantize`]: bit-depth reduction with dither and noise shaping
//!
//! A kernel either reads from a distinct source and writes a destination, or
//! rewrites one buffer in place. In-place kernels walk the elements forward,
//! which is safe whenever an output element is no wider than its input
//! element.

pub(crate) mod convert;
pub mod mix;
pub(crate) mod pack;
pub mod quantize;

use smallvec::SmallVec;

pub use mix::ChannelMix;
pub use quantize::Quantizer;

/// Block list sized for the common case of up to 8 planar channels.
pub(crate) type Blocks<'a> = SmallVec<[&'a [u8]; 8]>;

/// Mutable block list.
pub(crate) type BlocksMut<'a> = SmallVec<[&'a mut [u8]; 8]>;

/// One block of samples, split into source and destination or shared in place.
pub(crate) struct Lane<'a> {
    src: Option<&'a [u8]>,
    dst: &'a mut [u8],
}

impl<'a> Lane<'a> {
    pub(crate) fn split(src: &'a [u8], dst: &'a mut [u8]) -> Self {
        Self {
            src: Some(src),
            dst,
        }
    }

    pub(crate) fn in_place(buf: &'a mut [u8]) -> Self {
        Self { src: None, dst: buf }
    }

    /// Bytes to read from.
    #[inline]
    pub(crate) fn src(&self) -> &[u8] {
        match self.src {
            Some(src) => src,
            None => &*self.dst,
        }
    }

    #[inline]
    pub(crate) fn write(&mut self, offset: usize, bytes: &[u8]) {
        self.dst[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    #[inline]
    pub(crate) fn read_i32(&self, offset: usize) -> i32 {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.src()[offset..offset + 4]);
        i32::from_ne_bytes(raw)
    }

    #[inline]
    pub(crate) fn read_f64(&self, offset: usize) -> f64 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.src()[offset..offset + 8]);
        f64::from_ne_bytes(raw)
    }
}

/// A set of blocks (one for interleaved data, one per channel for planar).
pub(crate) struct Planes<'a> {
    src: Option<Blocks<'a>>,
    dst: BlocksMut<'a>,
}

impl<'a> Planes<'a> {
    pub(crate) fn split(src: Blocks<'a>, dst: BlocksMut<'a>) -> Self {
        Self {
            src: Some(src),
            dst,
        }
    }

    pub(crate) fn in_place(dst: BlocksMut<'a>) -> Self {
        Self { src: None, dst }
    }

    /// Per-block view, for kernels that treat blocks independently.
    pub(crate) fn lane(&mut self, block: usize) -> Lane<'_> {
        match &self.src {
            Some(src) => Lane::split(src[block], &mut *self.dst[block]),
            None => Lane::in_place(&mut *self.dst[block]),
        }
    }

    #[inline]
    pub(crate) fn read_i32(&self, block: usize, offset: usize) -> i32 {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.src_block(block)[offset..offset + 4]);
        i32::from_ne_bytes(raw)
    }

    #[inline]
    pub(crate) fn read_f64(&self, block: usize, offset: usize) -> f64 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.src_block(block)[offset..offset + 8]);
        f64::from_ne_bytes(raw)
    }

    #[inline]
    pub(crate) fn write(&mut self, block: usize, offset: usize, bytes: &[u8]) {
        self.dst[block][offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    fn src_block(&self, block: usize) -> &[u8] {
        match &self.src {
            Some(src) => src[block],
            None => &*self.dst[block],
        }
    }
}
