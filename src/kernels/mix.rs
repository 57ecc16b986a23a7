//! Channel mixing.
//!
//! [`ChannelMix`] derives a gain matrix from the input and output channel
//! positions once, then applies it frame by frame to F64 samples.

use crate::format::{AudioLayout, ChannelPosition};

use super::Planes;

/// -3 dB, used when folding one channel into a pair.
const HALF_POWER: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Channel-mix matrix between two channel sets.
#[derive(Debug, Clone)]
pub struct ChannelMix {
    in_channels: usize,
    out_channels: usize,
    /// `matrix[out][in]` gain.
    matrix: Vec<Vec<f64>>,
    passthrough: bool,
    frame: Vec<f64>,
}

impl ChannelMix {
    /// Derive the mix between two channel sets. `None` positions mean the
    /// channels are unpositioned; an unpositioned side only maps 1:1 onto a
    /// set of the same size.
    pub fn new(
        in_positions: Option<&[ChannelPosition]>,
        in_channels: usize,
        out_positions: Option<&[ChannelPosition]>,
        out_channels: usize,
    ) -> Self {
        let matrix = match (in_positions, out_positions) {
            (Some(inp), Some(outp)) if inp != outp => derive_matrix(inp, outp),
            _ => identity(in_channels, out_channels),
        };
        let passthrough = in_channels == out_channels
            && matrix.iter().enumerate().all(|(o, row)| {
                row.iter()
                    .enumerate()
                    .all(|(i, &gain)| gain == if i == o { 1.0 } else { 0.0 })
            });

        Self {
            in_channels,
            out_channels,
            matrix,
            passthrough,
            frame: vec![0.0; in_channels],
        }
    }

    /// Returns true when mixing would not change any sample.
    pub fn is_passthrough(&self) -> bool {
        self.passthrough
    }

    /// Number of input channels.
    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    /// Number of output channels.
    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    /// Gain matrix, indexed `[out][in]`.
    pub fn matrix(&self) -> &[Vec<f64>] {
        &self.matrix
    }

    /// Mix `frames` frames of F64 samples.
    ///
    /// When the output has more channels than the input the frames are
    /// walked backward, so the mix can expand in place inside one buffer.
    pub(crate) fn mix(&mut self, planes: &mut Planes<'_>, layout: AudioLayout, frames: usize) {
        let Self {
            in_channels,
            out_channels,
            matrix,
            frame,
            ..
        } = self;
        let (in_channels, out_channels) = (*in_channels, *out_channels);
        let interleaved = layout == AudioLayout::Interleaved;

        let mut mix_frame = |n: usize| {
            for (c, sample) in frame.iter_mut().enumerate() {
                *sample = if interleaved {
                    planes.read_f64(0, (n * in_channels + c) * 8)
                } else {
                    planes.read_f64(c, n * 8)
                };
            }
            for (o, row) in matrix.iter().enumerate() {
                let value: f64 = row.iter().zip(frame.iter()).map(|(g, s)| g * s).sum();
                if interleaved {
                    planes.write(0, (n * out_channels + o) * 8, &value.to_ne_bytes());
                } else {
                    planes.write(o, n * 8, &value.to_ne_bytes());
                }
            }
        };

        if out_channels > in_channels {
            (0..frames).rev().for_each(&mut mix_frame);
        } else {
            (0..frames).for_each(&mut mix_frame);
        }
    }
}

fn identity(in_channels: usize, out_channels: usize) -> Vec<Vec<f64>> {
    (0..out_channels)
        .map(|o| {
            (0..in_channels)
                .map(|i| if i == o { 1.0 } else { 0.0 })
                .collect()
        })
        .collect()
}

const MONO: &[ChannelPosition] = &[ChannelPosition::Mono];
const CENTER: &[ChannelPosition] = &[ChannelPosition::FrontCenter];
const LEFT: &[ChannelPosition] = &[ChannelPosition::FrontLeft];
const RIGHT: &[ChannelPosition] = &[ChannelPosition::FrontRight];
const FRONT: &[ChannelPosition] = &[ChannelPosition::FrontLeft, ChannelPosition::FrontRight];
const REAR_LEFT: &[ChannelPosition] = &[ChannelPosition::RearLeft];
const REAR_RIGHT: &[ChannelPosition] = &[ChannelPosition::RearRight];
const REAR: &[ChannelPosition] = &[ChannelPosition::RearLeft, ChannelPosition::RearRight];
const SIDE_LEFT: &[ChannelPosition] = &[ChannelPosition::SideLeft];
const SIDE_RIGHT: &[ChannelPosition] = &[ChannelPosition::SideRight];
const SIDE: &[ChannelPosition] = &[ChannelPosition::SideLeft, ChannelPosition::SideRight];
const LFE1: &[ChannelPosition] = &[ChannelPosition::Lfe1];
const LFE2: &[ChannelPosition] = &[ChannelPosition::Lfe2];

/// Candidate destinations for an input channel with no counterpart in the
/// output, in order of preference. The first group whose positions all exist
/// in the output receives the channel at the given gain.
fn fold_targets(position: ChannelPosition) -> &'static [(&'static [ChannelPosition], f64)] {
    use ChannelPosition::*;

    match position {
        Mono => &[(FRONT, 1.0), (CENTER, 1.0)],
        FrontLeft | FrontRight => &[(CENTER, HALF_POWER), (MONO, 1.0)],
        FrontCenter => &[(FRONT, HALF_POWER), (MONO, 1.0)],
        FrontLeftOfCenter => &[(LEFT, 1.0), (CENTER, 1.0), (MONO, 1.0)],
        FrontRightOfCenter => &[(RIGHT, 1.0), (CENTER, 1.0), (MONO, 1.0)],
        RearLeft => &[(SIDE_LEFT, 1.0), (LEFT, HALF_POWER), (MONO, HALF_POWER)],
        RearRight => &[(SIDE_RIGHT, 1.0), (RIGHT, HALF_POWER), (MONO, HALF_POWER)],
        SideLeft => &[(REAR_LEFT, 1.0), (LEFT, HALF_POWER), (MONO, HALF_POWER)],
        SideRight => &[(REAR_RIGHT, 1.0), (RIGHT, HALF_POWER), (MONO, HALF_POWER)],
        RearCenter => &[
            (REAR, HALF_POWER),
            (SIDE, HALF_POWER),
            (FRONT, HALF_POWER),
            (CENTER, HALF_POWER),
            (MONO, HALF_POWER),
        ],
        Lfe1 | Lfe2 => &[
            (LFE1, 1.0),
            (LFE2, 1.0),
            (CENTER, HALF_POWER),
            (FRONT, HALF_POWER),
            (MONO, HALF_POWER),
        ],
    }
}

fn derive_matrix(inp: &[ChannelPosition], outp: &[ChannelPosition]) -> Vec<Vec<f64>> {
    let mut matrix = vec![vec![0.0; inp.len()]; outp.len()];

    for (i, position) in inp.iter().enumerate() {
        if let Some(o) = outp.iter().position(|p| p == position) {
            matrix[o][i] = 1.0;
            continue;
        }
        let group = fold_targets(*position)
            .iter()
            .find(|(targets, _)| targets.iter().all(|t| outp.contains(t)));
        if let Some((targets, gain)) = group {
            for target in targets.iter() {
                if let Some(o) = outp.iter().position(|p| p == target) {
                    matrix[o][i] += gain;
                }
            }
        }
    }

    // Keep every output at or below unity gain.
    let loudest = matrix
        .iter()
        .map(|row| row.iter().sum::<f64>())
        .fold(0.0, f64::max);
    if loudest > 1.0 {
        for gain in matrix.iter_mut().flatten() {
            *gain /= loudest;
        }
    }
    matrix
}
