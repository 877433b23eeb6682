// Copyright (c) 2024-2025, The lfif contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Coefficient coding over the diagonal scan.
//!
//! Each block is coded in two passes:
//!
//! 1. A presence pass over diagonals 0, 1, .. signalling which diagonals hold
//!    any nonzero level, and a "last" flag on each nonzero one so that the
//!    decoder knows where to stop.
//! 2. A coefficient pass from the last nonzero diagonal back down to 0, coding
//!    significance, sign and magnitude of each level in the nonzero diagonals.
//!
//! Significance contexts depend on which side of an adaptive diagonal
//! threshold the diagonal sits, and on how many of the coefficient's forward
//! neighbours (one step up along each axis, so already coded) are nonzero.
//! The threshold moves by one after every coded diagonal and carries over from
//! block to block for the whole stream.

use crate::cabac::{CabacDecoder, CabacEncoder, ContextModel};
use crate::ndarray::NdArray;
use crate::scan::ScanTable;

const REMAINDER_CONTEXTS: usize = 32;

struct CoeffContexts {
  diag_nonzero: Vec<ContextModel>,
  diag_last: Vec<ContextModel>,
  // [side of threshold][number of nonzero forward neighbours]
  significant: [Vec<ContextModel>; 2],
  gt1: [ContextModel; 2],
  gt2: [ContextModel; 2],
  remainder: [[ContextModel; REMAINDER_CONTEXTS]; 2],
}

impl CoeffContexts {
  fn new(num_diagonals: usize, ndim: usize) -> Self {
    Self {
      diag_nonzero: vec![ContextModel::new(); num_diagonals],
      diag_last: vec![ContextModel::new(); num_diagonals],
      significant: [vec![ContextModel::new(); ndim + 1], vec![ContextModel::new(); ndim + 1]],
      gt1: [ContextModel::new(); 2],
      gt2: [ContextModel::new(); 2],
      remainder: [[ContextModel::new(); REMAINDER_CONTEXTS]; 2],
    }
  }
}

pub struct CoeffCoder {
  scan: ScanTable,
  extents: Vec<usize>,
  strides: Vec<usize>,
  ctx: CoeffContexts,
  threshold: usize,
}

impl CoeffCoder {
  pub fn new(block_extents: &[usize]) -> Self {
    let scan = ScanTable::new(block_extents);
    let num_diagonals = scan.num_diagonals();
    let mut strides = Vec::with_capacity(block_extents.len());
    let mut stride = 1;
    for &n in block_extents {
      strides.push(stride);
      stride *= n;
    }

    Self {
      ctx: CoeffContexts::new(num_diagonals, block_extents.len()),
      extents: block_extents.to_vec(),
      strides: strides,
      threshold: num_diagonals / 2,
      scan: scan
    }
  }

  pub fn threshold(&self) -> usize {
    self.threshold
  }

  pub fn num_diagonals(&self) -> usize {
    self.scan.num_diagonals()
  }

  // Count nonzero levels one step forward along each axis
  fn forward_neighbours(&self, levels: &NdArray<i32>, index: usize) -> usize {
    let mut count = 0;
    for axis in 0..self.extents.len() {
      let coord = (index / self.strides[axis]) % self.extents[axis];
      if coord + 1 < self.extents[axis] && levels[index + self.strides[axis]] != 0 {
        count += 1;
      }
    }
    count
  }

  fn adapt_threshold(&mut self, diagonal: usize, zeros: usize, nonzeros: usize) {
    if zeros > nonzeros && diagonal < self.threshold && self.threshold > 0 {
      self.threshold -= 1;
    } else if nonzeros > zeros && diagonal >= self.threshold && self.threshold < self.num_diagonals() {
      self.threshold += 1;
    }
  }

  pub fn encode_block(&mut self, enc: &mut CabacEncoder, levels: &NdArray<i32>) {
    assert!(levels.extents() == self.scan.extents());
    let num_diagonals = self.num_diagonals();

    let nonzero: Vec<bool> = (0..num_diagonals)
      .map(|d| self.scan.diagonal(d).iter().any(|&i| levels[i] != 0))
      .collect();
    let last = nonzero.iter().rposition(|&nz| nz);

    // Presence pass
    for d in 0..num_diagonals {
      enc.encode_bit(&mut self.ctx.diag_nonzero[d], nonzero[d] as u8);
      if nonzero[d] {
        let is_last = last == Some(d);
        enc.encode_bit(&mut self.ctx.diag_last[d], is_last as u8);
        if is_last {
          break;
        }
      }
    }

    let last = match last {
      Some(last) => last,
      None => return
    };

    // Coefficient pass, high diagonals first
    for d in (0..=last).rev() {
      if !nonzero[d] {
        continue;
      }
      let side = (d >= self.threshold) as usize;
      let diag_len = self.scan.diagonal(d).len();
      let mut zeros = 0;
      let mut nonzeros = 0;

      for k in 0..diag_len {
        let index = self.scan.diagonal(d)[k];
        let level = levels[index];

        // The diagonal is known to be nonzero, so if nothing so far was
        // significant the last coefficient must be
        let inferred = k + 1 == diag_len && nonzeros == 0;
        if !inferred {
          let n = self.forward_neighbours(levels, index);
          enc.encode_bit(&mut self.ctx.significant[side][n], (level != 0) as u8);
        }
        if level == 0 {
          zeros += 1;
          continue;
        }
        nonzeros += 1;

        enc.encode_bypass((level < 0) as u8);
        let mag = level.unsigned_abs();
        enc.encode_bit(&mut self.ctx.gt1[side], (mag > 1) as u8);
        if mag > 1 {
          enc.encode_bit(&mut self.ctx.gt2[side], (mag > 2) as u8);
          if mag > 2 {
            enc.encode_unsigned(&mut self.ctx.remainder[side], mag - 3);
          }
        }
      }

      self.adapt_threshold(d, zeros, nonzeros);
    }
  }

  // `levels` is overwritten entirely; positions that aren't coded come out as zero
  pub fn decode_block(&mut self, dec: &mut CabacDecoder, levels: &mut NdArray<i32>) {
    assert!(levels.extents() == self.scan.extents());
    levels.data_mut().fill(0);
    let num_diagonals = self.num_diagonals();

    // Presence pass
    let mut nonzero = vec![false; num_diagonals];
    for d in 0..num_diagonals {
      if dec.decode_bit(&mut self.ctx.diag_nonzero[d]) == 1 {
        nonzero[d] = true;
        if dec.decode_bit(&mut self.ctx.diag_last[d]) == 1 {
          break;
        }
      }
    }

    let last = match nonzero.iter().rposition(|&nz| nz) {
      Some(last) => last,
      None => return
    };

    // Coefficient pass
    for d in (0..=last).rev() {
      if !nonzero[d] {
        continue;
      }
      let side = (d >= self.threshold) as usize;
      let diag_len = self.scan.diagonal(d).len();
      let mut zeros = 0;
      let mut nonzeros = 0;

      for k in 0..diag_len {
        let index = self.scan.diagonal(d)[k];

        let inferred = k + 1 == diag_len && nonzeros == 0;
        let significant = if inferred {
          true
        } else {
          let n = self.forward_neighbours(levels, index);
          dec.decode_bit(&mut self.ctx.significant[side][n]) == 1
        };
        if !significant {
          zeros += 1;
          continue;
        }
        nonzeros += 1;

        let negative = dec.decode_bypass() == 1;
        let mut mag = 1u32;
        if dec.decode_bit(&mut self.ctx.gt1[side]) == 1 {
          mag = 2;
          if dec.decode_bit(&mut self.ctx.gt2[side]) == 1 {
            mag = 3u32.wrapping_add(dec.decode_unsigned(&mut self.ctx.remainder[side]));
          }
        }
        let level = mag as i32;
        levels[index] = if negative { level.wrapping_neg() } else { level };
      }

      self.adapt_threshold(d, zeros, nonzeros);
    }
  }
}
