// Copyright (c) 2024-2025, The lfif contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

// Separable N-dimensional transforms: orthonormal DCT-II and integer 5/3 wavelet.
// Both are built from a 1D transform applied along every line of every axis in turn.

use std::collections::HashMap;
use std::f64::consts::PI;

use crate::ndarray::{NdArray, for_each_line};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransformKind {
  Dct,
  Wavelet,
}

impl TransformKind {
  pub fn to_u8(self) -> u8 {
    match self {
      TransformKind::Dct => 0,
      TransformKind::Wavelet => 1,
    }
  }

  pub fn from_u8(value: u8) -> Option<Self> {
    match value {
      0 => Some(TransformKind::Dct),
      1 => Some(TransformKind::Wavelet),
      _ => None
    }
  }
}

// Orthonormal DCT-II basis for one line length.
// basis[k * n + i] = s(k) * cos(pi * (2i + 1) * k / 2n), with s(0) = sqrt(1/n), s(k) = sqrt(2/n)
pub struct DctBasis {
  n: usize,
  basis: Box<[f32]>,
}

impl DctBasis {
  pub fn new(n: usize) -> Self {
    assert!(n > 0);
    let mut basis = vec![0f32; n * n];
    for k in 0..n {
      let scale = if k == 0 {
        (1.0 / n as f64).sqrt()
      } else {
        (2.0 / n as f64).sqrt()
      };
      for i in 0..n {
        let angle = PI * ((2 * i + 1) * k) as f64 / (2 * n) as f64;
        basis[k * n + i] = (scale * angle.cos()) as f32;
      }
    }

    Self {
      n: n,
      basis: basis.into_boxed_slice()
    }
  }

  pub fn len(&self) -> usize {
    self.n
  }

  fn fwd_dct(&self, line: &mut [f32], scratch: &mut [f32]) {
    let n = self.n;
    assert!(line.len() == n);
    for k in 0..n {
      let row = &self.basis[k * n .. (k + 1) * n];
      scratch[k] = row.iter().zip(line.iter()).map(|(b, x)| b * x).sum();
    }
    line.copy_from_slice(&scratch[..n]);
  }

  fn inv_dct(&self, line: &mut [f32], scratch: &mut [f32]) {
    let n = self.n;
    assert!(line.len() == n);
    for i in 0..n {
      let mut acc = 0f32;
      for k in 0..n {
        acc += self.basis[k * n + i] * line[k];
      }
      scratch[i] = acc;
    }
    line.copy_from_slice(&scratch[..n]);
  }
}

// Basis tables, built on first use for each axis length and kept for the whole stream
#[derive(Default)]
pub struct DctCache {
  tables: HashMap<usize, DctBasis>,
}

impl DctCache {
  pub fn new() -> Self {
    Self {
      tables: HashMap::new()
    }
  }

  fn prepare(&mut self, extents: &[usize]) {
    for &n in extents {
      self.tables.entry(n).or_insert_with(|| DctBasis::new(n));
    }
  }

  pub fn cached_lengths(&self) -> usize {
    self.tables.len()
  }

  pub fn fwd_dct_nd(&mut self, block: &mut NdArray<f32>) {
    let extents = block.extents().to_vec();
    self.prepare(&extents);
    let tables: Vec<&DctBasis> = extents.iter().map(|n| &self.tables[n]).collect();
    let mut scratch = vec![0f32; extents.iter().copied().max().unwrap_or(0)];
    let axes: Vec<usize> = (0..extents.len()).collect();
    for_each_line(block, &axes, |axis, line| tables[axis].fwd_dct(line, &mut scratch));
  }

  pub fn inv_dct_nd(&mut self, block: &mut NdArray<f32>) {
    let extents = block.extents().to_vec();
    self.prepare(&extents);
    let tables: Vec<&DctBasis> = extents.iter().map(|n| &self.tables[n]).collect();
    let mut scratch = vec![0f32; extents.iter().copied().max().unwrap_or(0)];
    let axes: Vec<usize> = (0..extents.len()).rev().collect();
    for_each_line(block, &axes, |axis, line| tables[axis].inv_dct(line, &mut scratch));
  }
}

// One level of the LeGall 5/3 lifting scheme, with symmetric extension at both ends.
// Output layout: low band (ceil(n/2) values) followed by high band (floor(n/2) values).
fn fwd_lift53(line: &mut [i32], scratch: &mut [i32]) {
  let n = line.len();
  if n < 2 {
    return;
  }
  let ns = (n + 1) / 2;
  let nd = n / 2;
  let (low, high) = scratch[..n].split_at_mut(ns);

  // Predict: d[i] = x[2i+1] - ((x[2i] + x[2i+2]) >> 1)
  for i in 0..nd {
    let left = line[2 * i];
    let right = if 2 * i + 2 < n { line[2 * i + 2] } else { line[2 * i] };
    high[i] = line[2 * i + 1] - ((left + right) >> 1);
  }

  // Update: s[i] = x[2i] + ((d[i-1] + d[i] + 2) >> 2)
  for i in 0..ns {
    let dl = if i > 0 { high[i - 1] } else { high[0] };
    let dr = if i < nd { high[i] } else { high[nd - 1] };
    low[i] = line[2 * i] + ((dl + dr + 2) >> 2);
  }

  line.copy_from_slice(&scratch[..n]);
}

fn inv_lift53(line: &mut [i32], scratch: &mut [i32]) {
  let n = line.len();
  if n < 2 {
    return;
  }
  let ns = (n + 1) / 2;
  let nd = n / 2;
  let (low, high) = line.split_at(ns);

  // Decoded coefficients are untrusted, so the inverse wraps instead of overflowing

  // Undo the update step first, recovering the even samples
  for i in 0..ns {
    let dl = if i > 0 { high[i - 1] } else { high[0] };
    let dr = if i < nd { high[i] } else { high[nd - 1] };
    scratch[2 * i] = low[i].wrapping_sub(dl.wrapping_add(dr).wrapping_add(2) >> 2);
  }

  // Then the predict step
  for i in 0..nd {
    let left = scratch[2 * i];
    let right = if 2 * i + 2 < n { scratch[2 * i + 2] } else { scratch[2 * i] };
    scratch[2 * i + 1] = high[i].wrapping_add(left.wrapping_add(right) >> 1);
  }

  line.copy_from_slice(&scratch[..n]);
}

// Full dyadic decomposition of one line: keep splitting the low band until it is one sample long
fn fwd_wavelet(line: &mut [i32], scratch: &mut [i32]) {
  let mut len = line.len();
  while len > 1 {
    fwd_lift53(&mut line[..len], scratch);
    len = (len + 1) / 2;
  }
}

fn inv_wavelet(line: &mut [i32], scratch: &mut [i32]) {
  let mut lengths = Vec::new();
  let mut len = line.len();
  while len > 1 {
    lengths.push(len);
    len = (len + 1) / 2;
  }
  for &len in lengths.iter().rev() {
    inv_lift53(&mut line[..len], scratch);
  }
}

pub fn fwd_wavelet_nd(block: &mut NdArray<i32>) {
  let mut scratch = vec![0i32; block.extents().iter().copied().max().unwrap_or(0)];
  let axes: Vec<usize> = (0..block.ndim()).collect();
  for_each_line(block, &axes, |_, line| fwd_wavelet(line, &mut scratch));
}

pub fn inv_wavelet_nd(block: &mut NdArray<i32>) {
  let mut scratch = vec![0i32; block.extents().iter().copied().max().unwrap_or(0)];
  // Rounding in the lifting steps means the axes must be undone in reverse order
  let axes: Vec<usize> = (0..block.ndim()).rev().collect();
  for_each_line(block, &axes, |_, line| inv_wavelet(line, &mut scratch));
}
