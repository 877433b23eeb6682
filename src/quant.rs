// Copyright (c) 2024-2025, The lfif contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

// Power-of-two quantization. `shift` is the stream's "discarded bits" count.

use crate::ndarray::NdArray;

pub const MAX_DISCARDED_BITS: u8 = 24;

// Divide by 2^shift, rounding to nearest with halves away from zero
pub fn quantize_int(coeff: i32, shift: u8) -> i32 {
  if shift == 0 {
    return coeff;
  }
  let offset = 1i64 << (shift - 1);
  let abs = (coeff as i64).abs();
  let level = ((abs + offset) >> shift) as i32;
  if coeff < 0 { -level } else { level }
}

pub fn dequantize_int(level: i32, shift: u8) -> i32 {
  level.wrapping_mul(1i32 << shift)
}

pub fn quantize_float(coeff: f32, shift: u8) -> i32 {
  let step = (1u32 << shift) as f32;
  // f32::round rounds halves away from zero
  (coeff / step).round() as i32
}

pub fn dequantize_float(level: i32, shift: u8) -> f32 {
  level as f32 * (1u32 << shift) as f32
}

// Block-level helpers. Each writes its result into `levels`/`coeffs`, which must have the same shape.

pub fn quantize_int_block(coeffs: &NdArray<i32>, levels: &mut NdArray<i32>, shift: u8) {
  assert!(coeffs.len() == levels.len());
  for i in 0..coeffs.len() {
    levels[i] = quantize_int(coeffs[i], shift);
  }
}

pub fn dequantize_int_block(levels: &NdArray<i32>, coeffs: &mut NdArray<i32>, shift: u8) {
  assert!(coeffs.len() == levels.len());
  for i in 0..levels.len() {
    coeffs[i] = dequantize_int(levels[i], shift);
  }
}

pub fn quantize_float_block(coeffs: &NdArray<f32>, levels: &mut NdArray<i32>, shift: u8) {
  assert!(coeffs.len() == levels.len());
  for i in 0..coeffs.len() {
    levels[i] = quantize_float(coeffs[i], shift);
  }
}

pub fn dequantize_float_block(levels: &NdArray<i32>, coeffs: &mut NdArray<f32>, shift: u8) {
  assert!(coeffs.len() == levels.len());
  for i in 0..levels.len() {
    coeffs[i] = dequantize_float(levels[i], shift);
  }
}
