// Copyright (c) 2024-2025, The lfif contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Context-adaptive binary arithmetic coding.
//!
//! This is the H.264/H.265 arithmetic coding engine: a 9-bit range register,
//! a 10-bit low register (so the full interval is `ONE = 1024`), 64-state
//! probability models and carry resolution through "outstanding" bits.
//! The encoder drops the very first output bit, which is always 0; the
//! decoder compensates by starting from a 9-bit offset.

use crate::bitcode::{BitReader, BitWriter};

const ONE: u32 = 1024;
const HALF: u32 = ONE / 2;
const QUARTER: u32 = ONE / 4;

// Range of the least probable symbol, indexed by state and (range >> 6) & 3
static RANGE_TAB_LPS: [[u8; 4]; 64] = [
  [128, 176, 208, 240], [128, 167, 197, 227], [128, 158, 187, 216], [123, 150, 178, 205],
  [116, 142, 169, 195], [111, 135, 160, 185], [105, 128, 152, 175], [100, 122, 144, 166],
  [95, 116, 137, 158], [90, 110, 130, 150], [85, 104, 123, 142], [81, 99, 117, 135],
  [77, 94, 111, 128], [73, 89, 105, 122], [69, 85, 100, 116], [66, 80, 95, 110],
  [62, 76, 90, 104], [59, 72, 86, 99], [56, 69, 81, 94], [53, 65, 77, 89],
  [51, 62, 73, 85], [48, 59, 69, 80], [46, 56, 66, 76], [43, 53, 63, 72],
  [41, 50, 59, 69], [39, 48, 56, 65], [37, 45, 54, 62], [35, 43, 51, 59],
  [33, 41, 48, 56], [32, 39, 46, 53], [30, 37, 43, 50], [29, 35, 41, 48],
  [27, 33, 39, 45], [26, 31, 37, 43], [24, 30, 35, 41], [23, 28, 33, 39],
  [22, 27, 32, 37], [21, 26, 30, 35], [20, 24, 29, 33], [19, 23, 27, 31],
  [18, 22, 26, 30], [17, 21, 25, 28], [16, 20, 23, 27], [15, 19, 22, 25],
  [14, 18, 21, 24], [14, 17, 20, 23], [13, 16, 19, 22], [12, 15, 18, 21],
  [12, 14, 17, 20], [11, 14, 16, 19], [11, 13, 15, 18], [10, 12, 15, 17],
  [10, 12, 14, 16], [9, 11, 13, 15], [9, 11, 12, 14], [8, 10, 12, 14],
  [8, 9, 11, 13], [7, 9, 11, 12], [7, 9, 10, 12], [7, 8, 10, 11],
  [6, 8, 9, 11], [6, 7, 9, 10], [6, 7, 8, 9], [2, 2, 2, 2],
];

static TRANS_IDX_MPS: [u8; 64] = [
  1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16,
  17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31, 32,
  33, 34, 35, 36, 37, 38, 39, 40, 41, 42, 43, 44, 45, 46, 47, 48,
  49, 50, 51, 52, 53, 54, 55, 56, 57, 58, 59, 60, 61, 62, 62, 63,
];

static TRANS_IDX_LPS: [u8; 64] = [
  0, 0, 1, 2, 2, 4, 4, 5, 6, 7, 8, 9, 9, 11, 11, 12,
  13, 13, 15, 15, 16, 16, 18, 18, 19, 19, 21, 21, 22, 22, 23, 24,
  24, 25, 26, 26, 27, 27, 28, 29, 29, 30, 30, 30, 31, 32, 32, 33,
  33, 33, 34, 34, 35, 35, 35, 36, 36, 36, 37, 37, 37, 38, 38, 63,
];

// Longest Exp-Golomb prefix accepted on decode, so that garbage input can't loop forever
const MAX_EG_PREFIX: u32 = 31;

/// Adaptive probability state for one binary decision.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContextModel {
  state: u8,
  mps: u8,
}

impl ContextModel {
  /// Equiprobable starting state.
  pub fn new() -> Self {
    Self { state: 0, mps: 0 }
  }

  pub fn state(&self) -> u8 {
    self.state
  }

  pub fn mps(&self) -> u8 {
    self.mps
  }

  fn lps_range(&self, range: u32) -> u32 {
    RANGE_TAB_LPS[self.state as usize][((range >> 6) & 3) as usize] as u32
  }

  fn update(&mut self, bit: u8) {
    if bit == self.mps {
      self.state = TRANS_IDX_MPS[self.state as usize];
    } else {
      if self.state == 0 {
        self.mps = 1 - self.mps;
      }
      self.state = TRANS_IDX_LPS[self.state as usize];
    }
  }
}

pub struct CabacEncoder {
  w: BitWriter,
  low: u32,
  range: u32,
  outstanding: u64,
  first_bit: bool,
}

impl CabacEncoder {
  pub fn new() -> Self {
    Self {
      w: BitWriter::new(),
      low: 0,
      range: 510,
      outstanding: 0,
      first_bit: true
    }
  }

  fn put_bit(&mut self, bit: u8) {
    if self.first_bit {
      self.first_bit = false;
    } else {
      self.w.write_bit(bit);
    }
    while self.outstanding > 0 {
      self.w.write_bit(1 - bit);
      self.outstanding -= 1;
    }
  }

  fn renormalize(&mut self) {
    while self.range < QUARTER {
      if self.low < QUARTER {
        self.put_bit(0);
      } else if self.low >= HALF {
        self.low -= HALF;
        self.put_bit(1);
      } else {
        // Straddling the midpoint: defer until a later bit decides the carry
        self.low -= QUARTER;
        self.outstanding += 1;
      }
      self.range <<= 1;
      self.low <<= 1;
    }
  }

  pub fn encode_bit(&mut self, ctx: &mut ContextModel, bit: u8) {
    assert!(bit <= 1);
    let lps = ctx.lps_range(self.range);
    self.range -= lps;
    if bit != ctx.mps {
      self.low += self.range;
      self.range = lps;
    }
    ctx.update(bit);
    self.renormalize();
  }

  pub fn encode_bypass(&mut self, bit: u8) {
    assert!(bit <= 1);
    self.low <<= 1;
    if bit != 0 {
      self.low += self.range;
    }
    if self.low >= ONE {
      self.put_bit(1);
      self.low -= ONE;
    } else if self.low < HALF {
      self.put_bit(0);
    } else {
      self.low -= HALF;
      self.outstanding += 1;
    }
  }

  pub fn encode_bypass_bits(&mut self, value: u32, n: u32) {
    for i in (0..n).rev() {
      self.encode_bypass(((value >> i) & 1) as u8);
    }
  }

  // Adaptive Exp-Golomb (order 0) code for a non-negative integer:
  // unary prefix on `ctxs` (the last context is shared by all longer prefixes),
  // then the suffix as bypass bits
  pub fn encode_unsigned(&mut self, ctxs: &mut [ContextModel], value: u32) {
    assert!(!ctxs.is_empty());
    assert!(value < u32::MAX);
    let v = value as u64 + 1;
    let prefix_len = 63 - v.leading_zeros();
    for i in 0..prefix_len {
      let c = (i as usize).min(ctxs.len() - 1);
      self.encode_bit(&mut ctxs[c], 1);
    }
    let c = (prefix_len as usize).min(ctxs.len() - 1);
    self.encode_bit(&mut ctxs[c], 0);
    for i in (0..prefix_len).rev() {
      self.encode_bypass(((v >> i) & 1) as u8);
    }
  }

  fn encode_terminate(&mut self, bit: u8) {
    self.range -= 2;
    if bit != 0 {
      self.low += self.range;
      self.flush();
    } else {
      self.renormalize();
    }
  }

  fn flush(&mut self) {
    self.range = 2;
    self.renormalize();
    self.put_bit(((self.low >> 9) & 1) as u8);
    self.w.write_bits((((self.low >> 7) & 3) | 1) as u64, 2);
  }

  /// Terminate the arithmetic code, resolve outstanding bits and pad to a byte boundary.
  pub fn finish(mut self) -> Box<[u8]> {
    self.encode_terminate(1);
    self.w.finalize()
  }
}

impl Default for CabacEncoder {
  fn default() -> Self {
    Self::new()
  }
}

pub struct CabacDecoder<'a> {
  r: BitReader<'a>,
  range: u32,
  offset: u32,
}

impl<'a> CabacDecoder<'a> {
  pub fn new(data: &'a [u8]) -> Self {
    let mut r = BitReader::new(data);
    let offset = r.read_bits(9) as u32;
    Self {
      r: r,
      range: 510,
      offset: offset
    }
  }

  fn renormalize(&mut self) {
    while self.range < QUARTER {
      self.range <<= 1;
      self.offset = (self.offset << 1) | self.r.read_bit() as u32;
    }
  }

  pub fn decode_bit(&mut self, ctx: &mut ContextModel) -> u8 {
    let lps = ctx.lps_range(self.range);
    self.range -= lps;
    let bit;
    if self.offset >= self.range {
      bit = 1 - ctx.mps;
      self.offset -= self.range;
      self.range = lps;
    } else {
      bit = ctx.mps;
    }
    ctx.update(bit);
    self.renormalize();
    bit
  }

  pub fn decode_bypass(&mut self) -> u8 {
    self.offset = (self.offset << 1) | self.r.read_bit() as u32;
    if self.offset >= self.range {
      self.offset -= self.range;
      1
    } else {
      0
    }
  }

  pub fn decode_bypass_bits(&mut self, n: u32) -> u32 {
    let mut value = 0;
    for _ in 0..n {
      value = (value << 1) | self.decode_bypass() as u32;
    }
    value
  }

  pub fn decode_unsigned(&mut self, ctxs: &mut [ContextModel]) -> u32 {
    assert!(!ctxs.is_empty());
    let mut prefix_len = 0u32;
    loop {
      let c = (prefix_len as usize).min(ctxs.len() - 1);
      if self.decode_bit(&mut ctxs[c]) == 0 || prefix_len == MAX_EG_PREFIX {
        break;
      }
      prefix_len += 1;
    }
    let mut v = 1u64;
    for _ in 0..prefix_len {
      v = (v << 1) | self.decode_bypass() as u64;
    }
    (v - 1) as u32
  }

  /// Decode the end-of-stream marker written by `CabacEncoder::finish`.
  pub fn decode_terminate(&mut self) -> u8 {
    self.range -= 2;
    if self.offset >= self.range {
      1
    } else {
      self.renormalize();
      0
    }
  }

  pub fn bit_pos(&self) -> usize {
    self.r.bit_pos()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn skewed_source_compresses() {
    let mut ctx = ContextModel::new();
    let mut enc = CabacEncoder::new();
    for i in 0..4000 {
      enc.encode_bit(&mut ctx, (i % 50 == 0) as u8);
    }
    let data = enc.finish();
    // 4000 decisions with p(1) = 2% carry about 570 bits of information
    assert!(data.len() < 150, "got {} bytes", data.len());
    assert!(ctx.state() > 20);

    let mut ctx = ContextModel::new();
    let mut dec = CabacDecoder::new(&data);
    for i in 0..4000 {
      assert_eq!(dec.decode_bit(&mut ctx), (i % 50 == 0) as u8);
    }
    assert_eq!(dec.decode_terminate(), 1);
  }

  #[test]
  fn bypass_and_unsigned_roundtrip() {
    let values = [0u32, 1, 2, 3, 7, 8, 100, 65535, 1 << 20, u32::MAX - 1];
    let mut ctxs = [ContextModel::new(); 8];
    let mut enc = CabacEncoder::new();
    for &v in &values {
      enc.encode_unsigned(&mut ctxs, v);
      enc.encode_bypass_bits(v & 0x3FF, 10);
    }
    let data = enc.finish();

    let mut ctxs = [ContextModel::new(); 8];
    let mut dec = CabacDecoder::new(&data);
    for &v in &values {
      assert_eq!(dec.decode_unsigned(&mut ctxs), v);
      assert_eq!(dec.decode_bypass_bits(10), v & 0x3FF);
    }
    assert_eq!(dec.decode_terminate(), 1);
  }

  #[test]
  fn mps_flips_after_lps_at_state_zero() {
    let mut ctx = ContextModel::new();
    ctx.update(1);
    assert_eq!(ctx.mps(), 1);
    assert_eq!(ctx.state(), 0);
    ctx.update(1);
    assert_eq!(ctx.state(), 1);
  }

  #[test]
  fn empty_stream_terminates() {
    let data = CabacEncoder::new().finish();
    assert!(!data.is_empty());
    let mut dec = CabacDecoder::new(&data);
    assert_eq!(dec.decode_terminate(), 1);
  }
}
