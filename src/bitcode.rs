// Copyright (c) 2024-2025, The lfif contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

// MSB-first bit packing, used underneath the arithmetic coder

pub struct BitWriter {
  data: Vec<u8>,
  // Bits accumulated for the next output byte, and how many of them there are
  cur: u8,
  nbits: u32,
}

impl BitWriter {
  pub fn new() -> Self {
    Self {
      data: Vec::new(),
      cur: 0,
      nbits: 0
    }
  }

  pub fn write_bit(&mut self, bit: u8) {
    assert!(bit <= 1);
    self.cur = (self.cur << 1) | bit;
    self.nbits += 1;
    if self.nbits == 8 {
      self.data.push(self.cur);
      self.cur = 0;
      self.nbits = 0;
    }
  }

  pub fn write_bits(&mut self, value: u64, n: u32) {
    assert!(n <= 64);
    assert!(n == 64 || (value >> n) == 0);
    for i in (0..n).rev() {
      self.write_bit(((value >> i) & 1) as u8);
    }
  }

  // Total number of bits written so far
  pub fn bit_len(&self) -> usize {
    self.data.len() * 8 + self.nbits as usize
  }

  // Pad with zero bits up to the next byte boundary
  pub fn byte_align(&mut self) {
    while self.nbits != 0 {
      self.write_bit(0);
    }
  }

  pub fn finalize(mut self) -> Box<[u8]> {
    self.byte_align();
    return self.data.into_boxed_slice();
  }
}

impl Default for BitWriter {
  fn default() -> Self {
    Self::new()
  }
}

pub struct BitReader<'a> {
  data: &'a [u8],
  bit_pos: usize,
}

impl<'a> BitReader<'a> {
  pub fn new(data: &'a [u8]) -> Self {
    Self {
      data: data,
      bit_pos: 0
    }
  }

  // Reading past the end yields zero bits; the caller is responsible
  // for making sure the input was long enough
  pub fn read_bit(&mut self) -> u8 {
    let byte_pos = self.bit_pos >> 3;
    let bit = if byte_pos < self.data.len() {
      (self.data[byte_pos] >> (7 - (self.bit_pos & 7))) & 1
    } else {
      0
    };
    self.bit_pos += 1;
    bit
  }

  pub fn read_bits(&mut self, n: u32) -> u64 {
    assert!(n <= 64);
    let mut value = 0u64;
    for _ in 0..n {
      value = (value << 1) | self.read_bit() as u64;
    }
    value
  }

  pub fn bit_pos(&self) -> usize {
    self.bit_pos
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn msb_first_packing() {
    let mut w = BitWriter::new();
    w.write_bit(1);
    w.write_bits(0b0110, 4);
    assert_eq!(w.bit_len(), 5);
    let data = w.finalize();
    assert_eq!(&*data, &[0b1011_0000]);
  }

  #[test]
  fn reader_pads_with_zeros() {
    let data = [0xA5u8];
    let mut r = BitReader::new(&data);
    assert_eq!(r.read_bits(8), 0xA5);
    assert_eq!(r.bit_pos(), 8);
    assert_eq!(r.read_bits(5), 0);
    assert_eq!(r.bit_pos(), 13);
  }
}
