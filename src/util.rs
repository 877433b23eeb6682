// Copyright (c) 2024-2025, The lfif contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

// Divide by a positive divisor, rounding to nearest with halves away from zero
pub fn div_round(value: i64, divisor: i64) -> i64 {
  assert!(divisor > 0);
  if value >= 0 {
    (value + divisor / 2) / divisor
  } else {
    -((-value + divisor / 2) / divisor)
  }
}

// Largest sample value representable in `depth_bits` bits
pub fn max_sample(depth_bits: u8) -> i32 {
  ((1i64 << depth_bits) - 1) as i32
}

// Mid-range value used wherever there is nothing causal to predict from
pub fn mid_sample(depth_bits: u8) -> i32 {
  1i32 << (depth_bits - 1)
}
