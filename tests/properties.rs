// Copyright (c) 2024-2025, The lfif contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Property tests over the transform, quantization, scan, coefficient coding
//! and prediction stages.

use proptest::prelude::*;

use lfif::cabac::CabacEncoder;
use lfif::coeffs::CoeffCoder;
use lfif::intra::{PredictionMode, Predictor, add_prediction, angular_directions, subtract_prediction};
use lfif::ndarray::NdArray;
use lfif::quant::{dequantize_float_block, quantize_float_block};
use lfif::scan::ScanTable;
use lfif::txfm::{DctCache, fwd_wavelet_nd, inv_wavelet_nd};

fn array_from<T: bytemuck::Zeroable + Copy>(extents: &[usize], values: &[T]) -> NdArray<T> {
  let mut array = NdArray::zeroed(extents);
  array.data_mut().copy_from_slice(values);
  array
}

// Block extents for `ndim` in `dims`, each side in `sides`, paired with one value per element
fn block_with_values(dims: std::ops::RangeInclusive<usize>, sides: std::ops::RangeInclusive<usize>,
                     values: std::ops::Range<i32>) -> impl Strategy<Value = (Vec<usize>, Vec<i32>)> {
  dims.prop_flat_map(move |ndim| prop::collection::vec(sides.clone(), ndim))
    .prop_flat_map(move |extents| {
      let n = extents.iter().product::<usize>();
      (Just(extents), prop::collection::vec(values.clone(), n))
    })
}

proptest! {
  #![proptest_config(ProptestConfig::with_cases(64))]

  /// The integer wavelet is exactly invertible for any block shape and content.
  #[test]
  fn wavelet_is_lossless((extents, values) in block_with_values(2..=5, 2..=5, -65536..65536)) {
    let original = array_from(&extents, &values);
    let mut block = original.clone();
    fwd_wavelet_nd(&mut block);
    inv_wavelet_nd(&mut block);
    prop_assert_eq!(block.data(), original.data());
  }

  /// Quantization error on DCT coefficients never exceeds half a step.
  #[test]
  fn dct_quantization_error_is_bounded((extents, values) in block_with_values(1..=4, 1..=6, 0..4096),
                                       shift in 0u8..=10) {
    let mut coeffs = array_from(&extents, &values.iter().map(|&v| v as f32).collect::<Vec<_>>());
    let mut dct = DctCache::new();
    dct.fwd_dct_nd(&mut coeffs);

    let mut levels = NdArray::zeroed(&extents);
    quantize_float_block(&coeffs, &mut levels, shift);
    let mut dequantized = NdArray::zeroed(&extents);
    dequantize_float_block(&levels, &mut dequantized, shift);

    let half_step = (1u32 << shift) as f32 / 2.0;
    for i in 0..coeffs.len() {
      let err = (dequantized[i] - coeffs[i]).abs();
      prop_assert!(err <= half_step * (1.0 + 1e-4) + 1e-3, "coefficient {} off by {}", i, err);
    }
  }

  /// Every coefficient index lands in exactly one diagonal, the one matching its coordinate sum.
  #[test]
  fn scan_is_a_partition(extents in prop::collection::vec(1usize..=6, 1..=5)) {
    let scan = ScanTable::new(&extents);
    let total: usize = extents.iter().product();
    let probe: NdArray<u8> = NdArray::zeroed(&extents);
    let mut seen = vec![false; total];
    let mut coord = vec![0usize; extents.len()];

    prop_assert_eq!(scan.diagonal(0), &[0usize][..]);
    for d in 0..scan.num_diagonals() {
      for &index in scan.diagonal(d) {
        prop_assert!(!seen[index]);
        seen[index] = true;
        probe.coord_of(index, &mut coord);
        prop_assert_eq!(coord.iter().sum::<usize>(), d);
      }
    }
    prop_assert!(seen.iter().all(|&s| s));
  }

  /// The adaptive threshold stays inside [0, num_diagonals] whatever is coded.
  #[test]
  fn threshold_is_bounded((extents, values) in block_with_values(1..=4, 1..=4, -3..4),
                          repeats in 1usize..8, density in 0usize..4) {
    let mut coder = CoeffCoder::new(&extents);
    let mut enc = CabacEncoder::new();
    for r in 0..repeats {
      // Thin out the levels by a varying amount so both directions of adaptation get exercised
      let levels = NdArray::new_with(&extents, |c| {
        let index = c.iter().zip(&extents).rev().fold(0, |acc, (&ci, &n)| acc * n + ci);
        if (index + r) % (density + 1) == 0 { values[index] } else { 0 }
      });
      coder.encode_block(&mut enc, &levels);
      prop_assert!(coder.threshold() <= coder.num_diagonals());
    }
  }

  /// Subtracting then adding back any prediction restores the block exactly.
  #[test]
  fn prediction_is_exact_local_inverse(recon_values in prop::collection::vec(0i32..1024, 8 * 8 * 4),
                                       block_values in prop::collection::vec(0i32..1024, 4 * 4 * 2),
                                       mode_index in 0usize..64,
                                       gx in 0usize..2, gy in 0usize..2, gz in 0usize..2) {
    let predictor = Predictor::new(&[4, 4, 2], &[2, 2, 2], 10);
    let recon = array_from(&[8, 8, 4], &recon_values);
    let original = array_from(&[4, 4, 2], &block_values);

    let directions = angular_directions(3);
    let mode = match mode_index {
      0 => PredictionMode::None,
      1 => PredictionMode::Dc,
      2 => PredictionMode::Planar,
      _ => PredictionMode::Angular(directions[(mode_index - 3) % directions.len()].clone()),
    };

    let mut pred = NdArray::zeroed(&[4, 4, 2]);
    predictor.predict(&recon, &[gx, gy, gz], &mode, &mut pred);
    let mut block = original.clone();
    subtract_prediction(&mut block, &pred);
    add_prediction(&mut block, &pred);
    prop_assert_eq!(block.data(), original.data());
    // Predictions only ever produce values the reconstruction could hold
    prop_assert!(pred.data().iter().all(|&v| (0..1024).contains(&v)));
  }
}
