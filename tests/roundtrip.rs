// Copyright (c) 2024-2025, The lfif contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

// Whole-stream encode/decode tests through the public API

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use lfif::hls::{pack_channels, unpack_channels};
use lfif::{FnSink, FnSource, LfifError, NdArray, StreamParams, TransformKind, decode_stream, encode_stream};

fn mse(a: &NdArray<i32>, b: &NdArray<i32>) -> f64 {
  let sse: i64 = a.data().iter().zip(b.data()).map(|(&x, &y)| ((x - y) as i64).pow(2)).sum();
  sse as f64 / a.len() as f64
}

fn roundtrip(params: &StreamParams, volume: &NdArray<i32>) -> (NdArray<i32>, usize) {
  let body = encode_stream(params, volume).unwrap();
  let mut out = NdArray::zeroed(&params.extents);
  decode_stream(params, &body, &mut out).unwrap();
  (out, body.len())
}

#[test]
fn ramp_through_closures() {
  // 16x16 volume holding x + y, coded with 8x8 blocks and no loss
  let params = StreamParams::new(&[16, 16], &[8, 8]);
  let body = encode_stream(&params, &FnSource(|c: &[usize]| (c[0] + c[1]) as i32)).unwrap();

  let mut decoded = vec![-1i32; 16 * 16];
  decode_stream(&params, &body, &mut FnSink(|c: &[usize], v: i32| decoded[c[1] * 16 + c[0]] = v)).unwrap();
  for y in 0..16 {
    for x in 0..16 {
      assert_eq!(decoded[y * 16 + x], (x + y) as i32);
    }
  }
}

#[test]
fn lossless_light_field() {
  // A small 4-D light field: two angular axes of 3 views over a 10x9 image
  let extents = [10, 9, 3, 3];
  let volume = NdArray::new_with(&extents, |c| {
    ((c[0] + c[2] * 2) * 11 + (c[1] + c[3]) * 7) as i32 % 256
  });
  for predicted in [false, true] {
    let mut params = StreamParams::new(&extents, &[4, 4, 2, 2]);
    params.predicted = predicted;
    let (out, _) = roundtrip(&params, &volume);
    assert_eq!(out.data(), volume.data(), "predicted = {}", predicted);
  }
}

#[test]
fn lossless_random_16_bit() {
  let mut rng = StdRng::seed_from_u64(7);
  let extents = [20, 12, 3];
  let volume = NdArray::new_with(&extents, |_| rng.gen_range(0..65536));
  let mut params = StreamParams::new(&extents, &[8, 8, 3]);
  params.depth_bits = 16;
  params.predicted = true;
  let (out, _) = roundtrip(&params, &volume);
  assert_eq!(out.data(), volume.data());
}

#[test]
fn predicted_blocks_with_every_neighbour_layout() {
  // 4x4 blocks over 30x22 so that partial blocks sit on both far edges
  let extents = [30, 22];
  let volume = NdArray::new_with(&extents, |c| {
    if c[0] > c[1] { (c[0] * 3 + c[1] * 5) as i32 } else { 200 - (c[1] * 4) as i32 }
  });
  let mut params = StreamParams::new(&extents, &[4, 4]);
  params.predicted = true;
  let (out, _) = roundtrip(&params, &volume);
  assert_eq!(out.data(), volume.data());
}

#[test]
fn dct_error_grows_with_shift() {
  let extents = [24, 24];
  let volume = NdArray::new_with(&extents, |c| {
    let x = c[0] as f64;
    let y = c[1] as f64;
    (128.0 + 60.0 * (x * 0.3).sin() * (y * 0.2).cos()) as i32
  });

  let mut last_error = -1.0;
  let mut last_len = usize::MAX;
  for shift in [0u8, 3, 6] {
    let mut params = StreamParams::new(&extents, &[8, 8]);
    params.transform = TransformKind::Dct;
    params.discarded_bits = shift;
    let (out, len) = roundtrip(&params, &volume);
    let error = mse(&out, &volume);
    assert!(error >= last_error, "shift {}: {} < {}", shift, error, last_error);
    assert!(len <= last_len, "shift {}: {} bytes > {}", shift, len, last_len);
    last_error = error;
    last_len = len;
  }
  assert!(last_error > 0.0);
}

#[test]
fn multi_channel_container() {
  let params = StreamParams::new(&[9, 7], &[4, 4]);
  let planes: Vec<NdArray<i32>> = (0..3)
    .map(|ch| NdArray::new_with(&[9, 7], |c| (c[0] * 20 + c[1] * 3 + ch * 50) as i32))
    .collect();
  let bodies: Vec<Box<[u8]>> = planes.iter().map(|p| encode_stream(&params, p).unwrap()).collect();
  let file = pack_channels(&params, &bodies).unwrap();

  let (read_params, read_bodies) = unpack_channels(&file).unwrap();
  assert_eq!(read_params, params);
  for (plane, body) in planes.iter().zip(read_bodies) {
    let mut out = NdArray::zeroed(&[9, 7]);
    decode_stream(&read_params, body, &mut out).unwrap();
    assert_eq!(out.data(), plane.data());
  }
}

#[test]
fn configuration_errors_come_first() {
  let volume = NdArray::<i32>::zeroed(&[8, 8]);
  let params = StreamParams::new(&[8, 8], &[16, 8]);
  assert!(matches!(encode_stream(&params, &volume), Err(LfifError::InvalidBlockSize { .. })));
  let mut out = NdArray::zeroed(&[8, 8]);
  assert!(matches!(decode_stream(&params, &[], &mut out), Err(LfifError::InvalidBlockSize { .. })));
}

#[test]
fn oversized_header_is_a_configuration_error() {
  let mut file = b"LFIF-3D".to_vec();
  for _ in 0..6 {
    file.extend_from_slice(&(1u64 << 22).to_be_bytes());
  }
  file.extend_from_slice(&[8, 0, 1, 0, 1]);
  file.extend_from_slice(&0u64.to_be_bytes());
  assert!(matches!(unpack_channels(&file), Err(LfifError::InvalidBlockSize { axis: 0, .. })));

  let params = StreamParams::new(&[1 << 12; 3], &[1 << 12; 3]);
  let mut sink = FnSink(|_: &[usize], _: i32| {});
  assert!(matches!(decode_stream(&params, &[], &mut sink), Err(LfifError::TooLarge(_))));
}
