// Copyright (c) 2024-2025, The lfif contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Block-transform codec for N-dimensional integer volumes, such as light fields.
//!
//! A volume is split into a grid of blocks. Each block is optionally predicted
//! from previously reconstructed neighbours, transformed (DCT-II or integer
//! 5/3 wavelet), quantized by a power-of-two shift, and entropy coded with a
//! context-adaptive binary arithmetic coder.
//!
//! The core only sees samples through the [`SampleSource`] and [`SampleSink`]
//! traits, so it never needs to know how the caller stores its data:
//!
//! ```
//! use lfif::{NdArray, StreamParams, encode_stream, decode_stream};
//!
//! let params = StreamParams::new(&[16, 16], &[8, 8]);
//! let volume = NdArray::new_with(&[16, 16], |c| (c[0] + c[1]) as i32);
//!
//! let body = encode_stream(&params, &volume).unwrap();
//! let mut decoded = NdArray::zeroed(&[16, 16]);
//! decode_stream(&params, &body, &mut decoded).unwrap();
//! assert_eq!(decoded.data(), volume.data());
//! ```

pub mod bitcode;
pub mod cabac;
pub mod codec;
pub mod coeffs;
pub mod error;
pub mod header;
pub mod hls;
pub mod intra;
pub mod ndarray;
pub mod pnm;
pub mod quant;
pub mod scan;
pub mod txfm;
pub mod util;

pub use crate::codec::{EncoderConfig, MAX_DIMENSIONS, StreamDecoder, StreamEncoder, StreamParams, decode_stream, encode_stream};
pub use crate::error::{LfifError, Result};
pub use crate::intra::PredictionMode;
pub use crate::ndarray::{FnSink, FnSource, NdArray, SampleSink, SampleSource};
pub use crate::txfm::TransformKind;
