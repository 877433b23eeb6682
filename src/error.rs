// Copyright (c) 2024-2025, The lfif contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Error types for the codec core and its file front end.

use thiserror::Error;

/// Everything that can go wrong while setting up, encoding or decoding a stream.
#[derive(Error, Debug)]
pub enum LfifError {
  /// Block size is zero or larger than the volume along some axis.
  #[error("invalid block size {size} along axis {axis} (volume extent {extent})")]
  InvalidBlockSize {
    axis: usize,
    size: usize,
    extent: usize,
  },

  /// Quantization shift outside the supported range.
  #[error("invalid discarded bits count {0}")]
  InvalidDiscardedBits(u8),

  /// Sample bit depth outside the supported range.
  #[error("invalid sample depth {0} bits")]
  InvalidDepth(u8),

  /// Volume extent of zero along some axis.
  #[error("volume extent along axis {axis} is zero")]
  InvalidExtent { axis: usize },

  /// Block or padded volume holds more samples than a stream may address.
  #[error("{0} holds too many samples")]
  TooLarge(&'static str),

  /// Dimension count not handled by this core.
  #[error("unsupported dimension count {0}")]
  UnsupportedDimension(usize),

  /// Two tuples which must describe the same number of axes disagree.
  #[error("dimension mismatch: expected {expected} axes, got {actual}")]
  DimensionMismatch { expected: usize, actual: usize },

  /// Stream does not start with a known magic string.
  #[error("bad magic number")]
  BadMagic,

  /// Header fields are present but make no sense.
  #[error("invalid header: {0}")]
  InvalidHeader(&'static str),

  /// Input ended before a complete header or body was read.
  #[error("truncated input")]
  Truncated,

  /// PGM/PPM parse or format error.
  #[error("PNM error: {0}")]
  Pnm(String),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LfifError>;
