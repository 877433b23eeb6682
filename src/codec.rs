// Copyright (c) 2024-2025, The lfif contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Per-stream block loop.
//!
//! A stream covers one D-dimensional volume of integer samples. The volume is
//! cut into a grid of equally sized blocks, visited in raster order with the
//! first axis fastest. Each block goes through
//!
//!   predict (optional) -> transform -> quantize -> coefficient coding
//!
//! on the way in, and the exact mirror on the way out. All entropy coder
//! state (contexts and the adaptive threshold) carries over from block to
//! block, so a stream can only ever be processed sequentially.

use tracing::{debug, trace, warn};

use crate::cabac::{CabacDecoder, CabacEncoder};
use crate::coeffs::CoeffCoder;
use crate::error::{LfifError, Result};
use crate::intra::{ModeContexts, PredictionMode, Predictor, add_prediction, clamp_samples, subtract_prediction};
use crate::ndarray::{BlockArena, NdArray, SampleSink, SampleSource, next_coord};
use crate::quant::{MAX_DISCARDED_BITS, dequantize_float_block, dequantize_int_block, quantize_float_block, quantize_int_block};
use crate::txfm::{DctCache, TransformKind, fwd_wavelet_nd, inv_wavelet_nd};

pub const MAX_DIMENSIONS: usize = 8;
pub const MAX_DEPTH_BITS: u8 = 16;
pub const MAX_BLOCK_EXTENT: usize = 4096;
pub const MAX_BLOCK_SAMPLES: usize = 1 << 20;
pub const MAX_VOLUME_SAMPLES: usize = 1 << 31;

/// Everything needed to interpret a stream body. This is exactly what the
/// stream header carries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamParams {
  pub extents: Vec<usize>,
  pub block_extents: Vec<usize>,
  pub depth_bits: u8,
  pub discarded_bits: u8,
  pub transform: TransformKind,
  pub predicted: bool,
}

impl StreamParams {
  /// Lossless, unpredicted 8-bit parameters; adjust the public fields as needed.
  pub fn new(extents: &[usize], block_extents: &[usize]) -> Self {
    Self {
      extents: extents.to_vec(),
      block_extents: block_extents.to_vec(),
      depth_bits: 8,
      discarded_bits: 0,
      transform: TransformKind::Wavelet,
      predicted: false
    }
  }

  pub fn validate(&self) -> Result<()> {
    let ndim = self.extents.len();
    if ndim == 0 || ndim > MAX_DIMENSIONS {
      return Err(LfifError::UnsupportedDimension(ndim));
    }
    if self.block_extents.len() != ndim {
      return Err(LfifError::DimensionMismatch { expected: ndim, actual: self.block_extents.len() });
    }
    for axis in 0..ndim {
      let extent = self.extents[axis];
      let size = self.block_extents[axis];
      if extent == 0 {
        return Err(LfifError::InvalidExtent { axis: axis });
      }
      if size == 0 || size > extent || size > MAX_BLOCK_EXTENT {
        return Err(LfifError::InvalidBlockSize { axis: axis, size: size, extent: extent });
      }
    }

    // Header extents are untrusted, so every product below is checked before anything is allocated
    let block_samples = self.block_extents.iter().try_fold(1usize, |acc, &b| acc.checked_mul(b));
    if !matches!(block_samples, Some(n) if n <= MAX_BLOCK_SAMPLES) {
      return Err(LfifError::TooLarge("block"));
    }
    let volume_samples = self.extents.iter().zip(&self.block_extents)
      .try_fold(1usize, |acc, (&n, &b)| n.div_ceil(b).checked_mul(b).and_then(|p| acc.checked_mul(p)));
    if !matches!(volume_samples, Some(n) if n <= MAX_VOLUME_SAMPLES) {
      return Err(LfifError::TooLarge("padded volume"));
    }
    if self.depth_bits == 0 || self.depth_bits > MAX_DEPTH_BITS {
      return Err(LfifError::InvalidDepth(self.depth_bits));
    }
    if self.discarded_bits > MAX_DISCARDED_BITS {
      return Err(LfifError::InvalidDiscardedBits(self.discarded_bits));
    }
    Ok(())
  }

  pub fn ndim(&self) -> usize {
    self.extents.len()
  }

  // Number of blocks along each axis, rounding partial blocks up
  pub fn block_grid(&self) -> Vec<usize> {
    self.extents.iter().zip(&self.block_extents).map(|(&n, &b)| n.div_ceil(b)).collect()
  }

  pub fn num_blocks(&self) -> usize {
    self.block_grid().iter().product()
  }

  // The volume rounded up to a whole number of blocks
  pub fn padded_extents(&self) -> Vec<usize> {
    self.block_grid().iter().zip(&self.block_extents).map(|(g, b)| g * b).collect()
  }
}

/// Encoder-side choices which never need to be signalled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncoderConfig {
  /// Try every angular direction during mode search, rather than just DC and planar
  pub angular_search: bool,
}

impl Default for EncoderConfig {
  fn default() -> Self {
    Self {
      angular_search: true
    }
  }
}

// Transform + quantization stages, shared between encoder and decoder.
// Owns the block buffers and basis tables for the lifetime of a stream.
struct BlockPipeline {
  transform: TransformKind,
  shift: u8,
  dct: DctCache,
  int_arena: BlockArena<i32>,
  float_arena: BlockArena<f32>,
}

impl BlockPipeline {
  fn new(params: &StreamParams) -> Self {
    Self {
      transform: params.transform,
      shift: params.discarded_bits,
      dct: DctCache::new(),
      int_arena: BlockArena::new(&params.block_extents),
      float_arena: BlockArena::new(&params.block_extents)
    }
  }

  fn acquire(&mut self) -> NdArray<i32> {
    self.int_arena.acquire()
  }

  fn release(&mut self, block: NdArray<i32>) {
    self.int_arena.release(block);
  }

  // Residual samples -> quantized levels
  fn forward(&mut self, residual: &NdArray<i32>, levels: &mut NdArray<i32>) {
    match self.transform {
      TransformKind::Wavelet => {
        let mut coeffs = self.int_arena.acquire();
        coeffs.data_mut().copy_from_slice(residual.data());
        fwd_wavelet_nd(&mut coeffs);
        quantize_int_block(&coeffs, levels, self.shift);
        self.int_arena.release(coeffs);
      },
      TransformKind::Dct => {
        let mut coeffs = self.float_arena.acquire();
        for i in 0..coeffs.len() {
          coeffs[i] = residual[i] as f32;
        }
        self.dct.fwd_dct_nd(&mut coeffs);
        quantize_float_block(&coeffs, levels, self.shift);
        self.float_arena.release(coeffs);
      }
    }
  }

  // Quantized levels -> reconstructed residual
  fn inverse(&mut self, levels: &NdArray<i32>, residual: &mut NdArray<i32>) {
    match self.transform {
      TransformKind::Wavelet => {
        dequantize_int_block(levels, residual, self.shift);
        inv_wavelet_nd(residual);
      },
      TransformKind::Dct => {
        let mut coeffs = self.float_arena.acquire();
        dequantize_float_block(levels, &mut coeffs, self.shift);
        self.dct.inv_dct_nd(&mut coeffs);
        for i in 0..coeffs.len() {
          residual[i] = coeffs[i].round() as i32;
        }
        self.float_arena.release(coeffs);
      }
    }
  }

  fn teardown(&mut self) {
    self.int_arena.reset();
    self.float_arena.reset();
  }
}

// State shared by both directions: geometry, prediction and coder contexts
struct StreamState {
  params: StreamParams,
  grid: Vec<usize>,
  padded: Vec<usize>,
  pipeline: BlockPipeline,
  coeffs: CoeffCoder,
  modes: ModeContexts,
  predictor: Predictor,
  // Reconstructed samples of the blocks processed so far. Only kept when predicting
  recon: Option<NdArray<i32>>,
}

impl StreamState {
  fn new(params: StreamParams) -> Result<Self> {
    params.validate()?;
    let grid = params.block_grid();
    let padded = params.padded_extents();
    let recon = if params.predicted {
      Some(NdArray::zeroed(&padded))
    } else {
      None
    };

    Ok(Self {
      pipeline: BlockPipeline::new(&params),
      coeffs: CoeffCoder::new(&params.block_extents),
      modes: ModeContexts::new(params.ndim()),
      predictor: Predictor::new(&params.block_extents, &grid, params.depth_bits),
      grid: grid,
      padded: padded,
      recon: recon,
      params: params
    })
  }

  fn origin(&self, grid_coord: &[usize]) -> Vec<usize> {
    grid_coord.iter().zip(&self.params.block_extents).map(|(g, b)| g * b).collect()
  }

  // Prediction for the current block, or zero when prediction is off
  fn predict(&self, grid_coord: &[usize], mode: &PredictionMode, pred: &mut NdArray<i32>) {
    match &self.recon {
      Some(recon) => self.predictor.predict(recon, grid_coord, mode, pred),
      None => pred.data_mut().fill(0)
    }
  }

  // Finish reconstructing a block and make it available to later predictions
  fn reconstruct(&mut self, levels: &NdArray<i32>, pred: &NdArray<i32>, origin: &[usize], out: &mut NdArray<i32>) {
    self.pipeline.inverse(levels, out);
    add_prediction(out, pred);
    clamp_samples(out, self.params.depth_bits);
    if let Some(recon) = self.recon.as_mut() {
      out.store_into(recon, origin, &self.padded);
    }
  }
}

pub struct StreamEncoder {
  state: StreamState,
  config: EncoderConfig,
}

impl StreamEncoder {
  pub fn new(params: StreamParams) -> Result<Self> {
    Self::with_config(params, EncoderConfig::default())
  }

  pub fn with_config(params: StreamParams, config: EncoderConfig) -> Result<Self> {
    Ok(Self {
      state: StreamState::new(params)?,
      config: config
    })
  }

  pub fn params(&self) -> &StreamParams {
    &self.state.params
  }

  /// Encode the whole volume read through `src`, returning the finished stream body.
  pub fn encode<S: SampleSource + ?Sized>(mut self, src: &S) -> Box<[u8]> {
    let state = &mut self.state;
    let params = state.params.clone();
    debug!(extents = ?params.extents, block = ?params.block_extents, transform = ?params.transform,
           discarded_bits = params.discarded_bits, predicted = params.predicted, "encoding stream");

    let mut enc = CabacEncoder::new();
    let mut block = state.pipeline.acquire();
    let mut pred = state.pipeline.acquire();
    let mut levels = state.pipeline.acquire();
    let mut recon_block = state.pipeline.acquire();

    let mut grid_coord = vec![0usize; params.ndim()];
    let mut block_index = 0usize;
    loop {
      let origin = state.origin(&grid_coord);
      block.load_from(src, &origin, &params.extents);

      let mut mode = PredictionMode::None;
      if let Some(recon) = &state.recon {
        if state.predictor.has_causal_neighbours(&grid_coord) {
          mode = state.predictor.search(recon, &grid_coord, &block, self.config.angular_search, &mut pred);
          state.modes.encode(&mut enc, &mode);
        }
      }
      state.predict(&grid_coord, &mode, &mut pred);
      subtract_prediction(&mut block, &pred);

      state.pipeline.forward(&block, &mut levels);
      state.coeffs.encode_block(&mut enc, &levels);
      trace!(block = block_index, ?mode, threshold = state.coeffs.threshold(), "coded block");

      if params.predicted {
        state.reconstruct(&levels, &pred, &origin, &mut recon_block);
      }

      block_index += 1;
      if !next_coord(&mut grid_coord, &state.grid) {
        break;
      }
    }

    for b in [block, pred, levels, recon_block] {
      state.pipeline.release(b);
    }
    state.pipeline.teardown();

    let data = enc.finish();
    debug!(blocks = block_index, bytes = data.len(), "stream encoded");
    data
  }
}

pub struct StreamDecoder {
  state: StreamState,
}

impl StreamDecoder {
  pub fn new(params: StreamParams) -> Result<Self> {
    Ok(Self {
      state: StreamState::new(params)?
    })
  }

  pub fn params(&self) -> &StreamParams {
    &self.state.params
  }

  /// Decode a stream body, writing every sample of the volume into `sink`.
  ///
  /// The body is not self-checking: a truncated or corrupted body decodes to
  /// garbage rather than failing. The only integrity check available is the
  /// terminating bin at the end, which is reported through `tracing`.
  pub fn decode<S: SampleSink + ?Sized>(mut self, data: &[u8], sink: &mut S) -> Result<()> {
    let state = &mut self.state;
    let params = state.params.clone();
    debug!(extents = ?params.extents, block = ?params.block_extents, bytes = data.len(), "decoding stream");

    let mut dec = CabacDecoder::new(data);
    let mut pred = state.pipeline.acquire();
    let mut levels = state.pipeline.acquire();
    let mut out = state.pipeline.acquire();

    let mut grid_coord = vec![0usize; params.ndim()];
    let mut block_index = 0usize;
    loop {
      let origin = state.origin(&grid_coord);

      let mode = if params.predicted && state.predictor.has_causal_neighbours(&grid_coord) {
        state.modes.decode(&mut dec)
      } else {
        PredictionMode::None
      };
      state.predict(&grid_coord, &mode, &mut pred);

      state.coeffs.decode_block(&mut dec, &mut levels);
      trace!(block = block_index, ?mode, threshold = state.coeffs.threshold(), "decoded block");

      state.reconstruct(&levels, &pred, &origin, &mut out);
      out.store_into(sink, &origin, &params.extents);

      block_index += 1;
      if !next_coord(&mut grid_coord, &state.grid) {
        break;
      }
    }

    if dec.decode_terminate() != 1 {
      warn!(bits_read = dec.bit_pos(), bytes = data.len(), "stream did not end with a terminating bin");
    }

    for b in [pred, levels, out] {
      state.pipeline.release(b);
    }
    state.pipeline.teardown();

    debug!(blocks = block_index, "stream decoded");
    Ok(())
  }
}

pub fn encode_stream<S: SampleSource + ?Sized>(params: &StreamParams, src: &S) -> Result<Box<[u8]>> {
  let encoder = StreamEncoder::new(params.clone())?;
  Ok(encoder.encode(src))
}

pub fn decode_stream<S: SampleSink + ?Sized>(params: &StreamParams, data: &[u8], sink: &mut S) -> Result<()> {
  let decoder = StreamDecoder::new(params.clone())?;
  decoder.decode(data, sink)
}
