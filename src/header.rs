// Copyright (c) 2024-2025, The lfif contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

// Per-stream header. Layout, all multi-byte fields big-endian:
//
//   "LFIF-" <D as one ASCII digit> "D"
//   D x u64 volume extents
//   D x u64 block extents
//   u8 depth bits, u8 discarded bits, u8 transform, u8 predicted flag

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::codec::{MAX_DIMENSIONS, StreamParams};
use crate::error::{LfifError, Result};
use crate::txfm::TransformKind;

const MAGIC_PREFIX: &[u8; 5] = b"LFIF-";

// Short reads mean the input was cut off rather than that something went wrong underneath
fn map_eof(err: io::Error) -> LfifError {
  if err.kind() == io::ErrorKind::UnexpectedEof {
    LfifError::Truncated
  } else {
    LfifError::Io(err)
  }
}

pub fn write_header<W: Write>(w: &mut W, params: &StreamParams) -> Result<()> {
  params.validate()?;
  let ndim = params.ndim();

  w.write_all(MAGIC_PREFIX)?;
  w.write_u8(b'0' + ndim as u8)?;
  w.write_u8(b'D')?;
  for &n in &params.extents {
    w.write_u64::<BigEndian>(n as u64)?;
  }
  for &n in &params.block_extents {
    w.write_u64::<BigEndian>(n as u64)?;
  }
  w.write_u8(params.depth_bits)?;
  w.write_u8(params.discarded_bits)?;
  w.write_u8(params.transform.to_u8())?;
  w.write_u8(params.predicted as u8)?;
  Ok(())
}

fn read_usize<R: Read>(r: &mut R) -> Result<usize> {
  let value = r.read_u64::<BigEndian>().map_err(map_eof)?;
  usize::try_from(value).map_err(|_| LfifError::InvalidHeader("extent does not fit in memory"))
}

pub fn read_header<R: Read>(r: &mut R) -> Result<StreamParams> {
  let mut magic = [0u8; 7];
  r.read_exact(&mut magic).map_err(map_eof)?;
  if &magic[..5] != MAGIC_PREFIX || magic[6] != b'D' || !magic[5].is_ascii_digit() {
    return Err(LfifError::BadMagic);
  }
  let ndim = (magic[5] - b'0') as usize;
  if ndim == 0 || ndim > MAX_DIMENSIONS {
    return Err(LfifError::UnsupportedDimension(ndim));
  }

  let mut extents = Vec::with_capacity(ndim);
  for _ in 0..ndim {
    extents.push(read_usize(r)?);
  }
  let mut block_extents = Vec::with_capacity(ndim);
  for _ in 0..ndim {
    block_extents.push(read_usize(r)?);
  }

  let depth_bits = r.read_u8().map_err(map_eof)?;
  let discarded_bits = r.read_u8().map_err(map_eof)?;
  let transform = match TransformKind::from_u8(r.read_u8().map_err(map_eof)?) {
    Some(transform) => transform,
    None => return Err(LfifError::InvalidHeader("unknown transform"))
  };
  let predicted = match r.read_u8().map_err(map_eof)? {
    0 => false,
    1 => true,
    _ => return Err(LfifError::InvalidHeader("predicted flag must be 0 or 1"))
  };

  let params = StreamParams {
    extents: extents,
    block_extents: block_extents,
    depth_bits: depth_bits,
    discarded_bits: discarded_bits,
    transform: transform,
    predicted: predicted
  };
  params.validate()?;
  Ok(params)
}
