// Copyright (c) 2024-2025, The lfif contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

// High-level file syntax: how the per-channel stream bodies are packed together.
//
// A file is one stream header shared by every channel, then a channel count,
// then each channel's stream body prefixed with its length:
//
//   header | u8 channel count | (u64 BE length | body) x channels

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::codec::StreamParams;
use crate::error::{LfifError, Result};
use crate::header::{read_header, write_header};

pub const MAX_CHANNELS: usize = 255;

pub fn pack_channels(params: &StreamParams, bodies: &[Box<[u8]>]) -> Result<Box<[u8]>> {
  if bodies.is_empty() || bodies.len() > MAX_CHANNELS {
    return Err(LfifError::InvalidHeader("channel count must be between 1 and 255"));
  }

  let mut data = Vec::new();
  write_header(&mut data, params)?;
  data.write_u8(bodies.len() as u8)?;
  for body in bodies {
    data.write_u64::<BigEndian>(body.len() as u64)?;
    data.extend_from_slice(body);
  }

  return Ok(data.into_boxed_slice());
}

// Split a file back into its parameters and one body slice per channel
pub fn unpack_channels(data: &[u8]) -> Result<(StreamParams, Vec<&[u8]>)> {
  let mut r = data;
  let params = read_header(&mut r)?;
  let count = r.read_u8().map_err(|_| LfifError::Truncated)? as usize;
  if count == 0 {
    return Err(LfifError::InvalidHeader("file holds no channels"));
  }

  let mut bodies = Vec::with_capacity(count);
  for _ in 0..count {
    let len = r.read_u64::<BigEndian>().map_err(|_| LfifError::Truncated)?;
    let len = usize::try_from(len).map_err(|_| LfifError::Truncated)?;
    if len > r.len() {
      return Err(LfifError::Truncated);
    }
    let (body, rest) = r.split_at(len);
    bodies.push(body);
    r = rest;
  }

  // Trailing bytes are tolerated; the bodies are self-delimiting anyway
  if !r.is_empty() {
    tracing::warn!(bytes = r.len(), "ignoring data after the last channel");
  }

  Ok((params, bodies))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pack_and_unpack() {
    let params = StreamParams::new(&[4, 4], &[4, 4]);
    let bodies: Vec<Box<[u8]>> = vec![
      vec![1, 2, 3].into_boxed_slice(),
      Vec::new().into_boxed_slice(),
      vec![9; 300].into_boxed_slice(),
    ];
    let data = pack_channels(&params, &bodies).unwrap();
    let (read_params, read_bodies) = unpack_channels(&data).unwrap();
    assert_eq!(read_params, params);
    assert_eq!(read_bodies.len(), 3);
    for (a, b) in bodies.iter().zip(&read_bodies) {
      assert_eq!(&a[..], *b);
    }
  }

  #[test]
  fn truncated_body() {
    let params = StreamParams::new(&[4, 4], &[4, 4]);
    let data = pack_channels(&params, &[vec![7; 10].into_boxed_slice()]).unwrap();
    assert!(matches!(unpack_channels(&data[..data.len() - 1]), Err(LfifError::Truncated)));
    assert!(pack_channels(&params, &[]).is_err());
  }
}
