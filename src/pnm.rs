// Copyright (c) 2024-2025, The lfif contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

// Binary PGM (P5) / PPM (P6) reading and writing.
// Samples are one byte when maxval < 256, otherwise two bytes big-endian.

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{LfifError, Result};
use crate::ndarray::NdArray;

// A decoded image, one 2-D plane per channel, indexed [x, y]
pub struct Image {
  pub width: usize,
  pub height: usize,
  pub depth_bits: u8,
  pub planes: Vec<NdArray<i32>>,
}

impl Image {
  pub fn new(width: usize, height: usize, channels: usize, depth_bits: u8) -> Self {
    assert!(channels == 1 || channels == 3);
    assert!(1 <= depth_bits && depth_bits <= 16);
    Self {
      width: width,
      height: height,
      depth_bits: depth_bits,
      planes: (0..channels).map(|_| NdArray::zeroed(&[width, height])).collect()
    }
  }

  pub fn channels(&self) -> usize {
    self.planes.len()
  }
}

fn pnm_error(msg: &str) -> LfifError {
  LfifError::Pnm(msg.to_string())
}

fn read_byte<R: Read>(r: &mut R) -> Result<u8> {
  r.read_u8().map_err(|e| match e.kind() {
    io::ErrorKind::UnexpectedEof => LfifError::Truncated,
    _ => LfifError::Io(e)
  })
}

// Skip whitespace and '#' comments, then parse one decimal field.
// Consumes exactly one whitespace byte after the digits
fn read_field<R: Read>(r: &mut R) -> Result<usize> {
  let mut byte = read_byte(r)?;
  loop {
    match byte {
      b' ' | b'\t' | b'\n' | b'\r' => {
        byte = read_byte(r)?;
      },
      b'#' => {
        while read_byte(r)? != b'\n' {}
        byte = read_byte(r)?;
      },
      _ => break
    }
  }

  if !byte.is_ascii_digit() {
    return Err(pnm_error("expected a decimal number in header"));
  }
  let mut value = 0usize;
  while byte.is_ascii_digit() {
    value = value.checked_mul(10)
      .and_then(|v| v.checked_add((byte - b'0') as usize))
      .ok_or_else(|| pnm_error("header value out of range"))?;
    byte = read_byte(r)?;
  }
  match byte {
    b' ' | b'\t' | b'\n' | b'\r' => Ok(value),
    _ => Err(pnm_error("expected whitespace after header value"))
  }
}

// Number of bits needed to hold `maxval`
fn depth_for_maxval(maxval: usize) -> u8 {
  (usize::BITS - maxval.leading_zeros()) as u8
}

pub fn read_pnm<R: Read>(r: &mut R) -> Result<Image> {
  let mut magic = [0u8; 2];
  r.read_exact(&mut magic).map_err(|_| LfifError::Truncated)?;
  let channels = match &magic {
    b"P5" => 1,
    b"P6" => 3,
    _ => return Err(pnm_error("only binary PGM (P5) and PPM (P6) files are supported"))
  };

  let width = read_field(r)?;
  let height = read_field(r)?;
  let maxval = read_field(r)?;
  if width == 0 || height == 0 {
    return Err(pnm_error("image has zero size"));
  }
  if maxval == 0 || maxval > 65535 {
    return Err(pnm_error("maxval must be between 1 and 65535"));
  }

  let mut image = Image::new(width, height, channels, depth_for_maxval(maxval));
  let wide = maxval > 255;
  for y in 0..height {
    for x in 0..width {
      for c in 0..channels {
        let value = if wide {
          r.read_u16::<BigEndian>().map_err(|_| LfifError::Truncated)? as i32
        } else {
          read_byte(r)? as i32
        };
        image.planes[c].set(&[x, y], value);
      }
    }
  }

  return Ok(image);
}

pub fn write_pnm<W: Write>(w: &mut W, image: &Image) -> Result<()> {
  let magic = match image.channels() {
    1 => "P5",
    3 => "P6",
    _ => return Err(pnm_error("only 1 or 3 channel images can be written"))
  };
  let maxval = (1u32 << image.depth_bits) - 1;
  write!(w, "{}\n{} {}\n{}\n", magic, image.width, image.height, maxval)?;

  for y in 0..image.height {
    for x in 0..image.width {
      for plane in &image.planes {
        let value = *plane.get(&[x, y]) as u32;
        if maxval > 255 {
          w.write_u16::<BigEndian>(value as u16)?;
        } else {
          w.write_u8(value as u8)?;
        }
      }
    }
  }
  Ok(())
}
