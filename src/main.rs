// Copyright (c) 2024-2025, The lfif contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::exit;

use clap::{Parser, Subcommand, ValueEnum};
use rayon::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lfif::hls::{pack_channels, unpack_channels};
use lfif::pnm::{Image, read_pnm, write_pnm};
use lfif::{EncoderConfig, LfifError, NdArray, Result, StreamEncoder, StreamParams, TransformKind, decode_stream};

#[derive(Parser)]
#[command(name = "lfif", about = "Block-transform image codec")]
struct CommandlineArgs {
  /// Print per-stream progress (overridden by RUST_LOG)
  #[arg(short, long, global = true)]
  verbose: bool,
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Compress a binary PGM or PPM image
  Encode {
    /// Input file, must end in .pgm or .ppm
    input: PathBuf,
    /// Output file [default: <input>.lfif]
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Block size along each axis, reduced to fit small images
    #[arg(short, long, default_value_t = 8)]
    block_size: usize,
    /// Number of low bits thrown away by quantization. 0 with the wavelet transform is lossless
    #[arg(short, long, default_value_t = 0)]
    discarded_bits: u8,
    #[arg(short, long, value_enum, default_value_t = TransformArg::Wavelet)]
    transform: TransformArg,
    /// Predict each block from its already-coded neighbours
    #[arg(short, long)]
    predict: bool,
    /// Only try DC and planar prediction, which is much faster
    #[arg(long)]
    no_angular: bool,
  },
  /// Decompress a .lfif file back to PGM or PPM
  Decode {
    /// Input file
    input: PathBuf,
    /// Output file [default: <input>.pgm or <input>.ppm, depending on channel count]
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
}

#[derive(Clone, Copy, ValueEnum)]
enum TransformArg {
  Dct,
  Wavelet,
}

impl From<TransformArg> for TransformKind {
  fn from(arg: TransformArg) -> Self {
    match arg {
      TransformArg::Dct => TransformKind::Dct,
      TransformArg::Wavelet => TransformKind::Wavelet,
    }
  }
}

fn check_extension(path: &Path, allowed: &[&str]) -> Result<()> {
  let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
  if allowed.contains(&ext) {
    Ok(())
  } else {
    Err(LfifError::Pnm(format!("{} must end in .{}", path.display(), allowed.join(" or ."))))
  }
}

fn encode(input: &Path, output: &Path, block_size: usize, discarded_bits: u8,
          transform: TransformKind, predict: bool, config: EncoderConfig) -> Result<()> {
  check_extension(input, &["pgm", "ppm"])?;
  let image = read_pnm(&mut BufReader::new(File::open(input)?))?;

  let extents = [image.width, image.height];
  let block_extents = [block_size.min(image.width), block_size.min(image.height)];
  let params = StreamParams {
    extents: extents.to_vec(),
    block_extents: block_extents.to_vec(),
    depth_bits: image.depth_bits,
    discarded_bits: discarded_bits,
    transform: transform,
    predicted: predict
  };
  params.validate()?;

  // Channels are independent streams, so they can be coded side by side
  let bodies = image.planes.par_iter()
    .map(|plane| -> Result<Box<[u8]>> {
      Ok(StreamEncoder::with_config(params.clone(), config)?.encode(plane))
    })
    .collect::<Result<Vec<_>>>()?;

  let data = pack_channels(&params, &bodies)?;
  info!(input = %input.display(), channels = image.channels(), bytes = data.len(), "encoded");

  let mut w = BufWriter::new(File::create(output)?);
  w.write_all(&data)?;
  w.flush()?;
  Ok(())
}

fn decode(input: &Path, output: Option<PathBuf>) -> Result<()> {
  let data = std::fs::read(input)?;
  let (params, bodies) = unpack_channels(&data)?;
  if params.ndim() != 2 {
    return Err(LfifError::Pnm(format!("cannot write a {}-dimensional volume as an image", params.ndim())));
  }
  if bodies.len() != 1 && bodies.len() != 3 {
    return Err(LfifError::Pnm(format!("cannot write a {}-channel image", bodies.len())));
  }

  let planes = bodies.par_iter()
    .map(|body| -> Result<NdArray<i32>> {
      let mut plane = NdArray::zeroed(&params.extents);
      decode_stream(&params, body, &mut plane)?;
      Ok(plane)
    })
    .collect::<Result<Vec<_>>>()?;

  let image = Image {
    width: params.extents[0],
    height: params.extents[1],
    depth_bits: params.depth_bits,
    planes: planes
  };

  let output = output.unwrap_or_else(|| {
    input.with_extension(if image.channels() == 1 { "pgm" } else { "ppm" })
  });
  let mut w = BufWriter::new(File::create(&output)?);
  write_pnm(&mut w, &image)?;
  w.flush()?;
  info!(output = %output.display(), channels = image.channels(), "decoded");
  Ok(())
}

fn main() {
  let args = CommandlineArgs::parse();

  let default_level = if args.verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(false)
    .with_writer(std::io::stderr)
    .init();

  let result = match args.command {
    Command::Encode { input, output, block_size, discarded_bits, transform, predict, no_angular } => {
      let output = output.unwrap_or_else(|| input.with_extension("lfif"));
      let config = EncoderConfig { angular_search: !no_angular };
      encode(&input, &output, block_size, discarded_bits, transform.into(), predict, config)
    },
    Command::Decode { input, output } => {
      decode(&input, output)
    }
  };

  if let Err(e) = result {
    eprintln!("Error: {}", e);
    exit(2);
  }
}
