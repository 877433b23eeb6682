// Copyright (c) 2024-2025, The lfif contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use bytemuck::Zeroable;
use bytemuck::allocation::zeroed_slice_box;

use std::ops::{Index, IndexMut};

// Anything samples can be read from by coordinate in the full volume
pub trait SampleSource {
  fn sample(&self, pos: &[usize]) -> i32;
}

// Anything samples can be written to by coordinate in the full volume
pub trait SampleSink {
  fn set_sample(&mut self, pos: &[usize], value: i32);
}

// Adapters so that a plain closure can stand in for an external sample store
pub struct FnSource<F>(pub F);
pub struct FnSink<F>(pub F);

impl<F: Fn(&[usize]) -> i32> SampleSource for FnSource<F> {
  fn sample(&self, pos: &[usize]) -> i32 {
    (self.0)(pos)
  }
}

impl<F: FnMut(&[usize], i32)> SampleSink for FnSink<F> {
  fn set_sample(&mut self, pos: &[usize], value: i32) {
    (self.0)(pos, value)
  }
}

// Advance `coord` to the next position inside `extents`, first axis fastest.
// Returns false once every position has been visited.
pub fn next_coord(coord: &mut [usize], extents: &[usize]) -> bool {
  for axis in 0..extents.len() {
    coord[axis] += 1;
    if coord[axis] < extents[axis] {
      return true;
    }
    coord[axis] = 0;
  }
  false
}

pub fn strides_for(extents: &[usize]) -> Vec<usize> {
  let mut strides = Vec::with_capacity(extents.len());
  let mut stride = 1usize;
  for &n in extents {
    strides.push(stride);
    stride = stride.checked_mul(n).unwrap();
  }
  strides
}

// Dense D-dimensional array.
// Element (c_0, .., c_{D-1}) lives at sum(c_i * stride_i), with stride_0 = 1
#[derive(Clone, Debug)]
pub struct NdArray<T> {
  extents: Vec<usize>,
  strides: Vec<usize>,
  data: Box<[T]>,
}

impl<T> NdArray<T> {
  pub fn extents(&self) -> &[usize] {
    &self.extents
  }

  pub fn strides(&self) -> &[usize] {
    &self.strides
  }

  pub fn ndim(&self) -> usize {
    self.extents.len()
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn data(&self) -> &[T] {
    &self.data
  }

  pub fn data_mut(&mut self) -> &mut [T] {
    &mut self.data
  }

  pub fn index_of(&self, coord: &[usize]) -> usize {
    assert!(coord.len() == self.extents.len());
    let mut index = 0;
    for axis in 0..coord.len() {
      if coord[axis] >= self.extents[axis] {
        panic!("NdArray index out of bounds along axis {} (index {} vs. size {})",
               axis, coord[axis], self.extents[axis]);
      }
      index += coord[axis] * self.strides[axis];
    }
    index
  }

  pub fn coord_of(&self, mut index: usize, coord: &mut [usize]) {
    assert!(index < self.data.len());
    for axis in 0..self.extents.len() {
      coord[axis] = index % self.extents[axis];
      index /= self.extents[axis];
    }
  }

  pub fn get(&self, coord: &[usize]) -> &T {
    &self.data[self.index_of(coord)]
  }

  pub fn set(&mut self, coord: &[usize], value: T) {
    let index = self.index_of(coord);
    self.data[index] = value;
  }

  // Recover the storage so it can be pooled
  fn into_storage(self) -> Box<[T]> {
    self.data
  }
}

impl<T: Zeroable> NdArray<T> {
  pub fn zeroed(extents: &[usize]) -> Self {
    let strides = strides_for(extents);
    let num_elements = extents.iter().try_fold(1usize, |acc, &n| acc.checked_mul(n)).unwrap();
    let data = zeroed_slice_box(num_elements);

    Self {
      extents: extents.to_vec(),
      strides: strides,
      data: data
    }
  }

  pub fn new_with<F: FnMut(&[usize]) -> T>(extents: &[usize], f: F) -> Self {
    let mut result = NdArray::zeroed(extents);
    result.fill_with(f);
    return result;
  }
}

impl<T> NdArray<T> {
  pub fn fill_with<F: FnMut(&[usize]) -> T>(&mut self, mut f: F) {
    let mut coord = vec![0usize; self.extents.len()];
    for index in 0..self.data.len() {
      self.data[index] = f(&coord);
      next_coord(&mut coord, &self.extents);
    }
  }
}

impl<T: Copy> NdArray<T> {
  pub fn map<F: FnMut(T) -> T>(&mut self, mut f: F) {
    for value in self.data.iter_mut() {
      *value = f(*value);
    }
  }
}

impl NdArray<i32> {
  // Fill this block from the region of `src` starting at `origin`.
  // Coordinates past the end of `volume` are clamped onto its last valid
  // position along that axis, replicating the edge.
  pub fn load_from<S: SampleSource + ?Sized>(&mut self, src: &S, origin: &[usize], volume: &[usize]) {
    assert!(origin.len() == self.ndim() && volume.len() == self.ndim());
    let mut local = vec![0usize; self.ndim()];
    let mut pos = vec![0usize; self.ndim()];
    for index in 0..self.data.len() {
      for axis in 0..local.len() {
        pos[axis] = (origin[axis] + local[axis]).min(volume[axis] - 1);
      }
      self.data[index] = src.sample(&pos);
      next_coord(&mut local, &self.extents);
    }
  }

  // Write this block into `sink` at `origin`, skipping anything outside `volume`
  pub fn store_into<S: SampleSink + ?Sized>(&self, sink: &mut S, origin: &[usize], volume: &[usize]) {
    assert!(origin.len() == self.ndim() && volume.len() == self.ndim());
    let mut local = vec![0usize; self.ndim()];
    let mut pos = vec![0usize; self.ndim()];
    'outer: for index in 0..self.data.len() {
      for axis in 0..local.len() {
        pos[axis] = origin[axis] + local[axis];
        if pos[axis] >= volume[axis] {
          next_coord(&mut local, &self.extents);
          continue 'outer;
        }
      }
      sink.set_sample(&pos, self.data[index]);
      next_coord(&mut local, &self.extents);
    }
  }
}

// Run `f` over every line of `block` along each axis listed in `axes`, in that order.
// Each line is gathered into a contiguous scratch buffer and scattered back afterwards.
pub fn for_each_line<T, F>(block: &mut NdArray<T>, axes: &[usize], mut f: F)
where
  T: Copy + Zeroable,
  F: FnMut(usize, &mut [T]),
{
  let extents = block.extents().to_vec();
  let strides = block.strides().to_vec();

  for &axis in axes {
    let n = extents[axis];
    if n < 2 {
      continue;
    }
    let stride = strides[axis];
    let mut line = vec![T::zeroed(); n];

    // Walk the (D-1)-dimensional set of line starting points
    let mut starts = extents.clone();
    starts[axis] = 1;
    let mut coord = vec![0usize; extents.len()];
    loop {
      let start: usize = coord.iter().zip(&strides).map(|(c, s)| c * s).sum();
      for k in 0..n {
        line[k] = block[start + k * stride];
      }
      f(axis, &mut line);
      for k in 0..n {
        block[start + k * stride] = line[k];
      }
      if !next_coord(&mut coord, &starts) {
        break;
      }
    }
  }
}

impl SampleSource for NdArray<i32> {
  fn sample(&self, pos: &[usize]) -> i32 {
    *self.get(pos)
  }
}

impl SampleSink for NdArray<i32> {
  fn set_sample(&mut self, pos: &[usize], value: i32) {
    self.set(pos, value);
  }
}

// Linear indexing into the flattened storage
impl<T> Index<usize> for NdArray<T> {
  type Output = T;
  fn index(&self, index: usize) -> &T {
    &self.data[index]
  }
}

impl<T> IndexMut<usize> for NdArray<T> {
  fn index_mut(&mut self, index: usize) -> &mut T {
    &mut self.data[index]
  }
}

// Pool of same-shaped block buffers, owned by one encoder or decoder.
// Blocks handed out by acquire() are always zeroed; release() hands the
// storage back for reuse and reset() drops everything at stream teardown.
pub struct BlockArena<T> {
  extents: Vec<usize>,
  free: Vec<Box<[T]>>,
  total_allocated: usize,
}

impl<T: Zeroable + Copy> BlockArena<T> {
  pub fn new(extents: &[usize]) -> Self {
    Self {
      extents: extents.to_vec(),
      free: Vec::new(),
      total_allocated: 0
    }
  }

  pub fn acquire(&mut self) -> NdArray<T> {
    match self.free.pop() {
      Some(mut data) => {
        data.fill(T::zeroed());
        NdArray {
          extents: self.extents.clone(),
          strides: strides_for(&self.extents),
          data: data
        }
      },
      None => {
        self.total_allocated += 1;
        NdArray::zeroed(&self.extents)
      }
    }
  }

  pub fn release(&mut self, block: NdArray<T>) {
    // Blocks of some other shape are simply dropped
    if block.extents == self.extents {
      self.free.push(block.into_storage());
    }
  }

  pub fn reset(&mut self) {
    self.free.clear();
    self.total_allocated = 0;
  }

  pub fn total_allocated(&self) -> usize {
    self.total_allocated
  }

  pub fn available(&self) -> usize {
    self.free.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn index_and_coord_agree() {
    let arr: NdArray<i32> = NdArray::zeroed(&[3, 4, 2]);
    assert_eq!(arr.len(), 24);
    assert_eq!(arr.strides(), &[1, 3, 12]);
    let mut coord = [0usize; 3];
    for index in 0..arr.len() {
      arr.coord_of(index, &mut coord);
      assert_eq!(arr.index_of(&coord), index);
    }
    assert_eq!(arr.index_of(&[2, 1, 1]), 2 + 3 + 12);
  }

  #[test]
  fn coordinate_walk_is_first_axis_fastest() {
    let mut coord = [0usize; 2];
    let mut seen = vec![coord];
    while next_coord(&mut coord, &[2, 2]) {
      seen.push(coord);
    }
    assert_eq!(seen, vec![[0, 0], [1, 0], [0, 1], [1, 1]]);
  }

  #[test]
  fn load_replicates_edges() {
    let volume = [5usize, 3];
    let src = FnSource(|pos: &[usize]| (pos[0] + 10 * pos[1]) as i32);
    let mut block: NdArray<i32> = NdArray::zeroed(&[4, 4]);
    block.load_from(&src, &[4, 0], &volume);
    // Column 4 is the last valid one, so every column repeats it
    assert_eq!(*block.get(&[0, 0]), 4);
    assert_eq!(*block.get(&[3, 0]), 4);
    // Row 2 is the last valid one
    assert_eq!(*block.get(&[1, 3]), 24);
  }

  #[test]
  fn store_skips_out_of_range() {
    let volume = [3usize, 3];
    let block = NdArray::new_with(&[2, 2], |c| (c[0] + 2 * c[1] + 1) as i32);
    let mut out: NdArray<i32> = NdArray::zeroed(&volume);
    block.store_into(&mut out, &[2, 2], &volume);
    assert_eq!(*out.get(&[2, 2]), 1);
    assert_eq!(out.data().iter().filter(|&&v| v != 0).count(), 1);
  }

  #[test]
  fn closure_sink_receives_samples() {
    let mut written = Vec::new();
    {
      let mut sink = FnSink(|pos: &[usize], v: i32| written.push((pos.to_vec(), v)));
      let block = NdArray::new_with(&[2], |c| c[0] as i32 * 7);
      block.store_into(&mut sink, &[0], &[2]);
    }
    assert_eq!(written, vec![(vec![0], 0), (vec![1], 7)]);
  }

  #[test]
  fn arena_reuses_and_zeroes() {
    let mut arena: BlockArena<i32> = BlockArena::new(&[4, 4]);
    let mut a = arena.acquire();
    a[3] = 9;
    arena.release(a);
    assert_eq!(arena.available(), 1);
    let b = arena.acquire();
    assert!(b.data().iter().all(|&v| v == 0));
    assert_eq!(arena.total_allocated(), 1);
    arena.release(NdArray::zeroed(&[2, 2]));
    assert_eq!(arena.available(), 0);
    arena.reset();
    assert_eq!(arena.total_allocated(), 0);
  }
}
