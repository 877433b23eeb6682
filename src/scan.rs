// Copyright (c) 2024-2025, The lfif contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

// Diagonal scan order: coefficients grouped by the sum of their coordinates.
// This is the N-dimensional version of a zig-zag scan, except that the order
// within one diagonal is simply increasing linear index.

use crate::ndarray::next_coord;

pub struct ScanTable {
  extents: Vec<usize>,
  diagonals: Vec<Vec<usize>>,
}

impl ScanTable {
  pub fn new(extents: &[usize]) -> Self {
    assert!(extents.iter().all(|&n| n > 0));
    let num_diagonals = extents.iter().map(|n| n - 1).sum::<usize>() + 1;
    let total: usize = extents.iter().product();

    let mut diagonals = vec![Vec::new(); num_diagonals];
    let mut coord = vec![0usize; extents.len()];
    for index in 0..total {
      let diagonal: usize = coord.iter().sum();
      diagonals[diagonal].push(index);
      next_coord(&mut coord, extents);
    }

    Self {
      extents: extents.to_vec(),
      diagonals: diagonals
    }
  }

  pub fn extents(&self) -> &[usize] {
    &self.extents
  }

  pub fn num_diagonals(&self) -> usize {
    self.diagonals.len()
  }

  pub fn diagonal(&self, d: usize) -> &[usize] {
    &self.diagonals[d]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn small_2d_table() {
    let scan = ScanTable::new(&[3, 2]);
    assert_eq!(scan.num_diagonals(), 4);
    assert_eq!(scan.diagonal(0), &[0]);
    assert_eq!(scan.diagonal(1), &[1, 3]);
    assert_eq!(scan.diagonal(2), &[2, 4]);
    assert_eq!(scan.diagonal(3), &[5]);
  }

  #[test]
  fn single_axis_is_identity() {
    let scan = ScanTable::new(&[5]);
    for d in 0..5 {
      assert_eq!(scan.diagonal(d), &[d]);
    }
  }
}
