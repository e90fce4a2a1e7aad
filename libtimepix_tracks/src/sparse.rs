use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::constants::{FRAME_HEIGHT, FRAME_WIDTH};
use super::error::SparseError;

/// One non-zero pixel of a frame. Serializes as `[row, col, value]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparseEntry(pub usize, pub usize, pub u32);

impl SparseEntry {
    pub fn row(&self) -> usize {
        self.0
    }

    pub fn col(&self) -> usize {
        self.1
    }

    pub fn value(&self) -> u32 {
        self.2
    }
}

/// Encode a dense frame as (row, col, value) triples in row-major scan order.
/// Zero valued pixels are omitted.
pub fn dense_to_sparse(frame: &Array2<u32>) -> Vec<SparseEntry> {
    frame
        .indexed_iter()
        .filter(|(_, value)| **value != 0)
        .map(|((row, col), value)| SparseEntry(row, col, *value))
        .collect()
}

/// Decode triples back into a dense FRAME_HEIGHT x FRAME_WIDTH frame.
///
/// Every coordinate not listed is zero. Repeated coordinates are summed, as for any
/// coordinate-list matrix.
pub fn sparse_to_dense(entries: &[SparseEntry]) -> Result<Array2<u32>, SparseError> {
    let mut frame = Array2::<u32>::zeros((FRAME_HEIGHT, FRAME_WIDTH));
    for entry in entries.iter() {
        match frame.get_mut((entry.row(), entry.col())) {
            Some(pixel) => *pixel = pixel.saturating_add(entry.value()),
            None => return Err(SparseError::OutOfBounds(entry.row(), entry.col())),
        }
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut frame = Array2::<u32>::zeros((FRAME_HEIGHT, FRAME_WIDTH));
        frame[[0, 0]] = 1;
        frame[[17, 200]] = 350;
        frame[[17, 3]] = 12;
        frame[[255, 255]] = 9;

        let entries = dense_to_sparse(&frame);
        assert_eq!(
            entries,
            vec![
                SparseEntry(0, 0, 1),
                SparseEntry(17, 3, 12),
                SparseEntry(17, 200, 350),
                SparseEntry(255, 255, 9),
            ]
        );

        let decoded = sparse_to_dense(&entries).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(decoded.iter().filter(|v| **v == 0).count(), FRAME_HEIGHT * FRAME_WIDTH - 4);
    }

    #[test]
    fn test_empty() {
        let decoded = sparse_to_dense(&[]).unwrap();
        assert!(decoded.iter().all(|v| *v == 0));
        assert!(dense_to_sparse(&decoded).is_empty());
    }

    #[test]
    fn test_out_of_bounds_and_duplicates() {
        assert_eq!(
            sparse_to_dense(&[SparseEntry(256, 0, 1)]),
            Err(SparseError::OutOfBounds(256, 0))
        );
        let decoded = sparse_to_dense(&[SparseEntry(4, 4, 2), SparseEntry(4, 4, 3)]).unwrap();
        assert_eq!(decoded[[4, 4]], 5);
    }

    #[test]
    fn test_serializes_as_triples() {
        let json = serde_json::to_string(&vec![SparseEntry(1, 2, 3)]).unwrap();
        assert_eq!(json, "[[1,2,3]]");
    }
}
