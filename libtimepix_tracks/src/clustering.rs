//! Connected component labeling of frames.
//!
//! Pixels with a non-zero count are foreground. Two foreground pixels belong to the
//! same cluster when they touch horizontally, vertically or diagonally (8-connectivity).
//! Labeling is a two pass scan with a union-find table; final labels are 1..=N in the
//! scan order of each component's first pixel.
use ndarray::Array2;

use super::cluster::Cluster;
use super::frame::RawFrame;
use super::region::RegionProperties;

/// Find the root of a label, halving the path on the way
fn find_root(parents: &mut [usize], label: usize) -> usize {
    let mut current = label;
    while current != parents[current] {
        parents[current] = parents[parents[current]];
        current = parents[current];
    }
    current
}

/// Merge the sets of two labels, keeping the smaller root as the representative
fn union_labels(parents: &mut [usize], label1: usize, label2: usize) {
    let root1 = find_root(parents, label1);
    let root2 = find_root(parents, label2);
    if root1 < root2 {
        parents[root2] = root1;
    } else if root2 < root1 {
        parents[root1] = root2;
    }
}

/// Label the 8-connected components of a mask.
///
/// Returns the label image (0 is background) and the number of components.
pub fn label_components(mask: &Array2<bool>) -> (Array2<usize>, usize) {
    let (height, width) = mask.dim();
    let mut labels = Array2::<usize>::zeros((height, width));
    // Slot 0 is the background
    let mut parents = vec![0];

    for row in 0..height {
        for col in 0..width {
            if !mask[[row, col]] {
                continue;
            }

            // Already visited neighbors: up-left, up, up-right, left
            let mut neighbors = Vec::with_capacity(4);
            if row > 0 {
                if col > 0 && labels[[row - 1, col - 1]] > 0 {
                    neighbors.push(labels[[row - 1, col - 1]]);
                }
                if labels[[row - 1, col]] > 0 {
                    neighbors.push(labels[[row - 1, col]]);
                }
                if col + 1 < width && labels[[row - 1, col + 1]] > 0 {
                    neighbors.push(labels[[row - 1, col + 1]]);
                }
            }
            if col > 0 && labels[[row, col - 1]] > 0 {
                neighbors.push(labels[[row, col - 1]]);
            }

            match neighbors.iter().min() {
                None => {
                    let label = parents.len();
                    parents.push(label);
                    labels[[row, col]] = label;
                }
                Some(&min_label) => {
                    labels[[row, col]] = min_label;
                    for &other in neighbors.iter() {
                        if other != min_label {
                            union_labels(&mut parents, min_label, other);
                        }
                    }
                }
            }
        }
    }

    // Roots are the smallest provisional label of each set, which is also the label
    // of the set's first pixel in scan order
    let mut relabel = vec![0; parents.len()];
    let mut n_components = 0;
    for label in 1..parents.len() {
        let root = find_root(&mut parents, label);
        if relabel[root] == 0 {
            n_components += 1;
            relabel[root] = n_components;
        }
        relabel[label] = relabel[root];
    }

    labels.mapv_inplace(|label| relabel[label]);
    (labels, n_components)
}

/// Split a frame into clusters.
///
/// Returns the clusters in label order and the number of clusters found.
pub fn cluster(frame: &RawFrame) -> (Vec<Cluster>, usize) {
    let data = frame.data();
    let mask = data.mapv(|count| count > 0);
    let (labels, n_components) = label_components(&mask);

    let mut members: Vec<Vec<[usize; 2]>> = vec![Vec::new(); n_components];
    for ((row, col), &label) in labels.indexed_iter() {
        if label > 0 {
            members[label - 1].push([row, col]);
        }
    }

    let clusters = members
        .into_iter()
        .enumerate()
        .map(|(idx, coords)| Cluster::new(RegionProperties::new(idx + 1, coords, data)))
        .collect();
    (clusters, n_components)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_mask(pattern: &[&[u8]]) -> Array2<bool> {
        let height = pattern.len();
        let width = pattern[0].len();
        Array2::from_shape_fn((height, width), |(r, c)| pattern[r][c] > 0)
    }

    fn assert_labels_match(labels: &Array2<usize>, expected: &[&[usize]]) {
        for (r, row) in expected.iter().enumerate() {
            for (c, &value) in row.iter().enumerate() {
                assert_eq!(labels[[r, c]], value, "label mismatch at ({r}, {c})");
            }
        }
    }

    #[test]
    fn test_empty_mask() {
        let (labels, n) = label_components(&Array2::from_elem((4, 4), false));
        assert_eq!(n, 0);
        assert!(labels.iter().all(|l| *l == 0));
    }

    #[test]
    fn test_diagonal_pixels_connect() {
        let mask = create_mask(&[&[1, 0, 0], &[0, 1, 0], &[0, 0, 1]]);
        let (labels, n) = label_components(&mask);
        assert_eq!(n, 1);
        assert_labels_match(&labels, &[&[1, 0, 0], &[0, 1, 0], &[0, 0, 1]]);
    }

    #[test]
    fn test_labels_follow_scan_order() {
        let mask = create_mask(&[
            &[0, 0, 0, 1],
            &[1, 0, 0, 1],
            &[0, 0, 0, 0],
            &[0, 1, 1, 0],
        ]);
        let (labels, n) = label_components(&mask);
        assert_eq!(n, 3);
        assert_labels_match(
            &labels,
            &[&[0, 0, 0, 1], &[2, 0, 0, 1], &[0, 0, 0, 0], &[0, 3, 3, 0]],
        );
    }

    #[test]
    fn test_u_shape_merges() {
        let mask = create_mask(&[
            &[1, 0, 1, 0, 1],
            &[1, 0, 1, 0, 1],
            &[1, 1, 1, 1, 1],
        ]);
        let (labels, n) = label_components(&mask);
        assert_eq!(n, 1);
        assert!(labels.iter().all(|l| *l <= 1));
    }

    #[test]
    fn test_up_right_neighbor_merges() {
        // The second row's first pixel only touches the first component diagonally
        let mask = create_mask(&[&[0, 0, 1, 0, 1], &[0, 1, 0, 1, 0]]);
        let (labels, n) = label_components(&mask);
        assert_eq!(n, 1);
        assert_labels_match(&labels, &[&[0, 0, 1, 0, 1], &[0, 1, 0, 1, 0]]);
    }
}
