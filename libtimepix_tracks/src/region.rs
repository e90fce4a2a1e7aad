//! Shape and intensity descriptors of one labeled connected component.
//!
//! The field names form the persisted cluster schema and follow the usual region
//! property vocabulary (scikit-image `regionprops`). Everything is computed in
//! (row, col) order over the component's bounding-box crop:
//!
//! - `image`: binary mask of the component in its bounding box
//! - `moments*`: raw, central, scale-normalized and Hu moments up to third order of the mask;
//!   `weighted_*` are the same moments weighted by the pixel counts
//! - `inertia_tensor`, axis lengths, eccentricity and orientation from the second
//!   central moments
//! - `convex_image`: pixels whose centers lie in the convex hull of the pixel diamonds
//! - `filled_image`: the mask with enclosed holes filled
//! - `perimeter`: border length estimated from 4-connected border pixel configurations
use ndarray::Array2;
use std::collections::VecDeque;
use std::f64::consts::{FRAC_PI_4, PI, SQRT_2};

use super::geometry::{convex_hull, Point};

const MOMENT_ORDER: usize = 4;

pub type Moments = [[f64; MOMENT_ORDER]; MOMENT_ORDER];

#[derive(Debug, Clone, PartialEq)]
pub struct RegionProperties {
    pub area: usize,
    /// (min_row, min_col, max_row + 1, max_col + 1)
    pub bbox: [usize; 4],
    pub bbox_area: usize,
    pub centroid: [f64; 2],
    pub convex_area: usize,
    pub convex_image: Array2<bool>,
    /// Pixel (row, col) coordinates in scan order
    pub coords: Vec<[usize; 2]>,
    pub eccentricity: f64,
    pub equivalent_diameter: f64,
    pub euler_number: i64,
    pub extent: f64,
    pub filled_area: usize,
    pub filled_image: Array2<bool>,
    pub image: Array2<bool>,
    pub inertia_tensor: [[f64; 2]; 2],
    pub inertia_tensor_eigvals: [f64; 2],
    pub intensity_image: Array2<u32>,
    pub label: usize,
    pub local_centroid: [f64; 2],
    pub major_axis_length: f64,
    pub max_intensity: u32,
    pub mean_intensity: f64,
    pub min_intensity: u32,
    pub minor_axis_length: f64,
    pub moments: Moments,
    pub moments_central: Moments,
    pub moments_hu: [f64; 7],
    pub moments_normalized: Moments,
    pub orientation: f64,
    pub perimeter: f64,
    /// Row and column ranges of the bounding box, as [start, stop)
    pub slice: [[usize; 2]; 2],
    pub solidity: f64,
    pub weighted_centroid: [f64; 2],
    pub weighted_local_centroid: [f64; 2],
    pub weighted_moments: Moments,
    pub weighted_moments_central: Moments,
    pub weighted_moments_hu: [f64; 7],
    pub weighted_moments_normalized: Moments,
}

fn raw_moments(weights: &Array2<f64>) -> Moments {
    let mut m = [[0.0; MOMENT_ORDER]; MOMENT_ORDER];
    for ((row, col), &w) in weights.indexed_iter() {
        if w == 0.0 {
            continue;
        }
        for (p, m_row) in m.iter_mut().enumerate() {
            let rp = (row as f64).powi(p as i32);
            for (q, value) in m_row.iter_mut().enumerate() {
                *value += rp * (col as f64).powi(q as i32) * w;
            }
        }
    }
    m
}

fn central_moments(weights: &Array2<f64>, center: [f64; 2]) -> Moments {
    let mut mu = [[0.0; MOMENT_ORDER]; MOMENT_ORDER];
    for ((row, col), &w) in weights.indexed_iter() {
        if w == 0.0 {
            continue;
        }
        let dr = row as f64 - center[0];
        let dc = col as f64 - center[1];
        for (p, mu_row) in mu.iter_mut().enumerate() {
            let rp = dr.powi(p as i32);
            for (q, value) in mu_row.iter_mut().enumerate() {
                *value += rp * dc.powi(q as i32) * w;
            }
        }
    }
    mu
}

/// Scale invariant moments; undefined (NaN) below second order
fn normalized_moments(mu: &Moments) -> Moments {
    let mut nu = [[f64::NAN; MOMENT_ORDER]; MOMENT_ORDER];
    for (p, nu_row) in nu.iter_mut().enumerate() {
        for (q, value) in nu_row.iter_mut().enumerate() {
            if p + q >= 2 && p + q < MOMENT_ORDER {
                *value = mu[p][q] / mu[0][0].powf((p + q) as f64 / 2.0 + 1.0);
            }
        }
    }
    nu
}

/// The seven Hu invariants of a set of normalized moments
fn hu_moments(nu: &Moments) -> [f64; 7] {
    let mut hu = [0.0; 7];
    let mut t0 = nu[3][0] + nu[1][2];
    let mut t1 = nu[2][1] + nu[0][3];
    let q0 = t0 * t0;
    let q1 = t1 * t1;
    let n4 = 4.0 * nu[1][1];
    let s = nu[2][0] + nu[0][2];
    let d = nu[2][0] - nu[0][2];
    hu[0] = s;
    hu[1] = d * d + n4 * nu[1][1];
    hu[3] = q0 + q1;
    hu[5] = d * (q0 - q1) + n4 * t0 * t1;
    t0 *= q0 - 3.0 * q1;
    t1 *= 3.0 * q0 - q1;
    let q0 = nu[3][0] - 3.0 * nu[1][2];
    let q1 = 3.0 * nu[2][1] - nu[0][3];
    hu[2] = q0 * q0 + q1 * q1;
    hu[4] = q0 * t0 + q1 * t1;
    hu[6] = q1 * t0 - q0 * t1;
    hu
}

/// Eigenvalues of a symmetric 2x2 matrix, largest first, clipped at zero
fn symmetric_eigvals(tensor: &[[f64; 2]; 2]) -> [f64; 2] {
    let a = tensor[0][0];
    let b = tensor[0][1];
    let c = tensor[1][1];
    let mean = (a + c) / 2.0;
    let spread = (((a - c) / 2.0).powi(2) + b * b).sqrt();
    [(mean + spread).max(0.0), (mean - spread).max(0.0)]
}

/// Pixels of the crop that are background and not reachable from outside the crop
/// through 4-connected background. Returns the hole mask and the number of holes.
fn find_holes(image: &Array2<bool>) -> (Array2<bool>, usize) {
    let (height, width) = image.dim();
    // Padded by one background pixel on every side
    let mut outside = Array2::from_elem((height + 2, width + 2), false);
    let is_background = |r: usize, c: usize| -> bool {
        if r == 0 || c == 0 || r > height || c > width {
            true
        } else {
            !image[[r - 1, c - 1]]
        }
    };

    let mut queue = VecDeque::from([(0usize, 0usize)]);
    outside[[0, 0]] = true;
    while let Some((r, c)) = queue.pop_front() {
        let neighbors = [
            (r.wrapping_sub(1), c),
            (r + 1, c),
            (r, c.wrapping_sub(1)),
            (r, c + 1),
        ];
        for (nr, nc) in neighbors {
            if nr >= height + 2 || nc >= width + 2 || outside[[nr, nc]] || !is_background(nr, nc) {
                continue;
            }
            outside[[nr, nc]] = true;
            queue.push_back((nr, nc));
        }
    }

    let mut holes = Array2::from_elem((height, width), false);
    for ((r, c), hole) in holes.indexed_iter_mut() {
        *hole = !image[[r, c]] && !outside[[r + 1, c + 1]];
    }

    // Count 4-connected hole components
    let mut seen = Array2::from_elem((height, width), false);
    let mut n_holes = 0;
    for ((r, c), &hole) in holes.indexed_iter() {
        if !hole || seen[[r, c]] {
            continue;
        }
        n_holes += 1;
        seen[[r, c]] = true;
        let mut queue = VecDeque::from([(r, c)]);
        while let Some((r, c)) = queue.pop_front() {
            let neighbors = [
                (r.wrapping_sub(1), c),
                (r + 1, c),
                (r, c.wrapping_sub(1)),
                (r, c + 1),
            ];
            for (nr, nc) in neighbors {
                if nr < height && nc < width && holes[[nr, nc]] && !seen[[nr, nc]] {
                    seen[[nr, nc]] = true;
                    queue.push_back((nr, nc));
                }
            }
        }
    }
    (holes, n_holes)
}

/// Border length of a mask from the configuration of its 4-connected border pixels.
///
/// Border pixels are the mask minus its erosion by a cross. Each border pixel is
/// scored by its border neighbors (10 per diagonal, 2 per edge neighbor, 1 for
/// itself) and the score maps to a straight, diagonal or corner step length.
fn perimeter(image: &Array2<bool>) -> f64 {
    let (height, width) = image.dim();
    let at = |r: isize, c: isize| -> bool {
        r >= 0 && c >= 0 && (r as usize) < height && (c as usize) < width && image[[r as usize, c as usize]]
    };

    let mut border = Array2::from_elem((height, width), false);
    for ((r, c), value) in border.indexed_iter_mut() {
        let (r, c) = (r as isize, c as isize);
        let eroded = at(r, c) && at(r - 1, c) && at(r + 1, c) && at(r, c - 1) && at(r, c + 1);
        *value = at(r, c) && !eroded;
    }

    let is_border = |r: isize, c: isize| -> bool {
        r >= 0 && c >= 0 && (r as usize) < height && (c as usize) < width && border[[r as usize, c as usize]]
    };

    let mut weights = [0.0; 50];
    for idx in [5, 7, 15, 17, 25, 27] {
        weights[idx] = 1.0;
    }
    for idx in [21, 33] {
        weights[idx] = SQRT_2;
    }
    for idx in [13, 23] {
        weights[idx] = (1.0 + SQRT_2) / 2.0;
    }

    let mut total = 0.0;
    for ((r, c), &is_b) in border.indexed_iter() {
        if !is_b {
            continue;
        }
        let (r, c) = (r as isize, c as isize);
        let mut score = 1;
        for (dr, dc) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
            if is_border(r + dr, c + dc) {
                score += 2;
            }
        }
        for (dr, dc) in [(-1, -1), (-1, 1), (1, -1), (1, 1)] {
            if is_border(r + dr, c + dc) {
                score += 10;
            }
        }
        total += weights[score];
    }
    total
}

/// Pixels whose centers are inside (or on) the convex hull of the mask's pixel diamonds
fn convex_image(image: &Array2<bool>) -> Array2<bool> {
    let mut vertices = Vec::new();
    for ((r, c), &value) in image.indexed_iter() {
        if value {
            let center = Point::from_pixel(r, c);
            for (dx, dy) in [(0.5, 0.0), (-0.5, 0.0), (0.0, 0.5), (0.0, -0.5)] {
                vertices.push(Point::new(center.x + dx, center.y + dy));
            }
        }
    }
    let hull = convex_hull(&vertices);

    let mut convex = Array2::from_elem(image.dim(), false);
    if hull.len() < 3 {
        return convex;
    }
    for ((r, c), value) in convex.indexed_iter_mut() {
        let p = Point::from_pixel(r, c);
        *value = (0..hull.len()).all(|idx| {
            let a = hull[idx];
            let b = hull[(idx + 1) % hull.len()];
            (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x) >= -1e-9
        });
    }
    convex
}

/// Intensity weighted local centroid; falls back to the mask centroid when the
/// intensities carry no weight
fn centroid_of(m: &Moments, fallback: [f64; 2]) -> [f64; 2] {
    if m[0][0] > 0.0 {
        [m[1][0] / m[0][0], m[0][1] / m[0][0]]
    } else {
        fallback
    }
}

impl RegionProperties {
    /// Compute every descriptor of one component.
    ///
    /// `coords` are the component's (row, col) pixels and must not be empty;
    /// `intensity` is the full frame the component was labeled in.
    pub fn new(label: usize, coords: Vec<[usize; 2]>, intensity: &Array2<u32>) -> Self {
        debug_assert!(!coords.is_empty());
        let min_row = coords.iter().map(|p| p[0]).min().unwrap_or(0);
        let max_row = coords.iter().map(|p| p[0]).max().unwrap_or(0);
        let min_col = coords.iter().map(|p| p[1]).min().unwrap_or(0);
        let max_col = coords.iter().map(|p| p[1]).max().unwrap_or(0);
        let shape = (max_row - min_row + 1, max_col - min_col + 1);

        let mut image = Array2::from_elem(shape, false);
        let mut intensity_image = Array2::<u32>::zeros(shape);
        for [row, col] in coords.iter() {
            let local = [row - min_row, col - min_col];
            image[local] = true;
            intensity_image[local] = intensity[[*row, *col]];
        }

        let area = coords.len();
        let bbox_area = shape.0 * shape.1;
        let mask_weights = image.mapv(|v| if v { 1.0 } else { 0.0 });
        let intensity_weights = intensity_image.mapv(|v| v as f64);

        let moments = raw_moments(&mask_weights);
        let local_centroid = centroid_of(&moments, [0.0, 0.0]);
        let moments_central = central_moments(&mask_weights, local_centroid);
        let moments_normalized = normalized_moments(&moments_central);
        let moments_hu = hu_moments(&moments_normalized);

        let weighted_moments = raw_moments(&intensity_weights);
        let weighted_local_centroid = centroid_of(&weighted_moments, local_centroid);
        let weighted_moments_central = central_moments(&intensity_weights, weighted_local_centroid);
        let weighted_moments_normalized = normalized_moments(&weighted_moments_central);
        let weighted_moments_hu = hu_moments(&weighted_moments_normalized);

        let mu00 = moments_central[0][0];
        let inertia_tensor = [
            [moments_central[0][2] / mu00, -moments_central[1][1] / mu00],
            [-moments_central[1][1] / mu00, moments_central[2][0] / mu00],
        ];
        let inertia_tensor_eigvals = symmetric_eigvals(&inertia_tensor);
        let [l1, l2] = inertia_tensor_eigvals;
        let eccentricity = if l1 == 0.0 { 0.0 } else { (1.0 - l2 / l1).sqrt() };
        let (a, b, c) = (
            inertia_tensor[0][0],
            inertia_tensor[0][1],
            inertia_tensor[1][1],
        );
        let orientation = if a - c == 0.0 {
            if b < 0.0 {
                -FRAC_PI_4
            } else {
                FRAC_PI_4
            }
        } else {
            0.5 * (-2.0 * b).atan2(c - a)
        };

        let (holes, n_holes) = find_holes(&image);
        let filled_image = ndarray::Zip::from(&image)
            .and(&holes)
            .map_collect(|&pixel, &hole| pixel || hole);
        let filled_area = filled_image.iter().filter(|v| **v).count();

        let convex_image = convex_image(&image);
        let convex_area = convex_image.iter().filter(|v| **v).count();

        let max_intensity = coords
            .iter()
            .map(|[r, c]| intensity[[*r, *c]])
            .max()
            .unwrap_or(0);
        let min_intensity = coords
            .iter()
            .map(|[r, c]| intensity[[*r, *c]])
            .min()
            .unwrap_or(0);
        let mean_intensity = intensity_weights.sum() / area as f64;

        Self {
            area,
            bbox: [min_row, min_col, max_row + 1, max_col + 1],
            bbox_area,
            centroid: [
                local_centroid[0] + min_row as f64,
                local_centroid[1] + min_col as f64,
            ],
            convex_area,
            convex_image,
            coords,
            eccentricity,
            equivalent_diameter: (4.0 * area as f64 / PI).sqrt(),
            euler_number: 1 - n_holes as i64,
            extent: area as f64 / bbox_area as f64,
            filled_area,
            filled_image,
            perimeter: perimeter(&image),
            image,
            inertia_tensor,
            inertia_tensor_eigvals,
            intensity_image,
            label,
            local_centroid,
            major_axis_length: 4.0 * l1.sqrt(),
            max_intensity,
            mean_intensity,
            min_intensity,
            minor_axis_length: 4.0 * l2.sqrt(),
            moments,
            moments_central,
            moments_hu,
            moments_normalized,
            orientation,
            slice: [[min_row, max_row + 1], [min_col, max_col + 1]],
            solidity: area as f64 / convex_area as f64,
            weighted_centroid: [
                weighted_local_centroid[0] + min_row as f64,
                weighted_local_centroid[1] + min_col as f64,
            ],
            weighted_local_centroid,
            weighted_moments,
            weighted_moments_central,
            weighted_moments_hu,
            weighted_moments_normalized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn props_from_pattern(pattern: &[&[u32]], offset: (usize, usize)) -> RegionProperties {
        let mut frame = Array2::<u32>::zeros((16, 16));
        let mut coords = Vec::new();
        for (r, row) in pattern.iter().enumerate() {
            for (c, &value) in row.iter().enumerate() {
                if value > 0 {
                    frame[[r + offset.0, c + offset.1]] = value;
                    coords.push([r + offset.0, c + offset.1]);
                }
            }
        }
        RegionProperties::new(1, coords, &frame)
    }

    #[test]
    fn test_single_pixel() {
        let props = props_from_pattern(&[&[7]], (4, 9));
        assert_eq!(props.area, 1);
        assert_eq!(props.bbox, [4, 9, 5, 10]);
        assert_eq!(props.bbox_area, 1);
        assert_eq!(props.centroid, [4.0, 9.0]);
        assert_eq!(props.weighted_centroid, [4.0, 9.0]);
        assert_eq!(props.euler_number, 1);
        assert_eq!(props.filled_area, 1);
        assert_eq!(props.convex_area, 1);
        assert_eq!(props.max_intensity, 7);
        assert_eq!(props.min_intensity, 7);
        assert_relative_eq!(props.mean_intensity, 7.0);
        assert_relative_eq!(props.solidity, 1.0);
        assert_relative_eq!(props.extent, 1.0);
        assert_relative_eq!(props.major_axis_length, 0.0);
        assert_relative_eq!(props.eccentricity, 0.0);
        assert_relative_eq!(props.perimeter, 0.0);
        assert_eq!(props.slice, [[4, 5], [9, 10]]);
    }

    #[test]
    fn test_horizontal_bar() {
        let props = props_from_pattern(&[&[1, 2, 3, 2, 1]], (2, 2));
        assert_eq!(props.area, 5);
        assert_eq!(props.bbox, [2, 2, 3, 7]);
        assert_relative_eq!(props.centroid[0], 2.0);
        assert_relative_eq!(props.centroid[1], 4.0);
        // Column variance of 0..5 is 2
        assert_relative_eq!(props.inertia_tensor[0][0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(props.inertia_tensor[1][1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(props.inertia_tensor_eigvals[0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(props.major_axis_length, 4.0 * 2f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(props.minor_axis_length, 0.0, epsilon = 1e-12);
        assert_relative_eq!(props.eccentricity, 1.0, epsilon = 1e-12);
        // Major axis along the columns
        assert_relative_eq!(props.orientation.abs(), std::f64::consts::FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(props.moments[0][0], 5.0);
        assert_relative_eq!(props.weighted_moments[0][0], 9.0);
        // End pixels of a one pixel wide line add nothing
        assert_relative_eq!(props.perimeter, 3.0);
    }

    #[test]
    fn test_ring_has_hole() {
        let props = props_from_pattern(
            &[&[1, 1, 1], &[1, 0, 1], &[1, 1, 1]],
            (0, 0),
        );
        assert_eq!(props.area, 8);
        assert_eq!(props.euler_number, 0);
        assert_eq!(props.filled_area, 9);
        assert!(props.filled_image[[1, 1]]);
        assert!(!props.image[[1, 1]]);
        assert_eq!(props.convex_area, 9);
        assert_relative_eq!(props.solidity, 8.0 / 9.0);
    }

    #[test]
    fn test_square_perimeter() {
        let props = props_from_pattern(
            &[&[1, 1, 1], &[1, 1, 1], &[1, 1, 1]],
            (3, 3),
        );
        // Eight border pixels, each a straight step
        assert_relative_eq!(props.perimeter, 8.0, epsilon = 1e-12);
        assert_relative_eq!(props.moments_hu[0], props.moments_normalized[2][0] + props.moments_normalized[0][2]);
        assert!(props.moments_normalized[0][0].is_nan());
        assert_relative_eq!(props.eccentricity, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_diagonal_is_convex_filled() {
        let props = props_from_pattern(&[&[1, 0, 0], &[0, 1, 0], &[0, 0, 1]], (0, 0));
        assert_eq!(props.area, 3);
        assert_eq!(props.euler_number, 1);
        // The hull of the pixel diamonds covers only the diagonal centers
        assert_eq!(props.convex_area, 3);
        assert_relative_eq!(props.orientation, -FRAC_PI_4, epsilon = 1e-12);
    }
}
