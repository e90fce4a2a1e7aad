use ndarray::Array2;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::constants::{FRAME_HEIGHT, FRAME_WIDTH, PIXEL_COUNT};
use super::error::CalibrationError;
use super::frame::RawFrame;

/// Read a whitespace separated table of coefficients, flattened in reading order
fn load_table(path: &Path, table: char) -> Result<Vec<f64>, CalibrationError> {
    if !path.exists() {
        return Err(CalibrationError::BadFilePath(path.to_path_buf()));
    }
    let mut contents = String::new();
    File::open(path)?.read_to_string(&mut contents)?;

    let values = contents
        .split_whitespace()
        .map(|token| token.parse::<f64>())
        .collect::<Result<Vec<f64>, _>>()?;
    if values.len() != PIXEL_COUNT {
        return Err(CalibrationError::BadTableSize {
            table,
            found: values.len(),
        });
    }
    Ok(values)
}

/// Convert one time-over-threshold count to energy.
///
/// Solves `tot = a*E + b - c/(E - t)` for the physical root. Any pixel without a real
/// root, or with `a == 0`, gets zero energy, and negative energies are clamped to zero.
pub fn tot_to_energy(a: f64, b: f64, c: f64, t: f64, tot: f64) -> f64 {
    let quad_b = b - a * t - tot;
    let quad_c = t * tot - b * t - c;
    let discriminant = quad_b * quad_b - 4.0 * a * quad_c;
    if a == 0.0 || discriminant < 0.0 {
        return 0.0;
    }
    ((-quad_b + discriminant.sqrt()) / (2.0 * a)).max(0.0)
}

/// Per-pixel energy calibration of a Timepix sensor.
///
/// Four coefficient tables a, b, c and t, each with one entry per pixel in row-major
/// order. Tables are loaded independently from plain text files; a calibration can
/// only be applied once all four are present.
#[derive(Debug, Clone, Default)]
pub struct Calibration {
    a: Option<Vec<f64>>,
    b: Option<Vec<f64>>,
    c: Option<Vec<f64>>,
    t: Option<Vec<f64>>,
}

impl Calibration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load all four tables at once
    pub fn from_files(a: &Path, b: &Path, c: &Path, t: &Path) -> Result<Self, CalibrationError> {
        let mut calibration = Self::new();
        calibration.load_calib_a(a)?;
        calibration.load_calib_b(b)?;
        calibration.load_calib_c(c)?;
        calibration.load_calib_t(t)?;
        Ok(calibration)
    }

    pub fn load_calib_a(&mut self, path: &Path) -> Result<(), CalibrationError> {
        self.a = Some(load_table(path, 'a')?);
        Ok(())
    }

    pub fn load_calib_b(&mut self, path: &Path) -> Result<(), CalibrationError> {
        self.b = Some(load_table(path, 'b')?);
        Ok(())
    }

    pub fn load_calib_c(&mut self, path: &Path) -> Result<(), CalibrationError> {
        self.c = Some(load_table(path, 'c')?);
        Ok(())
    }

    pub fn load_calib_t(&mut self, path: &Path) -> Result<(), CalibrationError> {
        self.t = Some(load_table(path, 't')?);
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.a.is_some() && self.b.is_some() && self.c.is_some() && self.t.is_some()
    }

    fn tables(&self) -> Result<(&[f64], &[f64], &[f64], &[f64]), CalibrationError> {
        Ok((
            self.a.as_deref().ok_or(CalibrationError::Uninitialized('a'))?,
            self.b.as_deref().ok_or(CalibrationError::Uninitialized('b'))?,
            self.c.as_deref().ok_or(CalibrationError::Uninitialized('c'))?,
            self.t.as_deref().ok_or(CalibrationError::Uninitialized('t'))?,
        ))
    }

    /// Convert a frame of counts into a frame of energies. Pixels with zero counts
    /// have zero energy.
    pub fn apply_calibration(&self, frame: &RawFrame) -> Result<Array2<f64>, CalibrationError> {
        let (a, b, c, t) = self.tables()?;
        let mut energy = Array2::<f64>::zeros((FRAME_HEIGHT, FRAME_WIDTH));
        for ((row, col), &count) in frame.data().indexed_iter() {
            if count == 0 {
                continue;
            }
            let idx = row * FRAME_WIDTH + col;
            energy[[row, col]] = tot_to_energy(a[idx], b[idx], c[idx], t[idx], count as f64);
        }
        Ok(energy)
    }
}

/// Total energy deposited in a set of (row, col) pixels
pub fn cluster_energy(energy: &Array2<f64>, coords: &[[usize; 2]]) -> f64 {
    coords
        .iter()
        .filter_map(|[row, col]| energy.get((*row, *col)))
        .sum()
}
