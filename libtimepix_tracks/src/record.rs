//! Output records of the ingestion stage.
//!
//! A FrameRecord holds a frame in sparse form with its timing and description; a
//! ClusterRecord flattens a cluster's descriptors and track geometry into one row.
//! Arrays serialize as nested numeric arrays and undefined values as null.
use ndarray::Array2;
use serde::Serialize;

use super::acquisition::Frame;
use super::calibration::cluster_energy;
use super::cluster::Cluster;
use super::geometry::Point;
use super::region::Moments;
use super::sparse::{dense_to_sparse, SparseEntry};

fn to_nested<T: Clone>(array: &Array2<T>) -> Vec<Vec<T>> {
    array.outer_iter().map(|row| row.to_vec()).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameRecord {
    pub acquisition_id: u64,
    pub frame_data: Vec<SparseEntry>,
    pub acq_time: f64,
    pub acq_start: f64,
    /// JSON text of the ordered description map
    pub description: String,
    /// Number of clusters in the frame
    pub counts: usize,
}

impl FrameRecord {
    pub fn new(acquisition_id: u64, frame: &Frame) -> Result<Self, serde_json::Error> {
        let raw = frame.raw();
        Ok(Self {
            acquisition_id,
            frame_data: dense_to_sparse(raw.data()),
            acq_time: raw.acq_time(),
            acq_start: raw.acq_start(),
            description: serde_json::to_string(raw.description())?,
            counts: frame.counts(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterRecord {
    pub area: usize,
    pub bbox: [usize; 4],
    pub bbox_area: usize,
    pub centroid: [f64; 2],
    pub convex_area: usize,
    pub convex_image: Vec<Vec<bool>>,
    pub coords: Vec<[usize; 2]>,
    pub eccentricity: f64,
    pub equivalent_diameter: f64,
    pub euler_number: i64,
    pub extent: f64,
    pub filled_area: usize,
    pub filled_image: Vec<Vec<bool>>,
    pub image: Vec<Vec<bool>>,
    pub inertia_tensor: [[f64; 2]; 2],
    pub inertia_tensor_eigvals: [f64; 2],
    pub intensity_image: Vec<Vec<u32>>,
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
    pub slice: [[usize; 2]; 2],
    pub solidity: f64,
    pub weighted_centroid: [f64; 2],
    pub weighted_local_centroid: [f64; 2],
    pub weighted_moments: Moments,
    pub weighted_moments_central: Moments,
    pub weighted_moments_hu: [f64; 7],
    pub weighted_moments_normalized: Moments,
    pub min_area_box: Option<[Point; 4]>,
    pub track_length: Option<f64>,
    pub intersections: Vec<Point>,
    pub energy: Option<f64>,
}

impl ClusterRecord {
    /// Flatten a cluster. The energy is only filled when a calibrated energy frame
    /// is given.
    pub fn new(cluster: &Cluster, energy: Option<&Array2<f64>>) -> Self {
        let props = &cluster.properties;
        Self {
            area: props.area,
            bbox: props.bbox,
            bbox_area: props.bbox_area,
            centroid: props.centroid,
            convex_area: props.convex_area,
            convex_image: to_nested(&props.convex_image),
            coords: props.coords.clone(),
            eccentricity: props.eccentricity,
            equivalent_diameter: props.equivalent_diameter,
            euler_number: props.euler_number,
            extent: props.extent,
            filled_area: props.filled_area,
            filled_image: to_nested(&props.filled_image),
            image: to_nested(&props.image),
            inertia_tensor: props.inertia_tensor,
            inertia_tensor_eigvals: props.inertia_tensor_eigvals,
            intensity_image: to_nested(&props.intensity_image),
            label: props.label,
            local_centroid: props.local_centroid,
            major_axis_length: props.major_axis_length,
            max_intensity: props.max_intensity,
            mean_intensity: props.mean_intensity,
            min_intensity: props.min_intensity,
            minor_axis_length: props.minor_axis_length,
            moments: props.moments,
            moments_central: props.moments_central,
            moments_hu: props.moments_hu,
            moments_normalized: props.moments_normalized,
            orientation: props.orientation,
            perimeter: props.perimeter,
            slice: props.slice,
            solidity: props.solidity,
            weighted_centroid: props.weighted_centroid,
            weighted_local_centroid: props.weighted_local_centroid,
            weighted_moments: props.weighted_moments,
            weighted_moments_central: props.weighted_moments_central,
            weighted_moments_hu: props.weighted_moments_hu,
            weighted_moments_normalized: props.weighted_moments_normalized,
            min_area_box: cluster.min_area_box,
            track_length: cluster.track_length,
            intersections: cluster.intersections.clone(),
            energy: energy.map(|e| cluster_energy(e, &props.coords)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::RegionProperties;

    #[test]
    fn test_cluster_record_json() {
        let mut frame = Array2::<u32>::zeros((8, 8));
        frame[[2, 3]] = 5;
        let cluster = Cluster::new(RegionProperties::new(1, vec![[2, 3]], &frame));
        let record = ClusterRecord::new(&cluster, None);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["area"], 1);
        assert_eq!(value["bbox"], serde_json::json!([2, 3, 3, 4]));
        assert_eq!(value["image"], serde_json::json!([[true]]));
        assert_eq!(value["coords"], serde_json::json!([[2, 3]]));
        assert_eq!(value["max_intensity"], 5);
        assert!(value["min_area_box"].is_null());
        assert!(value["track_length"].is_null());
        assert!(value["energy"].is_null());
        assert_eq!(value["intersections"], serde_json::json!([]));
        // Moments below second order have no normalized value
        assert!(value["moments_normalized"][0][0].is_null());
        assert_eq!(value["moments"][0][0], 1.0);
    }

    #[test]
    fn test_energy_sums_cluster_pixels() {
        let mut frame = Array2::<u32>::zeros((8, 8));
        frame[[1, 1]] = 2;
        frame[[1, 2]] = 3;
        let cluster = Cluster::new(RegionProperties::new(1, vec![[1, 1], [1, 2]], &frame));
        let mut energy = Array2::<f64>::zeros((8, 8));
        energy[[1, 1]] = 1.5;
        energy[[1, 2]] = 2.5;
        energy[[5, 5]] = 100.0;
        let record = ClusterRecord::new(&cluster, Some(&energy));
        assert_eq!(record.energy, Some(4.0));
    }
}
