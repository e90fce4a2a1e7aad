use super::error::GeometryError;
use super::geometry::{intersections_with_box, line_fit, min_area_box, track_length, Point};
use super::region::RegionProperties;

/// One connected group of hit pixels in a frame, with its region descriptors and the
/// track geometry derived from them.
///
/// The track geometry is a least-squares line through the pixel centers, clipped by
/// the minimum-area bounding box of the pixels. `track_length` is only set when the
/// line crosses the box exactly twice.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub properties: RegionProperties,
    /// Corners ordered top-left, top-right, bottom-right, bottom-left
    pub min_area_box: Option<[Point; 4]>,
    pub intersections: Vec<Point>,
    pub track_length: Option<f64>,
}

impl Cluster {
    pub fn new(properties: RegionProperties) -> Self {
        let points: Vec<Point> = properties
            .coords
            .iter()
            .map(|[row, col]| Point::from_pixel(*row, *col))
            .collect();

        let mut cluster = Self {
            properties,
            min_area_box: None,
            intersections: vec![],
            track_length: None,
        };

        match Self::fit_track(&points) {
            Ok((corners, intersections)) => {
                if intersections.len() < 2 {
                    spdlog::warn!(
                        "Failed to calculate a track length for cluster {} because too few intersections were found ({})",
                        cluster.properties.label,
                        intersections.len()
                    );
                }
                cluster.track_length = track_length(&intersections);
                cluster.min_area_box = Some(corners);
                cluster.intersections = intersections;
            }
            Err((corners, e)) => {
                spdlog::debug!(
                    "No track geometry for cluster {} of {} pixels: {e}",
                    cluster.properties.label,
                    points.len()
                );
                cluster.min_area_box = corners;
            }
        }
        cluster
    }

    /// Box the points and clip the fitted line to it. On failure returns the box if it
    /// was already found.
    #[allow(clippy::type_complexity)]
    fn fit_track(
        points: &[Point],
    ) -> Result<([Point; 4], Vec<Point>), (Option<[Point; 4]>, GeometryError)> {
        let corners = min_area_box(points).map_err(|e| (None, e))?;
        let (slope, intercept) = line_fit(points).map_err(|e| (Some(corners), e))?;
        Ok((corners, intersections_with_box(&corners, slope, intercept)))
    }

    pub fn label(&self) -> usize {
        self.properties.label
    }

    pub fn has_track(&self) -> bool {
        self.track_length.is_some()
    }
}
