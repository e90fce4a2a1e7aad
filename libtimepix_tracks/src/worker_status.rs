#[derive(Debug, Clone, Default, PartialEq)]
pub enum BarColor {
    /// Uncalibrated ingestion
    #[default]
    CYAN,
    /// Ingestion with energy calibration
    GREEN,
}

/// Progress message sent from a worker to whoever is watching (CLI progress bars)
#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub acquisition: String,
    pub worker_id: usize,
    pub color: BarColor,
}

impl WorkerStatus {
    pub fn new(progress: f32, acquisition: &str, worker_id: usize, color: BarColor) -> Self {
        Self {
            progress,
            acquisition: acquisition.to_string(),
            worker_id,
            color,
        }
    }
}
