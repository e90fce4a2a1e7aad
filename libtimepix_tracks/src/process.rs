use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use super::acquisition::Acquisition;
use super::calibration::Calibration;
use super::config::Config;
use super::error::{ProcessorError, SinkError};
use super::record::{ClusterRecord, FrameRecord};
use super::storage::{format_start_time, AcquisitionSummary, JsonLinesSink, RecordSink};
use super::worker_status::{BarColor, WorkerStatus};

/// Ingest one acquisition: cluster every frame, forward frames and clusters to the
/// sink and write the YAML summary next to the output.
pub fn process_acquisition(
    config: &Config,
    data_path: &Path,
    sink: &mut dyn RecordSink,
    calibration: Option<&Calibration>,
    tx: &Sender<WorkerStatus>,
    worker_id: &usize,
) -> Result<AcquisitionSummary, ProcessorError> {
    let name = config.get_acquisition_name(data_path);
    let mut acquisition = Acquisition::with_policy(
        &name,
        data_path,
        &config.get_description_path(data_path),
        config.malformed_frame_policy,
    )?;

    let total_data_size = acquisition.source().get_total_data_size();
    spdlog::info!(
        "Total acquisition size: {}",
        human_bytes::human_bytes(total_data_size as f64)
    );
    let flush_frac: f32 = 0.01;
    let flush_val = (total_data_size as f64 * flush_frac as f64) as u64;
    let mut last_flush: u64 = 0;

    let mut summary = AcquisitionSummary {
        name: name.clone(),
        data_path: data_path.to_string_lossy().to_string(),
        data_size: human_bytes::human_bytes(total_data_size as f64),
        acquisition_header: acquisition.source().get_acquisition_header().to_string(),
        calibrated: calibration.is_some(),
        ..Default::default()
    };

    let color = if calibration.is_some() {
        BarColor::GREEN
    } else {
        BarColor::CYAN
    };
    tx.send(WorkerStatus::new(0.0, &name, *worker_id, color.clone()))?;
    let acquisition_id = sink.begin_acquisition(&name)?;
    while let Some(frame) = acquisition.get_next_frame()? {
        let energy = match calibration {
            Some(calib) => Some(calib.apply_calibration(frame.raw())?),
            None => None,
        };

        let record = FrameRecord::new(acquisition_id, &frame).map_err(SinkError::from)?;
        let frame_id = sink.write_frame(&record)?;
        for cluster in frame.clusters() {
            sink.write_cluster(frame_id, &ClusterRecord::new(cluster, energy.as_ref()))?;
            if !cluster.has_track() {
                summary.clusters_without_track += 1;
            }
        }

        summary.clusters += frame.clusters().len();
        summary.frames_written += 1;
        let start = format_start_time(frame.raw().acq_start());
        if summary.first_frame_start.is_none() {
            summary.first_frame_start = start.clone();
        }
        summary.last_frame_start = start;

        let bytes_read = acquisition.source().get_bytes_read();
        if bytes_read - last_flush > flush_val {
            last_flush = bytes_read;
            tx.send(WorkerStatus::new(
                bytes_read as f32 / total_data_size as f32,
                &name,
                *worker_id,
                color.clone(),
            ))?;
        }
    }
    sink.finish()?;
    summary.frames_skipped = acquisition.source().get_frames_skipped();

    tx.send(WorkerStatus::new(1.0, &name, *worker_id, color))?;
    spdlog::info!(
        "{} frames written with {} clusters ({} without a track length), {} frames skipped.",
        summary.frames_written,
        summary.clusters,
        summary.clusters_without_track,
        summary.frames_skipped
    );

    summary.write(&config.get_summary_file(data_path)?)?;
    Ok(summary)
}

/// Ingest one acquisition into its own JSON-lines file in the output directory
fn process_data_file(
    config: &Config,
    data_path: &Path,
    calibration: Option<&Calibration>,
    tx: &Sender<WorkerStatus>,
    worker_id: &usize,
) -> Result<(), ProcessorError> {
    let output_path = config.get_output_file(data_path)?;
    let mut sink = JsonLinesSink::create(&output_path)?;
    process_acquisition(config, data_path, &mut sink, calibration, tx, worker_id)?;
    spdlog::info!("Records written to {}", output_path.display());
    Ok(())
}

/// The function to be called by a separate thread (typically the UI).
/// Processes every configured acquisition in order
pub fn process(
    config: Config,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
) -> Result<(), ProcessorError> {
    let calibration = config.load_calibration()?.map(Arc::new);
    let acquisitions = config.acquisitions.clone();
    process_subset(config, tx, worker_id, acquisitions, calibration)
}

/// Process a subset of acquisitions. The calibration is shared read-only between workers.
pub fn process_subset(
    config: Config,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
    subset: Vec<PathBuf>,
    calibration: Option<Arc<Calibration>>,
) -> Result<(), ProcessorError> {
    for data_path in subset {
        if config.does_acquisition_exist(&data_path) {
            spdlog::info!("Processing acquisition {}...", data_path.display());
            process_data_file(
                &config,
                &data_path,
                calibration.as_deref(),
                &tx,
                &worker_id,
            )?;
            spdlog::info!("Finished processing acquisition {}.", data_path.display());
        } else {
            spdlog::info!(
                "Acquisition {} does not exist or has no description file, skipping...",
                data_path.display()
            );
        }
    }
    Ok(())
}

/// Divide the acquisitions in to a set of subsets (per thread/worker)
pub fn create_subsets(config: &Config) -> Vec<Vec<PathBuf>> {
    let mut subsets: Vec<Vec<PathBuf>> = vec![Vec::new(); config.n_threads.max(1) as usize];
    let n_subsets = subsets.len();

    for (idx, data_path) in config.acquisitions.iter().enumerate() {
        subsets[idx % n_subsets].push(data_path.clone())
    }

    subsets
}
