use std::path::PathBuf;
use thiserror::Error;

use super::constants::*;
use super::worker_status::WorkerStatus;

#[derive(Debug, Error)]
pub enum PmfFileError {
    #[error("Could not open PmfFile because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("PmfFile failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("PmfFile found an invalid count {value:?} at line {line}; counts must be non-negative integers")]
    BadCount { value: String, line: usize },
    #[error("Malformed frame in PmfFile: found {0} lines; expected {exp}", exp=FRAME_HEIGHT)]
    TruncatedFrame(usize),
    #[error("Malformed frame in PmfFile: line {line} has {found} columns; expected {exp}", exp=FRAME_WIDTH)]
    BadRowWidth { line: usize, found: usize },
    #[error("Reached end of PmfFile")]
    EndOfFile,
}

#[derive(Debug, Error)]
pub enum DscFileError {
    #[error("Could not open DscFile because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("DscFile failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("DscFile field at line {line} does not match the \"key\" (\"unit\"): pattern: {text:?}")]
    FieldMismatch { line: usize, text: String },
    #[error("DscFile frame description is missing required key {0:?}")]
    MissingKey(String),
    #[error("DscFile failed to parse value {value:?} of key {key:?} as a number")]
    BadValue { key: String, value: String },
    #[error("Reached end of DscFile")]
    EndOfFile,
}

#[derive(Debug, Error)]
pub enum FrameSourceError {
    #[error("FrameSource failed due to PmfFile error: {0}")]
    DataError(#[from] PmfFileError),
    #[error("FrameSource failed due to DscFile error: {0}")]
    DescriptionError(#[from] DscFileError),
    #[error("FrameSource aborted on malformed frame block {block}: {reason}")]
    MalformedFrame { block: usize, reason: PmfFileError },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SparseError {
    #[error("Sparse entry ({0}, {1}) lies outside the {h}x{w} frame", h=FRAME_HEIGHT, w=FRAME_WIDTH)]
    OutOfBounds(usize, usize),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("Ordering box corners requires exactly 4 points; given {0}")]
    BadPointCount(usize),
    #[error("Ordering box corners requires 4 distinct points; the box is degenerate")]
    DegenerateBox,
    #[error("Cannot compute a bounding box for an empty set of points")]
    NoPoints,
    #[error("Line fit is undefined; all {0} points share one column")]
    VerticalFit(usize),
}

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("Calibration is uninitialized; coefficient table {0} has not been loaded")]
    Uninitialized(char),
    #[error("Could not load calibration because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Calibration failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Calibration failed to parse a coefficient: {0}")]
    ParsingError(#[from] std::num::ParseFloatError),
    #[error("Calibration table {table} has {found} entries; expected {exp}", exp=PIXEL_COUNT)]
    BadTableSize { table: char, found: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("RecordSink failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("RecordSink failed to serialize a record: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("RecordSink failed to convert to yaml: {0}")]
    YamlError(#[from] serde_yaml::Error),
    #[error("RecordSink received a record before an acquisition was started")]
    NoAcquisition,
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to FrameSource error: {0}")]
    SourceError(#[from] FrameSourceError),
    #[error("Processor failed due to Calibration error: {0}")]
    CalibrationError(#[from] CalibrationError),
    #[error("Processor failed due to RecordSink error: {0}")]
    SinkError(#[from] SinkError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
}
