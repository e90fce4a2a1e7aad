use serde::Serialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::error::SinkError;
use super::record::{ClusterRecord, FrameRecord};

/// The storage collaborator of the ingestion stage.
///
/// Records arrive in order: one acquisition, then each frame followed by its clusters.
/// The sink assigns the ids that link them.
pub trait RecordSink {
    /// Start a new acquisition and return its id
    fn begin_acquisition(&mut self, name: &str) -> Result<u64, SinkError>;
    /// Store a frame and return its id
    fn write_frame(&mut self, record: &FrameRecord) -> Result<u64, SinkError>;
    /// Store a cluster of a previously written frame and return its id
    fn write_cluster(&mut self, frame_id: u64, record: &ClusterRecord) -> Result<u64, SinkError>;
    /// Flush everything to the backing store
    fn finish(&mut self) -> Result<(), SinkError>;
}

/// Writes every record as one JSON object per line, tagged with a `kind` of
/// `acquisition`, `frame` or `cluster` and a sequential `id` (per kind, from 1).
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: BufWriter<W>,
    last_acquisition_id: u64,
    last_frame_id: u64,
    last_cluster_id: u64,
}

impl JsonLinesSink<File> {
    /// Create (or truncate) the output file
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            last_acquisition_id: 0,
            last_frame_id: 0,
            last_cluster_id: 0,
        }
    }

    fn write_line<T: Serialize>(
        &mut self,
        kind: &str,
        id: u64,
        record: &T,
        links: &[(&str, u64)],
    ) -> Result<(), SinkError> {
        let mut object = serde_json::Map::new();
        object.insert(String::from("kind"), Value::from(kind));
        object.insert(String::from("id"), Value::from(id));
        for (key, value) in links {
            object.insert(key.to_string(), Value::from(*value));
        }
        if let Value::Object(fields) = serde_json::to_value(record)? {
            object.extend(fields);
        }
        serde_json::to_writer(&mut self.writer, &object)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Consume the sink and hand back the underlying writer
    pub fn into_inner(mut self) -> Result<W, SinkError> {
        self.writer.flush()?;
        self.writer
            .into_inner()
            .map_err(|e| SinkError::IOError(e.into_error()))
    }
}

#[derive(Serialize)]
struct AcquisitionLine<'a> {
    name: &'a str,
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn begin_acquisition(&mut self, name: &str) -> Result<u64, SinkError> {
        self.last_acquisition_id += 1;
        let id = self.last_acquisition_id;
        self.write_line("acquisition", id, &AcquisitionLine { name }, &[])?;
        Ok(id)
    }

    fn write_frame(&mut self, record: &FrameRecord) -> Result<u64, SinkError> {
        if self.last_acquisition_id == 0 {
            return Err(SinkError::NoAcquisition);
        }
        self.last_frame_id += 1;
        let id = self.last_frame_id;
        self.write_line("frame", id, record, &[])?;
        Ok(id)
    }

    fn write_cluster(&mut self, frame_id: u64, record: &ClusterRecord) -> Result<u64, SinkError> {
        if self.last_acquisition_id == 0 {
            return Err(SinkError::NoAcquisition);
        }
        self.last_cluster_id += 1;
        let id = self.last_cluster_id;
        self.write_line("cluster", id, record, &[("frame_id", frame_id)])?;
        Ok(id)
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps records in memory. Useful for tests and for callers that post-process
/// records themselves.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub acquisitions: Vec<String>,
    pub frames: Vec<FrameRecord>,
    /// (frame id, record)
    pub clusters: Vec<(u64, ClusterRecord)>,
    pub is_finished: bool,
}

impl RecordSink for MemorySink {
    fn begin_acquisition(&mut self, name: &str) -> Result<u64, SinkError> {
        self.acquisitions.push(name.to_string());
        Ok(self.acquisitions.len() as u64)
    }

    fn write_frame(&mut self, record: &FrameRecord) -> Result<u64, SinkError> {
        if self.acquisitions.is_empty() {
            return Err(SinkError::NoAcquisition);
        }
        self.frames.push(record.clone());
        Ok(self.frames.len() as u64)
    }

    fn write_cluster(&mut self, frame_id: u64, record: &ClusterRecord) -> Result<u64, SinkError> {
        if self.acquisitions.is_empty() {
            return Err(SinkError::NoAcquisition);
        }
        self.clusters.push((frame_id, record.clone()));
        Ok(self.clusters.len() as u64)
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.is_finished = true;
        Ok(())
    }
}

/// Bookkeeping of one processed acquisition, written as YAML next to the records
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AcquisitionSummary {
    pub name: String,
    pub data_path: String,
    pub data_size: String,
    pub acquisition_header: String,
    pub frames_written: usize,
    pub frames_skipped: usize,
    pub clusters: usize,
    pub clusters_without_track: usize,
    pub calibrated: bool,
    /// RFC 3339 start time of the first frame
    pub first_frame_start: Option<String>,
    pub last_frame_start: Option<String>,
}

impl AcquisitionSummary {
    pub fn write(&self, path: &Path) -> Result<(), SinkError> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(self)?.as_bytes())?;
        Ok(())
    }
}

/// Format a unix time in seconds as RFC 3339, if it is representable
pub fn format_start_time(acq_start: f64) -> Option<String> {
    if !acq_start.is_finite() {
        return None;
    }
    let nanos = (acq_start * 1.0e9).round() as i128;
    time::OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()?
        .format(&time::format_description::well_known::Rfc3339)
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_record() -> FrameRecord {
        FrameRecord {
            acquisition_id: 1,
            frame_data: vec![crate::sparse::SparseEntry(1, 2, 3)],
            acq_time: 0.5,
            acq_start: 1000.0,
            description: String::from("{\"Acq time\":\"0.5\"}"),
            counts: 1,
        }
    }

    #[test]
    fn test_json_lines() {
        let mut sink = JsonLinesSink::new(Vec::new());
        assert!(matches!(
            sink.write_frame(&frame_record()),
            Err(SinkError::NoAcquisition)
        ));
        assert_eq!(sink.begin_acquisition("run.pmf").unwrap(), 1);
        assert_eq!(sink.write_frame(&frame_record()).unwrap(), 1);
        assert_eq!(sink.write_frame(&frame_record()).unwrap(), 2);
        sink.finish().unwrap();

        let text = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        let lines: Vec<Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["kind"], "acquisition");
        assert_eq!(lines[0]["name"], "run.pmf");
        assert_eq!(lines[1]["kind"], "frame");
        assert_eq!(lines[1]["id"], 1);
        assert_eq!(lines[1]["frame_data"], serde_json::json!([[1, 2, 3]]));
        assert_eq!(lines[2]["id"], 2);
        assert_eq!(lines[2]["acquisition_id"], 1);
    }

    #[test]
    fn test_summary_yaml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("run.yml");
        let summary = AcquisitionSummary {
            name: String::from("run.pmf"),
            frames_written: 3,
            first_frame_start: format_start_time(0.0),
            ..Default::default()
        };
        summary.write(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("frames_written: 3"));
        assert!(text.contains("1970-01-01T00:00:00Z"));
    }

    #[test]
    fn test_format_start_time() {
        assert_eq!(
            format_start_time(1567678636.5).as_deref(),
            Some("2019-09-05T10:17:16.5Z")
        );
        assert_eq!(format_start_time(f64::NAN), None);
    }
}
