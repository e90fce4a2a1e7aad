use ndarray::Array2;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::constants::{FRAME_HEIGHT, FRAME_WIDTH};

/// The per-frame header block of a Pixelman description file.
///
/// Only the identifier is guaranteed; the remaining entries are parsed from the
/// `Type=<type> <storage> width=<w> height=<h>` line when present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameHeader {
    pub identifier: String,
    pub data_type: Option<String>,
    pub storage_type: Option<String>,
    pub width: Option<usize>,
    pub height: Option<usize>,
}

impl FrameHeader {
    /// Parse the identifier line and the type line of the 5-line header
    pub fn parse(identifier_line: &str, type_line: &str) -> Self {
        let mut header = FrameHeader {
            identifier: identifier_line.trim().to_string(),
            ..Default::default()
        };
        let mut tokens = type_line.split_whitespace();
        if let Some(token) = tokens.next() {
            header.data_type = token.split('=').last().map(String::from);
        }
        header.storage_type = tokens.next().map(String::from);
        for token in tokens {
            match token.split_once('=') {
                Some(("width", w)) => header.width = w.parse().ok(),
                Some(("height", h)) => header.height = h.parse().ok(),
                _ => (),
            }
        }
        header
    }

    /// Check that the declared shape (if any) matches the detector
    pub fn has_expected_shape(&self) -> bool {
        self.width.map_or(true, |w| w == FRAME_WIDTH)
            && self.height.map_or(true, |h| h == FRAME_HEIGHT)
    }
}

/// Ordered key/value description of a frame, in file order.
///
/// Serializes as a JSON/YAML map that keeps the file order of the keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameDescription {
    entries: Vec<(String, String)>,
}

impl FrameDescription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key; a repeated key overwrites the value but keeps its first position
    pub fn insert(&mut self, key: String, value: String) {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Serialize for FrameDescription {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in self.entries.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameMetadata {
    pub acq_time: f64,
    pub acq_start: f64,
    pub description: FrameDescription,
    pub header: FrameHeader,
    /// Zero-based index of the data block this frame was read from
    pub block_index: usize,
}

/// A single 256x256 frame of per-pixel counts and its metadata.
///
/// Frames are produced by the FrameSource and are not modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    data: Array2<u32>,
    metadata: FrameMetadata,
}

impl RawFrame {
    pub fn new(data: Array2<u32>, metadata: FrameMetadata) -> Self {
        debug_assert_eq!(data.dim(), (FRAME_HEIGHT, FRAME_WIDTH));
        Self { data, metadata }
    }

    pub fn data(&self) -> &Array2<u32> {
        &self.data
    }

    pub fn metadata(&self) -> &FrameMetadata {
        &self.metadata
    }

    pub fn acq_time(&self) -> f64 {
        self.metadata.acq_time
    }

    pub fn acq_start(&self) -> f64 {
        self.metadata.acq_start
    }

    pub fn description(&self) -> &FrameDescription {
        &self.metadata.description
    }
}
