use std::path::Path;

use super::cluster::Cluster;
use super::clustering::cluster;
use super::error::FrameSourceError;
use super::frame::RawFrame;
use super::frame_source::{FrameSource, MalformedFramePolicy};

/// A RawFrame together with the clusters found in it.
#[derive(Debug, Clone)]
pub struct Frame {
    raw: RawFrame,
    clusters: Vec<Cluster>,
    counts: usize,
}

impl Frame {
    /// Cluster a RawFrame
    pub fn new(raw: RawFrame) -> Self {
        let (clusters, counts) = cluster(&raw);
        Self {
            raw,
            clusters,
            counts,
        }
    }

    pub fn raw(&self) -> &RawFrame {
        &self.raw
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Number of clusters found in the frame
    pub fn counts(&self) -> usize {
        self.counts
    }

}

/// Acquisition is one named recording session: a FrameSource whose frames are
/// clustered as they are pulled.
///
/// Frames come out in file order. Dropping the Acquisition releases both files.
#[derive(Debug)]
pub struct Acquisition {
    name: String,
    source: FrameSource,
}

impl Acquisition {
    /// Open an acquisition, skipping malformed data blocks
    pub fn new(name: &str, data_path: &Path, description_path: &Path) -> Result<Self, FrameSourceError> {
        Self::with_policy(name, data_path, description_path, MalformedFramePolicy::default())
    }

    pub fn with_policy(
        name: &str,
        data_path: &Path,
        description_path: &Path,
        policy: MalformedFramePolicy,
    ) -> Result<Self, FrameSourceError> {
        Ok(Self {
            name: name.to_string(),
            source: FrameSource::new(data_path, description_path, policy)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &FrameSource {
        &self.source
    }

    /// Get the next clustered frame, or None once the data is exhausted
    pub fn get_next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError> {
        Ok(self.source.get_next_frame()?.map(Frame::new))
    }
}

impl Iterator for Acquisition {
    type Item = Result<Frame, FrameSourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.source.next().map(|raw| raw.map(Frame::new))
    }
}

impl std::iter::FusedIterator for Acquisition {}
