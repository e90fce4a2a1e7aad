use serde::{Deserialize, Serialize};
use std::path::Path;

use super::constants::{ACQ_START_KEY, ACQ_TIME_KEY};
use super::dsc_file::DscFile;
use super::error::{DscFileError, FrameSourceError, PmfFileError};
use super::frame::{FrameDescription, FrameHeader, FrameMetadata, RawFrame};
use super::pmf_file::PmfFile;

/// What to do with a data block that is not a full FRAME_HEIGHT x FRAME_WIDTH matrix.
///
/// The description file is matched to the data file purely by position, so a skipped
/// data block still advances the description reader by one block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MalformedFramePolicy {
    /// Log a warning, emit nothing for the block and keep reading
    #[default]
    Skip,
    /// Treat the block as a loss of alignment and stop
    Abort,
}

fn parse_required(description: &FrameDescription, key: &str) -> Result<f64, DscFileError> {
    let value = description
        .get(key)
        .ok_or_else(|| DscFileError::MissingKey(key.to_string()))?;
    value.trim().parse::<f64>().map_err(|_| DscFileError::BadValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// FrameSource reads a .pmf data file and its .dsc description file in lockstep,
/// producing one RawFrame per well-formed data block.
///
/// FrameSource is a single pass iterator: it owns both file handles, cannot be
/// rewound, and stops for good after reaching the end of the data or a fatal error.
#[derive(Debug)]
pub struct FrameSource {
    data_file: PmfFile,
    dsc_file: DscFile,
    policy: MalformedFramePolicy,
    block_index: usize,
    frames_emitted: usize,
    frames_skipped: usize,
    is_ended: bool,
}

impl FrameSource {
    /// Open a data/description pair. Both paths are checked before either file is read.
    pub fn new(
        data_path: &Path,
        description_path: &Path,
        policy: MalformedFramePolicy,
    ) -> Result<Self, FrameSourceError> {
        if !data_path.exists() {
            return Err(PmfFileError::BadFilePath(data_path.to_path_buf()).into());
        }
        if !description_path.exists() {
            return Err(DscFileError::BadFilePath(description_path.to_path_buf()).into());
        }
        Ok(Self {
            data_file: PmfFile::new(data_path)?,
            dsc_file: DscFile::new(description_path)?,
            policy,
            block_index: 0,
            frames_emitted: 0,
            frames_skipped: 0,
            is_ended: false,
        })
    }

    /// Get the next frame.
    ///
    /// Returns a `Result<Option<RawFrame>>`. The Option is None once the data file is
    /// exhausted.
    pub fn get_next_frame(&mut self) -> Result<Option<RawFrame>, FrameSourceError> {
        loop {
            if self.is_ended {
                return Ok(None);
            }

            let block = self.block_index;
            match self.data_file.get_next_frame() {
                Ok(data) => {
                    self.block_index += 1;
                    let (header, description) = match self.dsc_file.get_next_description() {
                        Ok(parsed) => parsed,
                        Err(e) => {
                            // Descriptions are matched by position; a broken one ends the source
                            self.is_ended = true;
                            spdlog::error!(
                                "Could not read the description of block {block} from {}: {e}",
                                self.dsc_file.get_filename().display()
                            );
                            return Err(e.into());
                        }
                    };
                    if !header.has_expected_shape() {
                        spdlog::warn!(
                            "Frame {} declares shape {:?}x{:?} in its description; reading it as 256x256",
                            header.identifier,
                            header.width,
                            header.height
                        );
                    }
                    let metadata = FrameMetadata {
                        acq_time: parse_required(&description, ACQ_TIME_KEY)?,
                        acq_start: parse_required(&description, ACQ_START_KEY)?,
                        description,
                        header,
                        block_index: block,
                    };
                    self.frames_emitted += 1;
                    return Ok(Some(RawFrame::new(data, metadata)));
                }
                Err(PmfFileError::EndOfFile) => {
                    self.is_ended = true;
                    return Ok(None);
                }
                Err(e @ (PmfFileError::TruncatedFrame(_) | PmfFileError::BadRowWidth { .. })) => {
                    self.block_index += 1;
                    if self.policy == MalformedFramePolicy::Abort {
                        self.is_ended = true;
                        return Err(FrameSourceError::MalformedFrame { block, reason: e });
                    }
                    spdlog::warn!(
                        "Observed incorrect frame format in block {block} of {} ({e}), skipping...",
                        self.data_file.get_filename().display()
                    );
                    self.frames_skipped += 1;
                    // Keep the description stream in step; a short tail at the end is fine
                    match self.dsc_file.get_next_description() {
                        Ok(_) | Err(DscFileError::EndOfFile) => (),
                        Err(e) => return Err(e.into()),
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn get_total_data_size(&self) -> u64 {
        self.data_file.get_size_bytes()
    }

    pub fn get_bytes_read(&self) -> u64 {
        self.data_file.get_bytes_read()
    }

    pub fn get_frames_emitted(&self) -> usize {
        self.frames_emitted
    }

    pub fn get_frames_skipped(&self) -> usize {
        self.frames_skipped
    }

    pub fn get_acquisition_header(&self) -> &str {
        self.dsc_file.get_acquisition_header()
    }
}

impl Iterator for FrameSource {
    type Item = Result<RawFrame, FrameSourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.get_next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => None,
            Err(e) => {
                self.is_ended = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for FrameSource {}
