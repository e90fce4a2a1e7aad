use ndarray::Array2;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::constants::{FRAME_HEIGHT, FRAME_WIDTH};
use super::error::PmfFileError;

/// Parse a single count. Pixelman writes either integers or integral decimals.
fn parse_count(token: &str, line: usize) -> Result<u32, PmfFileError> {
    if let Ok(value) = token.parse::<u32>() {
        return Ok(value);
    }
    match token.parse::<f64>() {
        Ok(value) if value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64 => {
            Ok(value as u32)
        }
        _ => Err(PmfFileError::BadCount {
            value: token.to_string(),
            line,
        }),
    }
}

/// Reader for the data half of a Pixelman acquisition (the .pmf ASCII matrix file).
///
/// The file is a plain concatenation of frame blocks, each FRAME_HEIGHT lines of
/// FRAME_WIDTH whitespace separated counts. Blank lines between blocks are ignored;
/// a blank line inside a block cuts that block short.
#[derive(Debug)]
pub struct PmfFile {
    reader: BufReader<File>,
    file_path: PathBuf,
    size_bytes: u64,
    bytes_read: u64,
    line_number: usize,
    is_eof: bool,
}

impl PmfFile {
    /// Open a .pmf file for reading
    pub fn new(path: &Path) -> Result<Self, PmfFileError> {
        if !path.exists() {
            return Err(PmfFileError::BadFilePath(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let size_bytes = file.metadata()?.len();
        Ok(Self {
            reader: BufReader::new(file),
            file_path: path.to_path_buf(),
            size_bytes,
            bytes_read: 0,
            line_number: 0,
            is_eof: size_bytes == 0,
        })
    }

    /// Read one line into the buffer. Returns false at end of file.
    fn read_line(&mut self, buffer: &mut String) -> Result<bool, PmfFileError> {
        buffer.clear();
        let n_bytes = self.reader.read_line(buffer)?;
        if n_bytes == 0 {
            self.is_eof = true;
            return Ok(false);
        }
        self.bytes_read += n_bytes as u64;
        self.line_number += 1;
        Ok(true)
    }

    /// Read the next frame block.
    ///
    /// Returns `EndOfFile` once no data remains. A block with fewer than FRAME_HEIGHT
    /// lines gives `TruncatedFrame` and a block with a row of the wrong width gives
    /// `BadRowWidth`; in both cases the block has been consumed and the next call
    /// continues with the following block.
    pub fn get_next_frame(&mut self) -> Result<Array2<u32>, PmfFileError> {
        let mut line = String::new();
        // Skip separators before the block
        loop {
            if !self.read_line(&mut line)? {
                return Err(PmfFileError::EndOfFile);
            }
            if !line.trim().is_empty() {
                break;
            }
        }

        let mut data = Array2::<u32>::zeros((FRAME_HEIGHT, FRAME_WIDTH));
        let mut bad_width: Option<(usize, usize)> = None;
        let mut rows: usize = 0;
        loop {
            if line.trim().is_empty() {
                break;
            }
            let n_fields = line.split_whitespace().count();
            if n_fields != FRAME_WIDTH {
                bad_width.get_or_insert((self.line_number, n_fields));
            } else {
                for (col, token) in line.split_whitespace().enumerate() {
                    data[[rows, col]] = parse_count(token, self.line_number)?;
                }
            }
            rows += 1;

            if rows == FRAME_HEIGHT || !self.read_line(&mut line)? {
                break;
            }
        }

        if rows < FRAME_HEIGHT {
            return Err(PmfFileError::TruncatedFrame(rows));
        }
        if let Some((line, found)) = bad_width {
            return Err(PmfFileError::BadRowWidth { line, found });
        }
        Ok(data)
    }

    pub fn is_eof(&self) -> bool {
        self.is_eof
    }

    pub fn get_filename(&self) -> &Path {
        &self.file_path
    }

    pub fn get_size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn get_bytes_read(&self) -> u64 {
        self.bytes_read
    }
}
