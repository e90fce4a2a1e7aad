use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::constants::*;
use super::error::DscFileError;
use super::frame::{FrameDescription, FrameHeader};

/// Split a field line of the form `"<key>" ("<unit>"):` into key and unit.
///
/// Mirrors a leftmost, greedy match: the key runs from the first quote to the last
/// `" ("` that is still followed by a closing `"):`.
pub fn parse_field_line(line: &str) -> Option<(&str, &str)> {
    let start = line.find('"')?;
    let end = line.rfind("\"):")?;
    let bytes = line.as_bytes();
    let mut split = None;
    // `" ("` must end at or before the closing quote; the unit may be empty
    let mut idx = end.checked_sub(4)?;
    while idx > start {
        if bytes[idx] == b'"' && bytes[idx + 1].is_ascii_whitespace() && &bytes[idx + 2..idx + 4] == b"(\"" {
            split = Some(idx);
            break;
        }
        idx -= 1;
    }
    let split = split?;
    Some((&line[start + 1..split], &line[split + 4..end]))
}

/// Reader for the description half of a Pixelman acquisition (the .pmf.dsc file).
///
/// After one shared leading line, each frame is described by a fixed block: a
/// DSC_HEADER_LINES header, DSC_FIELD_COUNT field groups of DSC_LINES_PER_FIELD lines
/// and DSC_TRAILER_LINES trailing lines. Everything is matched by position, so the
/// reader must advance exactly one block per data block.
#[derive(Debug)]
pub struct DscFile {
    reader: BufReader<File>,
    file_path: PathBuf,
    acquisition_header: String,
    line_number: usize,
}

impl DscFile {
    /// Open a .dsc file and consume the shared leading line
    pub fn new(path: &Path) -> Result<Self, DscFileError> {
        if !path.exists() {
            return Err(DscFileError::BadFilePath(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let mut dsc = Self {
            reader: BufReader::new(file),
            file_path: path.to_path_buf(),
            acquisition_header: String::new(),
            line_number: 0,
        };
        dsc.acquisition_header = match dsc.read_line() {
            Ok(line) => line.trim().to_string(),
            Err(DscFileError::EndOfFile) => String::new(),
            Err(e) => return Err(e),
        };
        Ok(dsc)
    }

    fn read_line(&mut self) -> Result<String, DscFileError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(DscFileError::EndOfFile);
        }
        self.line_number += 1;
        Ok(line)
    }

    fn read_lines<const N: usize>(&mut self) -> Result<[String; N], DscFileError> {
        let mut lines: [String; N] = std::array::from_fn(|_| String::new());
        for line in lines.iter_mut() {
            *line = self.read_line()?;
        }
        Ok(lines)
    }

    fn read_frame_header(&mut self) -> Result<FrameHeader, DscFileError> {
        let lines = self.read_lines::<DSC_HEADER_LINES>()?;
        Ok(FrameHeader::parse(&lines[0], &lines[1]))
    }

    fn read_frame_field(&mut self) -> Result<(String, String), DscFileError> {
        let lines = self.read_lines::<DSC_LINES_PER_FIELD>()?;
        // The key line is the second of the group
        let key_line_number = self.line_number + 2 - DSC_LINES_PER_FIELD;
        match parse_field_line(&lines[1]) {
            Some((key, _unit)) => Ok((key.to_string(), lines[3].trim().to_string())),
            None => Err(DscFileError::FieldMismatch {
                line: key_line_number,
                text: lines[1].trim_end().to_string(),
            }),
        }
    }

    /// Read the next frame description block
    pub fn get_next_description(
        &mut self,
    ) -> Result<(FrameHeader, FrameDescription), DscFileError> {
        let header = self.read_frame_header()?;
        let mut description = FrameDescription::new();
        for _ in 0..DSC_FIELD_COUNT {
            let (key, value) = self.read_frame_field()?;
            description.insert(key, value);
        }
        self.read_lines::<DSC_TRAILER_LINES>()?;
        Ok((header, description))
    }

    pub fn get_acquisition_header(&self) -> &str {
        &self.acquisition_header
    }

    pub fn get_filename(&self) -> &Path {
        &self.file_path
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    /// Write one frame description block with the two timing keys first
    pub(crate) fn write_description_block(
        file: &mut impl Write,
        index: usize,
        acq_time: f64,
        acq_start: f64,
    ) {
        writeln!(file, "A{index:09}").unwrap();
        writeln!(file, "Type=i16 [X,Y,C] width=256 height=256").unwrap();
        writeln!(file, "\"Start time\" (\"Start time in seconds\"):").unwrap();
        writeln!(file, "double[1]").unwrap();
        writeln!(file, "{acq_start}").unwrap();
        let mut fields = vec![
            (String::from("Acq time"), String::from("Acquisition time [s]"), format!("{acq_time}")),
            (
                String::from("Acq Serie Start time"),
                String::from("Acquisition serie start time"),
                format!("{acq_start}"),
            ),
        ];
        for extra in 0..(DSC_FIELD_COUNT - 2) {
            fields.push((format!("Field {extra}"), String::from("unit"), format!("{extra}")));
        }
        for (key, unit, value) in fields {
            writeln!(file).unwrap();
            writeln!(file, "\"{key}\" (\"{unit}\"):").unwrap();
            writeln!(file, "double[1]").unwrap();
            writeln!(file, "{value}").unwrap();
        }
        writeln!(file).unwrap();
        writeln!(file).unwrap();
    }

    #[test]
    fn test_parse_field_line() {
        assert_eq!(
            parse_field_line("\"Acq time\" (\"Acquisition time [s]\"):\n"),
            Some(("Acq time", "Acquisition time [s]"))
        );
        assert_eq!(
            parse_field_line("\"Mpx type\" (\"Medipix type (1-2.1, 2-MXR, 3-TPX)\"):"),
            Some(("Mpx type", "Medipix type (1-2.1, 2-MXR, 3-TPX)"))
        );
        assert_eq!(parse_field_line("double[1]"), None);
        assert_eq!(parse_field_line("\"no unit\":"), None);
        assert_eq!(parse_field_line("\"k\" (\"\"):"), Some(("k", "")));
        assert_eq!(parse_field_line("\"k\" (\"):"), None);
        assert_eq!(parse_field_line("\"\""), None);
        assert_eq!(parse_field_line(""), None);
    }

    #[test]
    fn test_read_descriptions() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ASCII acquisition").unwrap();
        write_description_block(&mut file, 1, 0.5, 1567678636.25);
        write_description_block(&mut file, 2, 0.5, 1567678637.25);
        file.flush().unwrap();

        let mut dsc = DscFile::new(file.path()).unwrap();
        assert_eq!(dsc.get_acquisition_header(), "ASCII acquisition");
        let (header, description) = dsc.get_next_description().unwrap();
        assert_eq!(header.identifier, "A000000001");
        assert_eq!(description.len(), DSC_FIELD_COUNT);
        assert_eq!(description.get(ACQ_TIME_KEY), Some("0.5"));
        let (_, description) = dsc.get_next_description().unwrap();
        assert_eq!(description.get(ACQ_START_KEY), Some("1567678637.25"));
        assert!(matches!(
            dsc.get_next_description(),
            Err(DscFileError::EndOfFile)
        ));
    }

    #[test]
    fn test_field_mismatch() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ASCII acquisition").unwrap();
        for _ in 0..DSC_HEADER_LINES {
            writeln!(file, "header").unwrap();
        }
        writeln!(file).unwrap();
        writeln!(file, "Acq time: 0.5").unwrap();
        writeln!(file, "double[1]").unwrap();
        writeln!(file, "0.5").unwrap();
        file.flush().unwrap();

        let mut dsc = DscFile::new(file.path()).unwrap();
        match dsc.get_next_description() {
            Err(DscFileError::FieldMismatch { line, .. }) => assert_eq!(line, 8),
            other => panic!("Expected a field mismatch, got {other:?}"),
        }
    }
}
