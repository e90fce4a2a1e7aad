use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::calibration::Calibration;
use super::constants::DEFAULT_DESCRIPTION_SUFFIX;
use super::error::{CalibrationError, ConfigError};
use super::frame_source::MalformedFramePolicy;

/// Paths to the four per-pixel calibration tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPaths {
    pub a: PathBuf,
    pub b: PathBuf,
    pub c: PathBuf,
    pub t: PathBuf,
}

/// Structure representing the application configuration. Contains the acquisitions to
/// process and where to put the results.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Paths to the .pmf data files
    pub acquisitions: Vec<PathBuf>,
    /// Appended to a data path to find its description file
    pub description_suffix: String,
    pub output_path: PathBuf,
    pub calibration: Option<CalibrationPaths>,
    pub malformed_frame_policy: MalformedFramePolicy,
    pub n_threads: i32,
}

impl Default for Config {
    /// Generate a new Config object. Paths will be empty/invalid
    fn default() -> Self {
        Self {
            acquisitions: vec![],
            description_suffix: String::from(DEFAULT_DESCRIPTION_SUFFIX),
            output_path: PathBuf::from("None"),
            calibration: None,
            malformed_frame_policy: MalformedFramePolicy::default(),
            n_threads: 1,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Write the configuration to a YAML file
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        std::fs::write(config_path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// The description file of a data file is the data path plus the suffix
    pub fn get_description_path(&self, data_path: &Path) -> PathBuf {
        let mut path = OsString::from(data_path.as_os_str());
        path.push(&self.description_suffix);
        PathBuf::from(path)
    }

    /// Name of an acquisition: the data file name
    pub fn get_acquisition_name(&self, data_path: &Path) -> String {
        data_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| data_path.to_string_lossy().to_string())
    }

    fn get_output_name(&self, data_path: &Path, extension: &str) -> Result<PathBuf, ConfigError> {
        if !self.output_path.exists() {
            return Err(ConfigError::BadFilePath(self.output_path.clone()));
        }
        let stem = data_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| String::from("acquisition"));
        Ok(self.output_path.join(format!("{stem}.{extension}")))
    }

    /// Get the path to the output records file
    pub fn get_output_file(&self, data_path: &Path) -> Result<PathBuf, ConfigError> {
        self.get_output_name(data_path, "jsonl")
    }

    /// Get the path to the yaml summary file
    pub fn get_summary_file(&self, data_path: &Path) -> Result<PathBuf, ConfigError> {
        self.get_output_name(data_path, "yml")
    }

    /// Load the calibration tables, if any are configured
    pub fn load_calibration(&self) -> Result<Option<Calibration>, CalibrationError> {
        match &self.calibration {
            Some(paths) => Ok(Some(Calibration::from_files(
                &paths.a, &paths.b, &paths.c, &paths.t,
            )?)),
            None => Ok(None),
        }
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }

    pub fn has_calibration(&self) -> bool {
        self.calibration.is_some()
    }

    pub fn does_acquisition_exist(&self, data_path: &Path) -> bool {
        data_path.exists() && self.get_description_path(data_path).exists()
    }
}
