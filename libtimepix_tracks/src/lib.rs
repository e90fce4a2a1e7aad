//! # timepix_tracks
//!
//! timepix_tracks ingests Timepix/Medipix acquisitions recorded by Pixelman as ASCII
//! `.pmf` matrices with their `.pmf.dsc` description files. Every frame is split into
//! clusters of 8-connected hit pixels; each cluster is described by a fixed set of
//! region properties and, where possible, a track length measured by clipping a
//! least-squares line to the cluster's minimum-area bounding box. Optionally, a per-pixel
//! calibration converts time-over-threshold counts to energy.
//!
//! ## Installation
//!
//! The only method of install is from source. If you have not used Rust before, you will
//! most likely need to install the Rust tool chain. See the
//! [Rust docs](https://www.rust-lang.org/tools/install) for installation instructions.
//!
//! To build and install the CLI use `cargo install --path ./timepix_tracks_cli` from the
//! top level timepix_tracks repository.
//!
//! ## Configuration
//!
//! The YAML format of a configuration file is as follows:
//!
//! ```yml
//! acquisitions:
//! - /path/to/run.pmf
//! description_suffix: .dsc
//! output_path: /path/to/output
//! calibration: null
//! malformed_frame_policy: Skip
//! n_threads: 1
//! ```
//!
//! - `acquisitions`: the data files to process. The description file of each is found by
//! appending `description_suffix` to the data path.
//! - `output_path`: an existing directory where records, summaries and the log are
//! written.
//! - `calibration`: either `null` or the paths to the four calibration tables,
//! `{a: .., b: .., c: .., t: ..}`. Each table is a whitespace separated text file with one
//! coefficient per pixel in row-major order.
//! - `malformed_frame_policy`: `Skip` drops data blocks that are not 256x256 with a
//! warning; `Abort` stops the acquisition with an error.
//! - `n_threads`: the number of workers to divide the acquisitions amongst. Must be at
//! least 1.
//!
//! ## Input Format
//!
//! A data file is a sequence of blocks of 256 lines with 256 whitespace separated counts
//! each. A blank line, or the end of the file, ends a block early; such a block is
//! malformed. The description file has one leading line, then per frame a 5 line header,
//! 13 fields of 4 lines (blank, `"key" ("unit"):`, type, value) and 2 trailing lines.
//! Blocks are paired with descriptions by position. Every description must carry the
//! `Acq time` and `Acq Serie Start time` fields.
//!
//! ## Output
//!
//! Each acquisition produces `<stem>.jsonl` and `<stem>.yml` in the output directory.
//! The JSON-lines file holds one object per line with a `kind` and a sequential `id`:
//!
//! ```text
//! {"kind": "acquisition", "id": 1, "name": ...}
//! {"kind": "frame", "id": 1, "acquisition_id": 1, "frame_data": [[row, col, count], ...], "acq_time", "acq_start", "description", "counts"}
//! {"kind": "cluster", "id": 1, "frame_id": 1, "area", "bbox", ..., "min_area_box", "intersections", "track_length", "energy"}
//! ```
//!
//! Undefined values (no box, no track length, no calibration, normalized moments below
//! second order) are `null`. The YAML summary counts frames, skipped frames and clusters.
pub mod acquisition;
pub mod calibration;
pub mod cluster;
pub mod clustering;
pub mod config;
pub mod constants;
pub mod dsc_file;
pub mod error;
pub mod frame;
pub mod frame_source;
pub mod geometry;
pub mod pmf_file;
pub mod process;
pub mod record;
pub mod region;
pub mod sparse;
pub mod storage;
pub mod worker_status;
