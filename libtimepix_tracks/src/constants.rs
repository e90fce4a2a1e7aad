// Detector geometry
pub const FRAME_WIDTH: usize = 256;
pub const FRAME_HEIGHT: usize = 256;
pub const PIXEL_COUNT: usize = FRAME_WIDTH * FRAME_HEIGHT;

// Pixelman .dsc layout, per frame
pub const DSC_HEADER_LINES: usize = 5;
pub const DSC_FIELD_COUNT: usize = 13;
pub const DSC_LINES_PER_FIELD: usize = 4;
pub const DSC_TRAILER_LINES: usize = 2;

// Description keys the frame metadata depends on
pub const ACQ_TIME_KEY: &str = "Acq time";
pub const ACQ_START_KEY: &str = "Acq Serie Start time";

/// Default suffix appended to a .pmf path to locate its description file
pub const DEFAULT_DESCRIPTION_SUFFIX: &str = ".dsc";

/// Decimal places used when testing whether an intersection lies on a segment
pub const INTERSECTION_ROUNDING_DIGITS: i32 = 4;
