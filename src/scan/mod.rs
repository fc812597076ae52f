//! Reading and writing `*.scan` measurement files.
//!
//! The format is a flat sequence of little-endian doubles: identity, free-text
//! fields, grid descriptor, channel names, spectrum info, coordinates, frequencies
//! and finally the measurement block in wire order.

pub mod codec;
pub mod file;
pub mod grid;
pub mod header;
pub mod protocol;
pub mod transform;

pub use codec::{ScanReader, ScanWriter, Stage};
pub use file::{
    decode, encode, read_scan, read_scan_info, resolve_scan_path, rewrite_scan, write_scan,
    PreparedScan, RewriteReport, WriteReport,
};
pub use grid::{AxisPlan, EncodePlan, GridDescriptor};
pub use header::ScanInfo;
pub use protocol::{Protocol, SCAN_EXTENSION, SCAN_FILE_CODE, SCAN_FILE_VERSION};
