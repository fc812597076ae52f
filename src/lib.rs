pub mod config;
pub mod error;
pub mod plotting;
pub mod scan;
pub mod types;

pub use config::{load_config, load_config_or_default, AppConfig};
pub use error::ScanError;
pub use plotting::{plot_spectrum, plot_values};
pub use scan::{
    decode, encode, read_scan, read_scan_info, rewrite_scan, write_scan, GridDescriptor, ScanInfo,
    WriteReport,
};
pub use types::{
    Decoded, GridKind, Measurements, Notice, OutputDims, PartialFilePolicy, ReadOptions,
    ScanData, ScanHeader, WriteOptions,
};
