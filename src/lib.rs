//! EMD Volume - Electron Microscopy Data volumes in HDF5
//!
//! Reads and writes dense 3-D volumes in the EMD tomography layout, an HDF5
//! schema shared by electron microscopy tools.
//!
//! # Features
//!
//! - `f32`, `u32`, `u16` and `u8` volumes, stored little-endian
//! - The fixed EMD 0.2 group layout with version and group-type attributes
//! - Coordinate datasets for the x, y and z axes
//! - Tolerant reading of files with missing or malformed descriptive metadata
//!
//! # Byte order
//!
//! Files always hold little-endian data, whatever host wrote them. Datasets
//! are created with the host's native types, so the crate only builds for
//! little-endian targets; compiling for a big-endian target is an error.
//! Reading rejects stored types that are not exactly the little-endian
//! encodings above.
//!
//! # Example
//!
//! ```rust,no_run
//! use emd_volume::{ElementType, Volume};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let voxels: Vec<u8> = (0..64).collect();
//! let volume = Volume::from_vec([4, 4, 4], voxels)?;
//! emd_volume::write("tomogram.emd", &volume)?;
//!
//! let loaded = emd_volume::read("tomogram.emd")?;
//! assert_eq!(loaded.element_type(), ElementType::U8);
//! assert_eq!(loaded.get::<u8>([1, 2, 3]), Some(27));
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod error;
pub mod io;
pub mod metadata;
pub mod schema;
pub mod types;
pub mod utils;
pub mod volume;

// Re-exports
pub use codec::{inspect, read, read_with_options, write, ReadOptions, ReadOutcome};
pub use error::{EmdError, MetadataIssue, Result, StepFailure, WriteStep};
pub use io::{AttributeKind, AttributeValue, Container, NodeKind, OpenMode, RawDataset};
pub use metadata::{EmdHeader, FormatVersion};
pub use schema::CoordinateAxis;
pub use types::{AxisDescriptor, ElementType, ScalarType, ValueRange};
pub use volume::{Element, ElementBuffer, RawVolume, Volume, VolumeSource};

/// Version of this crate
pub const EMD_VOLUME_VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!EMD_VOLUME_VERSION.is_empty());
        assert_eq!(FormatVersion::CURRENT, schema::FORMAT_VERSION);
    }
}
