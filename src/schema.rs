//! The fixed EMD tomography schema
//!
//! ```text
//! /                         version_major, version_minor
//!   data/
//!     tomography/           emd_group_type = 1
//!       data                the volume
//!       dim1, dim2, dim3    axis extents, with `name` and `units`
//! ```

use crate::metadata::FormatVersion;

pub const ROOT_GROUP: &str = "/";
pub const DATA_GROUP: &str = "/data";
pub const TOMOGRAPHY_GROUP: &str = "/data/tomography";

/// Name of the volume dataset inside [`TOMOGRAPHY_GROUP`].
pub const VOLUME_DATASET: &str = "data";
pub const VOLUME_PATH: &str = "/data/tomography/data";

pub const VERSION_MAJOR_ATTR: &str = "version_major";
pub const VERSION_MINOR_ATTR: &str = "version_minor";
pub const GROUP_TYPE_ATTR: &str = "emd_group_type";
pub const NAME_ATTR: &str = "name";
pub const UNITS_ATTR: &str = "units";

/// Version written to every new file.
pub const FORMAT_VERSION: FormatVersion = FormatVersion { major: 0, minor: 2 };

/// `emd_group_type` value marking a group that holds tomography data.
pub const TOMOGRAPHY_GROUP_TYPE: u32 = 1;

pub const DEFAULT_UNITS: &str = "[n_m]";

/// Coordinate extent written for every axis.
pub const DEFAULT_EXTENT: [f32; 2] = [0.0, 1.0];

/// Rank of the volume dataset.
pub const VOLUME_RANK: usize = 3;

/// The three coordinate datasets that accompany the volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinateAxis {
    X,
    Y,
    Z,
}

impl CoordinateAxis {
    pub const ALL: [CoordinateAxis; 3] = [CoordinateAxis::X, CoordinateAxis::Y, CoordinateAxis::Z];

    /// Dataset name inside the tomography group
    pub fn dataset(&self) -> &'static str {
        match self {
            CoordinateAxis::X => "dim1",
            CoordinateAxis::Y => "dim2",
            CoordinateAxis::Z => "dim3",
        }
    }

    /// Value of the dataset's `name` attribute
    pub fn label(&self) -> &'static str {
        match self {
            CoordinateAxis::X => "x",
            CoordinateAxis::Y => "y",
            CoordinateAxis::Z => "z",
        }
    }

    pub fn path(&self) -> String {
        format!("{}/{}", TOMOGRAPHY_GROUP, self.dataset())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_path_matches_parts() {
        assert_eq!(VOLUME_PATH, format!("{}/{}", TOMOGRAPHY_GROUP, VOLUME_DATASET));
        assert!(TOMOGRAPHY_GROUP.starts_with(DATA_GROUP));
    }

    #[test]
    fn test_coordinate_axes() {
        assert_eq!(CoordinateAxis::X.path(), "/data/tomography/dim1");
        assert_eq!(CoordinateAxis::Z.dataset(), "dim3");
        let labels: Vec<_> = CoordinateAxis::ALL.iter().map(|a| a.label()).collect();
        assert_eq!(labels, vec!["x", "y", "z"]);
    }
}
