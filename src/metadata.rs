//! EMD file metadata structures

use crate::error::Result;
use crate::types::{AxisDescriptor, ElementType};
use crate::utils::{checked_element_count, format_bytes, format_extents};
use serde::{Deserialize, Serialize};
use std::fmt;

/// EMD format version, stored as `version_major`/`version_minor` on the root group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatVersion {
    pub major: u32,
    pub minor: u32,
}

impl FormatVersion {
    pub const CURRENT: Self = crate::schema::FORMAT_VERSION;

    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    pub fn is_compatible(&self, other: &Self) -> bool {
        self.major == other.major
    }
}

impl Default for FormatVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Everything known about an EMD file short of its voxel data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmdHeader {
    /// Format version, if both version attributes were readable
    pub version: Option<FormatVersion>,

    /// Value of `emd_group_type` on the tomography group
    pub group_type: Option<u32>,

    /// Stored extents of the volume dataset
    pub extents: Vec<usize>,

    /// Element type of the volume dataset
    pub element_type: ElementType,

    /// Coordinate axes that could be read, in dim1..dim3 order
    pub axes: Vec<AxisDescriptor>,
}

impl EmdHeader {
    /// Total number of voxels, or `None` if the stored extents overflow
    pub fn voxel_count(&self) -> Option<usize> {
        checked_element_count(&self.extents)
    }

    /// Size in bytes of the volume once loaded, or `None` on overflow
    pub fn size_in_bytes(&self) -> Option<usize> {
        self.voxel_count()?.checked_mul(self.element_type.size_in_bytes())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn summary(&self) -> String {
        let version = self
            .version
            .map(|v| v.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        format!(
            "EMD {}: {} {} volume, {}",
            version,
            format_extents(&self.extents),
            self.element_type,
            self.size_in_bytes()
                .map(format_bytes)
                .unwrap_or_else(|| "unaddressable size".to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> EmdHeader {
        EmdHeader {
            version: Some(FormatVersion::new(0, 2)),
            group_type: Some(1),
            extents: vec![64, 32, 16],
            element_type: ElementType::U16,
            axes: vec![
                AxisDescriptor::new("x", "[n_m]", 0.0, 1.0),
                AxisDescriptor::new("y", "[n_m]", 0.0, 1.0),
                AxisDescriptor::new("z", "[n_m]", 0.0, 1.0),
            ],
        }
    }

    #[test]
    fn test_version_compatibility() {
        let v0_2 = FormatVersion::new(0, 2);
        let v0_3 = FormatVersion::new(0, 3);
        let v1_0 = FormatVersion::new(1, 0);

        assert!(v0_2.is_compatible(&v0_3));
        assert!(!v0_2.is_compatible(&v1_0));
        assert_eq!(FormatVersion::default(), v0_2);
        assert_eq!(v0_2.to_string(), "0.2");
    }

    #[test]
    fn test_header_sizes() {
        let header = sample_header();
        assert_eq!(header.voxel_count(), Some(64 * 32 * 16));
        assert_eq!(header.size_in_bytes(), Some(64 * 32 * 16 * 2));
        assert_eq!(header.summary(), "EMD 0.2: 64 x 32 x 16 uint16 volume, 64.00 KB");
    }

    #[test]
    fn test_header_sizes_from_oversized_extents() {
        let mut header = sample_header();
        header.extents = vec![usize::MAX, 2, 1];
        assert_eq!(header.voxel_count(), None);
        assert_eq!(header.size_in_bytes(), None);

        header.extents = vec![usize::MAX / 2, 1, 1];
        assert_eq!(header.voxel_count(), Some(usize::MAX / 2));
        assert_eq!(header.size_in_bytes(), None);
        assert!(header.summary().ends_with("unaddressable size"));
    }

    #[test]
    fn test_header_json() {
        let header = sample_header();
        let json = header.to_json().unwrap();
        assert!(json.contains("\"element_type\": \"U16\""));
        assert_eq!(EmdHeader::from_json(&json).unwrap(), header);
    }
}
