//! Volume codec - main API for reading and writing EMD tomography files
//!
//! Each call opens exactly one container, owns it for the duration of the call
//! and closes it before returning. Nothing is kept between calls.
//!
//! Reading follows a two-tier policy. Descriptive metadata (the version pair
//! and `emd_group_type`) is checked but tolerated when missing or malformed:
//! problems are logged and returned as [`MetadataIssue`]s. The volume dataset
//! itself is mandatory; without it the read fails with
//! [`EmdError::SchemaMismatch`].

use crate::error::{EmdError, MetadataIssue, Result, StepFailure, WriteStep};
use crate::io::{AttributeKind, AttributeValue, Container, NodeKind, OpenMode};
use crate::metadata::{EmdHeader, FormatVersion};
use crate::schema::{
    CoordinateAxis, DATA_GROUP, DEFAULT_EXTENT, DEFAULT_UNITS, FORMAT_VERSION, GROUP_TYPE_ATTR,
    NAME_ATTR, ROOT_GROUP, TOMOGRAPHY_GROUP, TOMOGRAPHY_GROUP_TYPE, UNITS_ATTR,
    VERSION_MAJOR_ATTR, VERSION_MINOR_ATTR, VOLUME_DATASET, VOLUME_PATH, VOLUME_RANK,
};
use crate::types::{AxisDescriptor, ElementType};
use crate::volume::{validate_source, Volume, VolumeSource};
use log::{debug, warn};
use std::path::Path;

/// Options for reading EMD files
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    /// Fail on metadata problems instead of logging them
    pub strict_metadata: bool,
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strict_metadata(mut self, strict: bool) -> Self {
        self.strict_metadata = strict;
        self
    }
}

/// A volume together with what was learned about its file
#[derive(Debug)]
pub struct ReadOutcome {
    pub volume: Volume,

    /// Format version, if both version attributes were readable
    pub version: Option<FormatVersion>,

    /// Coordinate axes that could be read, in dim1..dim3 order
    pub axes: Vec<AxisDescriptor>,

    /// Tolerated metadata problems
    pub warnings: Vec<MetadataIssue>,
}

/// Write `source` to a new EMD file at `path`, replacing any existing file.
///
/// The source is checked against the element table before anything is
/// created, so an unsupported element type leaves no file behind. Once the
/// file exists every schema step is attempted even if an earlier one failed,
/// and the container is always closed. If any step failed the file is not
/// conformant and [`EmdError::Write`] names the failed steps.
pub fn write<S: VolumeSource + ?Sized>(path: impl AsRef<Path>, source: &S) -> Result<()> {
    let path = path.as_ref();
    let element_type = validate_source(source)?;
    let extents = source.extents();
    debug!(
        "Writing {:?} {} volume to {}",
        extents,
        element_type,
        path.display()
    );

    let container = match Container::open(path, OpenMode::CreateTruncate) {
        Ok(container) => container,
        Err(error) => {
            let mut steps = StepLog::default();
            steps.record::<()>(WriteStep::CreateContainer, Err(error));
            return steps.finish();
        }
    };
    write_container(container, source, element_type)
}

/// Lay the schema down in a freshly created container and close it. Every
/// step runs whatever happened before it.
fn write_container<S: VolumeSource + ?Sized>(
    container: Container,
    source: &S,
    element_type: ElementType,
) -> Result<()> {
    let mut steps = StepLog::default();

    steps.record(WriteStep::RootGroup, container.open_group(ROOT_GROUP).map(drop));
    steps.record(WriteStep::VersionAttributes, write_version(&container));

    steps.record(WriteStep::DataGroup, container.create_group(DATA_GROUP).map(drop));
    steps.record(
        WriteStep::TomographyGroup,
        container.create_group(TOMOGRAPHY_GROUP).map(drop),
    );
    steps.record(
        WriteStep::GroupTypeAttribute,
        container.write_attribute(
            TOMOGRAPHY_GROUP,
            GROUP_TYPE_ATTR,
            &AttributeValue::Uint(TOMOGRAPHY_GROUP_TYPE),
            NodeKind::Group,
        ),
    );

    steps.record(
        WriteStep::VolumeData,
        container.write_dataset(
            TOMOGRAPHY_GROUP,
            VOLUME_DATASET,
            &source.extents(),
            element_type,
            source.scalar_bytes(),
        ),
    );

    for axis in CoordinateAxis::ALL {
        steps.record(
            WriteStep::Coordinates(axis),
            container.write_coordinates(TOMOGRAPHY_GROUP, axis.dataset(), &DEFAULT_EXTENT),
        );
        steps.record(
            WriteStep::CoordinateAttributes(axis),
            write_axis_attributes(&container, axis),
        );
    }

    steps.record(WriteStep::Close, container.close());
    steps.finish()
}

/// Read the volume stored in the EMD file at `path`
pub fn read(path: impl AsRef<Path>) -> Result<Volume> {
    read_with_options(path, ReadOptions::default()).map(|outcome| outcome.volume)
}

/// Read the volume stored in the EMD file at `path`, reporting tolerated
/// metadata problems alongside it.
pub fn read_with_options(path: impl AsRef<Path>, options: ReadOptions) -> Result<ReadOutcome> {
    let path = path.as_ref();
    let container = Container::open(path, OpenMode::ReadOnly)?;
    let mut check = MetadataCheck::new(options);

    let version = read_version(&container, &mut check)?;
    check_group_type(&container, &mut check)?;

    expect_volume_node(&container)?;
    let raw = container.read_dataset(VOLUME_PATH)?;
    let extents: [usize; VOLUME_RANK] = raw.dims.as_slice().try_into().map_err(|_| {
        EmdError::SchemaMismatch(format!(
            "{} has rank {}, expected {}",
            VOLUME_PATH,
            raw.dims.len(),
            VOLUME_RANK
        ))
    })?;
    let volume = Volume::new(extents, raw.buffer)?;
    let axes = read_axes(&container);

    container.close()?;
    debug!("Read {} from {}", volume.summary(), path.display());

    Ok(ReadOutcome {
        volume,
        version,
        axes,
        warnings: check.issues,
    })
}

/// Describe the EMD file at `path` without loading its voxels
pub fn inspect(path: impl AsRef<Path>) -> Result<EmdHeader> {
    let container = Container::open(path, OpenMode::ReadOnly)?;
    let mut check = MetadataCheck::new(ReadOptions::default());

    let version = read_version(&container, &mut check)?;
    let group_type = read_uint(&container, TOMOGRAPHY_GROUP, GROUP_TYPE_ATTR, &mut check)?;

    expect_volume_node(&container)?;
    let (extents, element_type) = container.dataset_info(VOLUME_PATH)?;
    let axes = read_axes(&container);

    container.close()?;
    Ok(EmdHeader {
        version,
        group_type,
        extents,
        element_type,
        axes,
    })
}

/// Failures collected while writing
#[derive(Default)]
struct StepLog {
    failures: Vec<StepFailure>,
}

impl StepLog {
    fn record<T>(&mut self, step: WriteStep, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                debug!("Write step '{}' failed: {}", step, error);
                self.failures.push(StepFailure { step, error });
                None
            }
        }
    }

    fn finish(self) -> Result<()> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(EmdError::Write(self.failures))
        }
    }
}

fn write_version(container: &Container) -> Result<()> {
    container.write_attribute(
        ROOT_GROUP,
        VERSION_MAJOR_ATTR,
        &AttributeValue::Uint(FORMAT_VERSION.major),
        NodeKind::Group,
    )?;
    container.write_attribute(
        ROOT_GROUP,
        VERSION_MINOR_ATTR,
        &AttributeValue::Uint(FORMAT_VERSION.minor),
        NodeKind::Group,
    )
}

fn write_axis_attributes(container: &Container, axis: CoordinateAxis) -> Result<()> {
    let path = axis.path();
    container.write_attribute(&path, NAME_ATTR, &axis.label().into(), NodeKind::Dataset)?;
    container.write_attribute(&path, UNITS_ATTR, &DEFAULT_UNITS.into(), NodeKind::Dataset)
}

/// Soft metadata problems seen during one read
struct MetadataCheck {
    options: ReadOptions,
    issues: Vec<MetadataIssue>,
}

impl MetadataCheck {
    fn new(options: ReadOptions) -> Self {
        Self {
            options,
            issues: Vec::new(),
        }
    }

    fn note(&mut self, issue: MetadataIssue) -> Result<()> {
        warn!("{}", issue);
        if self.options.strict_metadata {
            return Err(issue.into());
        }
        self.issues.push(issue);
        Ok(())
    }
}

fn read_uint(
    container: &Container,
    node: &str,
    name: &str,
    check: &mut MetadataCheck,
) -> Result<Option<u32>> {
    match container.read_attribute(node, name, AttributeKind::Uint) {
        Ok(value) => Ok(value.as_uint()),
        Err(err) => {
            check.note(MetadataIssue::from_attribute_error(node, name, err))?;
            Ok(None)
        }
    }
}

fn read_version(
    container: &Container,
    check: &mut MetadataCheck,
) -> Result<Option<FormatVersion>> {
    let major = read_uint(container, ROOT_GROUP, VERSION_MAJOR_ATTR, check)?;
    let minor = read_uint(container, ROOT_GROUP, VERSION_MINOR_ATTR, check)?;
    let version = match (major, minor) {
        (Some(major), Some(minor)) => FormatVersion::new(major, minor),
        _ => return Ok(None),
    };
    if !version.is_compatible(&FormatVersion::CURRENT) {
        check.note(MetadataIssue::UnexpectedValue {
            node: ROOT_GROUP.to_string(),
            name: VERSION_MAJOR_ATTR.to_string(),
            expected: FormatVersion::CURRENT.major.to_string(),
            found: version.major.to_string(),
        })?;
    }
    Ok(Some(version))
}

fn check_group_type(container: &Container, check: &mut MetadataCheck) -> Result<()> {
    match read_uint(container, TOMOGRAPHY_GROUP, GROUP_TYPE_ATTR, check)? {
        Some(value) if value != TOMOGRAPHY_GROUP_TYPE => check.note(MetadataIssue::UnexpectedValue {
            node: TOMOGRAPHY_GROUP.to_string(),
            name: GROUP_TYPE_ATTR.to_string(),
            expected: TOMOGRAPHY_GROUP_TYPE.to_string(),
            found: value.to_string(),
        }),
        _ => Ok(()),
    }
}

fn expect_volume_node(container: &Container) -> Result<()> {
    match container.node_kind(VOLUME_PATH)? {
        Some(NodeKind::Dataset) => Ok(()),
        Some(kind) => Err(EmdError::SchemaMismatch(format!(
            "{} is a {}, not a dataset",
            VOLUME_PATH, kind
        ))),
        None => Err(EmdError::SchemaMismatch(format!("{} is missing", VOLUME_PATH))),
    }
}

fn read_text(container: &Container, node: &str, name: &str) -> Result<String> {
    match container.read_attribute(node, name, AttributeKind::Text)? {
        AttributeValue::Text(text) => Ok(text),
        other => Err(EmdError::TypeMismatch {
            location: format!("{}:{}", node, name),
            expected: AttributeKind::Text.to_string(),
            found: other.kind().to_string(),
        }),
    }
}

fn read_axis(container: &Container, axis: CoordinateAxis) -> Result<AxisDescriptor> {
    let path = axis.path();
    let values = container.read_coordinates(&path)?;
    let (start, end) = match values.as_slice() {
        [start, .., end] => (*start, *end),
        [only] => (*only, *only),
        [] => return Err(EmdError::SchemaMismatch(format!("{} is empty", path))),
    };
    let name = read_text(container, &path, NAME_ATTR)?;
    let units = read_text(container, &path, UNITS_ATTR)?;
    Ok(AxisDescriptor::new(name, units, start, end))
}

/// Coordinate axes are descriptive only; unreadable ones are skipped.
fn read_axes(container: &Container) -> Vec<AxisDescriptor> {
    CoordinateAxis::ALL
        .iter()
        .filter_map(|&axis| match read_axis(container, axis) {
            Ok(descriptor) => Some(descriptor),
            Err(err) => {
                debug!("Skipping axis {}: {}", axis.dataset(), err);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScalarType;
    use crate::volume::RawVolume;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_inspect() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("volume.emd");
        let volume = Volume::from_vec([3, 4, 5], vec![7u16; 60]).unwrap();

        write(&path, &volume).unwrap();
        let header = inspect(&path).unwrap();

        assert_eq!(header.version, Some(FormatVersion::new(0, 2)));
        assert_eq!(header.group_type, Some(1));
        assert_eq!(header.extents, vec![3, 4, 5]);
        assert_eq!(header.element_type, ElementType::U16);
        assert_eq!(header.axes.len(), 3);
        assert_eq!(header.axes[2], AxisDescriptor::new("z", "[n_m]", 0.0, 1.0));
    }

    #[test]
    fn test_unsupported_type_creates_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("signed.emd");
        let raw = RawVolume::new([2, 2, 2], ScalarType::I32, vec![0u8; 32]);

        let result = write(&path, &raw);
        assert!(matches!(result, Err(EmdError::UnsupportedType(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_write_to_missing_directory_reports_step() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("no-such-dir").join("volume.emd");
        let volume = Volume::from_vec([1, 1, 2], vec![1u8, 2]).unwrap();

        match write(&path, &volume) {
            Err(EmdError::Write(failures)) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].step, WriteStep::CreateContainer);
            }
            other => panic!("expected a write failure, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_step_does_not_stop_later_steps() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("partial.emd");
        let volume = Volume::from_vec([2, 1, 2], vec![1.0f32, 2.0, 3.0, 4.0]).unwrap();

        let container = Container::open(&path, OpenMode::CreateTruncate).unwrap();
        container.create_group(DATA_GROUP).unwrap();
        let result = write_container(container, &volume, ElementType::F32);

        match result {
            Err(EmdError::Write(failures)) => {
                let steps: Vec<_> = failures.iter().map(|f| f.step).collect();
                assert_eq!(steps, vec![WriteStep::DataGroup]);
            }
            other => panic!("expected a write failure, got {:?}", other),
        }

        // everything after the failed step landed and the file was closed
        let outcome = read_with_options(&path, ReadOptions::new()).unwrap();
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.version, Some(FormatVersion::CURRENT));
        assert_eq!(outcome.volume, volume);
        assert_eq!(outcome.axes.len(), 3);
        assert_eq!(outcome.axes[0], AxisDescriptor::new("x", "[n_m]", 0.0, 1.0));
    }

    #[test]
    fn test_step_with_failed_parent_fails_in_turn() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blocked.emd");
        let volume = Volume::from_vec([1, 1, 1], vec![5u8]).unwrap();

        // a dataset where the data group belongs blocks the whole subtree
        let container = Container::open(&path, OpenMode::CreateTruncate).unwrap();
        container.write_coordinates(ROOT_GROUP, "data", &[0.0]).unwrap();
        let result = write_container(container, &volume, ElementType::U8);

        let failures = match result {
            Err(EmdError::Write(failures)) => failures,
            other => panic!("expected a write failure, got {:?}", other),
        };
        let steps: Vec<_> = failures.iter().map(|f| f.step).collect();
        let blocked = [
            WriteStep::DataGroup,
            WriteStep::TomographyGroup,
            WriteStep::GroupTypeAttribute,
            WriteStep::VolumeData,
        ];
        assert_eq!(steps[..4], blocked);
        assert_eq!(steps.len(), 4 + 2 * CoordinateAxis::ALL.len());
        assert!(!steps.contains(&WriteStep::VersionAttributes));
        assert!(!steps.contains(&WriteStep::Close));

        // the root attributes written before the failures are on disk
        let container = Container::open(&path, OpenMode::ReadOnly).unwrap();
        let major = container
            .read_attribute(ROOT_GROUP, VERSION_MAJOR_ATTR, AttributeKind::Uint)
            .unwrap();
        assert_eq!(major.as_uint(), Some(FORMAT_VERSION.major));
        container.close().unwrap();
    }

    #[test]
    fn test_strict_metadata_escalates() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bare.h5");
        {
            let container = Container::open(&path, OpenMode::CreateTruncate).unwrap();
            container.create_group(DATA_GROUP).unwrap();
            container.create_group(TOMOGRAPHY_GROUP).unwrap();
            container
                .write_dataset(TOMOGRAPHY_GROUP, VOLUME_DATASET, &[1, 1, 1], ElementType::U8, &[9])
                .unwrap();
            container.close().unwrap();
        }

        let outcome = read_with_options(&path, ReadOptions::new()).unwrap();
        assert_eq!(outcome.version, None);
        assert_eq!(outcome.warnings.len(), 3);
        assert_eq!(outcome.volume.get::<u8>([0, 0, 0]), Some(9));

        let strict = read_with_options(&path, ReadOptions::new().with_strict_metadata(true));
        assert!(matches!(
            strict,
            Err(EmdError::Metadata(MetadataIssue::Missing { .. }))
        ));
    }
}
