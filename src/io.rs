//! Container accessor: typed groups, attributes and datasets in an HDF5 file
//!
//! This layer knows nothing about tomography. It opens one container, addresses
//! nodes by slash-delimited path and moves typed values in and out. Every HDF5
//! handle it touches (file, group, dataset, attribute, dataspace) is an owned
//! value of the `hdf5` crate, released when it goes out of scope, so an early
//! `?` return never leaks a handle.

use crate::error::{EmdError, Result};
use crate::types::ElementType;
use crate::utils::{checked_element_count, typed_data_as_bytes, typed_data_from_bytes};
use crate::volume::ElementBuffer;
use hdf5::types::{FloatSize, IntSize, TypeDescriptor, VarLenAscii, VarLenUnicode};
use hdf5::{Dataset, Datatype, File, Group, H5Type, Location};
use log::debug;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

// Datasets are created with the host's native types, which must coincide with
// the little-endian encodings of the element table.
#[cfg(target_endian = "big")]
compile_error!("EMD containers are written with native types; big-endian hosts are not supported");

/// How a container is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Open an existing file without write access
    ReadOnly,
    /// Create a new file, truncating any existing one
    CreateTruncate,
}

/// Kind of node found at a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Group,
    Dataset,
    /// Named datatypes and anything else that is neither
    Other,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Group => write!(f, "group"),
            NodeKind::Dataset => write!(f, "dataset"),
            NodeKind::Other => write!(f, "non-group, non-dataset object"),
        }
    }
}

/// On-disk type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    /// Unsigned 32-bit little-endian integer
    Uint,
    /// IEEE 754 32-bit little-endian float
    Float,
    /// Variable-length string
    Text,
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeKind::Uint => write!(f, "uint32"),
            AttributeKind::Float => write!(f, "float32"),
            AttributeKind::Text => write!(f, "variable-length string"),
        }
    }
}

/// A scalar attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Uint(u32),
    Float(f32),
    Text(String),
}

impl AttributeValue {
    pub fn kind(&self) -> AttributeKind {
        match self {
            AttributeValue::Uint(_) => AttributeKind::Uint,
            AttributeValue::Float(_) => AttributeKind::Float,
            AttributeValue::Text(_) => AttributeKind::Text,
        }
    }

    pub fn as_uint(&self) -> Option<u32> {
        match self {
            AttributeValue::Uint(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            AttributeValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl From<u32> for AttributeValue {
    fn from(value: u32) -> Self {
        AttributeValue::Uint(value)
    }
}

impl From<f32> for AttributeValue {
    fn from(value: f32) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

/// A dataset read back in full
#[derive(Debug, Clone, PartialEq)]
pub struct RawDataset {
    /// Extent of each axis, slowest first
    pub dims: Vec<usize>,
    pub buffer: ElementBuffer,
}

impl RawDataset {
    pub fn element_type(&self) -> ElementType {
        self.buffer.element_type()
    }
}

/// Human-readable name of a stored type
fn describe_type(descriptor: &TypeDescriptor) -> String {
    let int_bits = |size: &IntSize| match size {
        IntSize::U1 => 8,
        IntSize::U2 => 16,
        IntSize::U4 => 32,
        IntSize::U8 => 64,
    };
    match descriptor {
        TypeDescriptor::Integer(size) => format!("int{}", int_bits(size)),
        TypeDescriptor::Unsigned(size) => format!("uint{}", int_bits(size)),
        TypeDescriptor::Float(FloatSize::U4) => "float32".to_string(),
        TypeDescriptor::Float(FloatSize::U8) => "float64".to_string(),
        TypeDescriptor::VarLenAscii | TypeDescriptor::VarLenUnicode => {
            "variable-length string".to_string()
        }
        other => format!("{:?}", other),
    }
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// Split `/a/b/c` into `/a/b` and `c`.
fn split_parent(path: &str) -> Result<(&str, &str)> {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((_, "")) | None => Err(EmdError::SchemaMismatch(format!(
            "'{}' does not name a child node",
            path
        ))),
        Some(("", name)) => Ok(("/", name)),
        Some((parent, name)) => Ok((parent, name)),
    }
}

/// One open HDF5 container
pub struct Container {
    file: File,
    path: PathBuf,
    mode: OpenMode,
}

impl Container {
    /// Open or create the container at `path`
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = match mode {
            OpenMode::ReadOnly => File::open(&path)?,
            OpenMode::CreateTruncate => File::create(&path)?,
        };
        debug!("Opened {} ({:?})", path.display(), mode);
        Ok(Self { file, path, mode })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Kind of node at `path`, or `None` if nothing is linked there
    pub fn node_kind(&self, path: &str) -> Result<Option<NodeKind>> {
        let mut current = self.file.group("/")?;
        let mut segments = split_segments(path).peekable();

        while let Some(segment) = segments.next() {
            if !current.link_exists(segment) {
                return Ok(None);
            }
            if segments.peek().is_none() {
                if current.dataset(segment).is_ok() {
                    return Ok(Some(NodeKind::Dataset));
                }
                if current.group(segment).is_ok() {
                    return Ok(Some(NodeKind::Group));
                }
                return Ok(Some(NodeKind::Other));
            }
            current = match current.group(segment) {
                Ok(group) => group,
                Err(_) => return Ok(None),
            };
        }

        Ok(Some(NodeKind::Group))
    }

    fn expect_kind(&self, path: &str, expected: NodeKind) -> Result<()> {
        match self.node_kind(path)? {
            Some(kind) if kind == expected => Ok(()),
            Some(kind) => Err(EmdError::SchemaMismatch(format!(
                "{} is a {}, expected a {}",
                path, kind, expected
            ))),
            None => Err(EmdError::NotFound(path.to_string())),
        }
    }

    pub fn open_group(&self, path: &str) -> Result<Group> {
        self.expect_kind(path, NodeKind::Group)?;
        Ok(self.file.group(path)?)
    }

    pub fn open_dataset(&self, path: &str) -> Result<Dataset> {
        self.expect_kind(path, NodeKind::Dataset)?;
        Ok(self.file.dataset(path)?)
    }

    /// Create the group at `path`. Its parent must already exist; no
    /// intermediate groups are created.
    pub fn create_group(&self, path: &str) -> Result<Group> {
        let (parent, name) = split_parent(path)?;
        let parent = self.open_group(parent)?;
        let group = parent.create_group(name)?;
        debug!("Created group {}", path);
        Ok(group)
    }

    fn with_location<R>(
        &self,
        path: &str,
        kind: NodeKind,
        f: impl FnOnce(&Location) -> Result<R>,
    ) -> Result<R> {
        match kind {
            NodeKind::Group => f(&*self.open_group(path)?),
            NodeKind::Dataset => f(&*self.open_dataset(path)?),
            NodeKind::Other => Err(EmdError::SchemaMismatch(format!(
                "attributes are only addressed on groups and datasets, not {}",
                path
            ))),
        }
    }

    /// Read the scalar attribute `name` at `node`, which must be stored with
    /// exactly the type of `expected`.
    pub fn read_attribute(
        &self,
        node: &str,
        name: &str,
        expected: AttributeKind,
    ) -> Result<AttributeValue> {
        let kind = self
            .node_kind(node)?
            .ok_or_else(|| EmdError::NotFound(node.to_string()))?;
        self.with_location(node, kind, |location| {
            read_attribute_at(location, node, name, expected)
        })
    }

    /// Create the scalar attribute `name` on the group or dataset at `node`
    pub fn write_attribute(
        &self,
        node: &str,
        name: &str,
        value: &AttributeValue,
        target: NodeKind,
    ) -> Result<()> {
        self.with_location(node, target, |location| {
            match value {
                AttributeValue::Uint(v) => {
                    location.new_attr::<u32>().create(name)?.write_scalar(v)?
                }
                AttributeValue::Float(v) => {
                    location.new_attr::<f32>().create(name)?.write_scalar(v)?
                }
                AttributeValue::Text(text) => {
                    let v = VarLenUnicode::from_str(text).map_err(|e| {
                        EmdError::Serialization(format!("attribute {}: {}", name, e))
                    })?;
                    location
                        .new_attr::<VarLenUnicode>()
                        .create(name)?
                        .write_scalar(&v)?
                }
            }
            Ok(())
        })?;
        debug!("Wrote attribute {}:{}", node, name);
        Ok(())
    }

    /// Create dataset `name` in `group` with shape `dims` and copy `buffer`,
    /// native-endian elements of `element_type`, into it unchanged.
    pub fn write_dataset(
        &self,
        group: &str,
        name: &str,
        dims: &[usize],
        element_type: ElementType,
        buffer: &[u8],
    ) -> Result<()> {
        if dims.is_empty() || dims.iter().any(|&n| n == 0) {
            return Err(EmdError::InvalidDimensions(format!(
                "dataset {} needs positive extents, got {:?}",
                name, dims
            )));
        }
        let expected = checked_element_count(dims)
            .and_then(|count| count.checked_mul(element_type.size_in_bytes()))
            .ok_or_else(|| {
                EmdError::InvalidDimensions(format!(
                    "dataset {} of {:?} {} is too large to address",
                    name, dims, element_type
                ))
            })?;
        if expected != buffer.len() {
            return Err(EmdError::InvalidDimensions(format!(
                "dataset {} of {:?} {} needs {} bytes, got {}",
                name,
                dims,
                element_type,
                expected,
                buffer.len()
            )));
        }

        let group = self.open_group(group)?;
        match element_type {
            ElementType::F32 => {
                write_typed(&group, name, dims, &typed_data_from_bytes::<f32>(buffer)?)
            }
            ElementType::U32 => {
                write_typed(&group, name, dims, &typed_data_from_bytes::<u32>(buffer)?)
            }
            ElementType::U16 => {
                write_typed(&group, name, dims, &typed_data_from_bytes::<u16>(buffer)?)
            }
            ElementType::U8 => write_typed(&group, name, dims, buffer),
        }?;
        debug!("Wrote dataset {} {:?} ({})", name, dims, element_type);
        Ok(())
    }

    /// Write a 1-D float dataset
    pub fn write_coordinates(&self, group: &str, name: &str, values: &[f32]) -> Result<()> {
        self.write_dataset(
            group,
            name,
            &[values.len()],
            ElementType::F32,
            typed_data_as_bytes(values),
        )
    }

    /// Shape and element type of the dataset at `path`, without reading it
    pub fn dataset_info(&self, path: &str) -> Result<(Vec<usize>, ElementType)> {
        let dataset = self.open_dataset(path)?;
        Ok((dataset.shape(), element_type_of(&dataset)?))
    }

    /// Read the whole dataset at `path` into a freshly allocated buffer
    pub fn read_dataset(&self, path: &str) -> Result<RawDataset> {
        let dataset = self.open_dataset(path)?;
        let dims = dataset.shape();
        if dims.is_empty() {
            return Err(EmdError::InvalidDimensions(format!(
                "{} is a scalar dataset",
                path
            )));
        }
        let buffer = match element_type_of(&dataset)? {
            ElementType::F32 => ElementBuffer::F32(dataset.read_raw::<f32>()?),
            ElementType::U32 => ElementBuffer::U32(dataset.read_raw::<u32>()?),
            ElementType::U16 => ElementBuffer::U16(dataset.read_raw::<u16>()?),
            ElementType::U8 => ElementBuffer::U8(dataset.read_raw::<u8>()?),
        };
        let expected: usize = dims.iter().product();
        if buffer.len() != expected {
            return Err(EmdError::InvalidDimensions(format!(
                "{} holds {} elements, expected {}",
                path,
                buffer.len(),
                expected
            )));
        }
        debug!("Read dataset {} {:?} ({})", path, dims, buffer.element_type());
        Ok(RawDataset { dims, buffer })
    }

    /// Read a 1-D float dataset
    pub fn read_coordinates(&self, path: &str) -> Result<Vec<f32>> {
        let raw = self.read_dataset(path)?;
        match raw.buffer {
            ElementBuffer::F32(values) if raw.dims.len() == 1 => Ok(values),
            other => Err(EmdError::TypeMismatch {
                location: path.to_string(),
                expected: "1-D float32".to_string(),
                found: format!("{}-D {}", raw.dims.len(), other.element_type()),
            }),
        }
    }

    /// Close the container, reporting failures to flush or release it
    pub fn close(self) -> Result<()> {
        let path = self.path;
        self.file.close()?;
        debug!("Closed {}", path.display());
        Ok(())
    }
}

fn write_typed<T: H5Type>(group: &Group, name: &str, dims: &[usize], data: &[T]) -> Result<()> {
    let dataset = group.new_dataset::<T>().shape(dims.to_vec()).create(name)?;
    dataset.write_raw(data)?;
    Ok(())
}

fn element_type_of(dataset: &Dataset) -> Result<ElementType> {
    ElementType::from_datatype(&dataset.dtype()?)
}

fn read_attribute_at(
    location: &Location,
    node: &str,
    name: &str,
    expected: AttributeKind,
) -> Result<AttributeValue> {
    let qualified = format!("{}:{}", node, name);
    if !location.attr_names()?.iter().any(|n| n == name) {
        return Err(EmdError::NotFound(qualified));
    }

    let attr = location.attr(name)?;
    let dtype = attr.dtype()?;
    let found = dtype.to_descriptor()?;
    let matches = match expected {
        AttributeKind::Uint => dtype == Datatype::from_type::<u32>()?,
        AttributeKind::Float => dtype == Datatype::from_type::<f32>()?,
        AttributeKind::Text => {
            matches!(found, TypeDescriptor::VarLenUnicode | TypeDescriptor::VarLenAscii)
        }
    };
    if !matches {
        return Err(EmdError::TypeMismatch {
            location: qualified,
            expected: expected.to_string(),
            found: describe_type(&found),
        });
    }

    // Scalars and single-element arrays are both accepted; some writers store
    // metadata as length-1 arrays.
    if attr.size() != 1 {
        return Err(EmdError::TypeMismatch {
            location: qualified,
            expected: format!("scalar {}", expected),
            found: format!("{} values", attr.size()),
        });
    }
    let value = match found {
        TypeDescriptor::VarLenAscii => {
            let text = first(attr.read_raw::<VarLenAscii>()?, &qualified)?;
            AttributeValue::Text(text.as_str().to_string())
        }
        TypeDescriptor::VarLenUnicode => {
            let text = first(attr.read_raw::<VarLenUnicode>()?, &qualified)?;
            AttributeValue::Text(text.as_str().to_string())
        }
        _ if expected == AttributeKind::Uint => {
            AttributeValue::Uint(first(attr.read_raw::<u32>()?, &qualified)?)
        }
        _ => AttributeValue::Float(first(attr.read_raw::<f32>()?, &qualified)?),
    };
    Ok(value)
}

fn first<T>(values: Vec<T>, location: &str) -> Result<T> {
    values
        .into_iter()
        .next()
        .ok_or_else(|| EmdError::NotFound(location.to_string()))
}
