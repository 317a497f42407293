//! In-memory volumes and the interface the codec reads them through

use crate::error::{EmdError, Result};
use crate::types::{ElementType, ScalarType, ValueRange};
use crate::utils::{
    bytes_to_typed_data, checked_element_count, format_bytes, format_extents, typed_data_as_bytes,
};
use bytes::Bytes;
use hdf5::H5Type;
use ndarray::{Array3, ArrayView3};
use num_traits::ToPrimitive;

/// Anything the codec can write: a dense 3-D buffer plus its runtime scalar tag.
///
/// The buffer holds `extents[0] * extents[1] * extents[2]` native-endian
/// elements in C order (`z` varies fastest).
pub trait VolumeSource {
    /// Number of samples along x, y and z
    fn extents(&self) -> [usize; 3];

    /// Runtime tag of the elements in [`scalar_bytes`](Self::scalar_bytes)
    fn scalar_type(&self) -> ScalarType;

    /// Raw element bytes
    fn scalar_bytes(&self) -> &[u8];
}

/// Typed element storage for one of the supported element types
#[derive(Debug, Clone, PartialEq)]
pub enum ElementBuffer {
    F32(Vec<f32>),
    U32(Vec<u32>),
    U16(Vec<u16>),
    U8(Vec<u8>),
}

impl ElementBuffer {
    /// Decode native-endian bytes as elements of `element_type`
    pub fn from_bytes(element_type: ElementType, bytes: &[u8]) -> Result<Self> {
        Ok(match element_type {
            ElementType::F32 => ElementBuffer::F32(bytes_to_typed_data(bytes)?),
            ElementType::U32 => ElementBuffer::U32(bytes_to_typed_data(bytes)?),
            ElementType::U16 => ElementBuffer::U16(bytes_to_typed_data(bytes)?),
            ElementType::U8 => ElementBuffer::U8(bytes.to_vec()),
        })
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            ElementBuffer::F32(_) => ElementType::F32,
            ElementBuffer::U32(_) => ElementType::U32,
            ElementBuffer::U16(_) => ElementType::U16,
            ElementBuffer::U8(_) => ElementType::U8,
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        match self {
            ElementBuffer::F32(data) => data.len(),
            ElementBuffer::U32(data) => data.len(),
            ElementBuffer::U16(data) => data.len(),
            ElementBuffer::U8(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Native-endian bytes of the elements
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ElementBuffer::F32(data) => typed_data_as_bytes(data),
            ElementBuffer::U32(data) => typed_data_as_bytes(data),
            ElementBuffer::U16(data) => typed_data_as_bytes(data),
            ElementBuffer::U8(data) => data,
        }
    }

    fn value_range(&self) -> Option<ValueRange> {
        match self {
            ElementBuffer::F32(data) => range_of(data),
            ElementBuffer::U32(data) => range_of(data),
            ElementBuffer::U16(data) => range_of(data),
            ElementBuffer::U8(data) => range_of(data),
        }
    }
}

fn range_of<T: ToPrimitive>(data: &[T]) -> Option<ValueRange> {
    data.iter()
        .filter_map(|value| value.to_f64())
        .filter(|value| !value.is_nan())
        .fold(None, |range, value| match range {
            None => Some(ValueRange::new(value, value)),
            Some(r) => Some(ValueRange::new(r.min.min(value), r.max.max(value))),
        })
}

mod sealed {
    pub trait Sealed {}
}

/// Rust element types with an EMD mapping: `f32`, `u32`, `u16` and `u8`.
pub trait Element: H5Type + Copy + ToPrimitive + sealed::Sealed + 'static {
    const ELEMENT_TYPE: ElementType;

    fn wrap(data: Vec<Self>) -> ElementBuffer;

    fn slice(buffer: &ElementBuffer) -> Option<&[Self]>;

    fn unwrap(buffer: ElementBuffer) -> Option<Vec<Self>>;
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident) => {
        impl sealed::Sealed for $ty {}

        impl Element for $ty {
            const ELEMENT_TYPE: ElementType = ElementType::$variant;

            fn wrap(data: Vec<Self>) -> ElementBuffer {
                ElementBuffer::$variant(data)
            }

            fn slice(buffer: &ElementBuffer) -> Option<&[Self]> {
                match buffer {
                    ElementBuffer::$variant(data) => Some(data),
                    _ => None,
                }
            }

            fn unwrap(buffer: ElementBuffer) -> Option<Vec<Self>> {
                match buffer {
                    ElementBuffer::$variant(data) => Some(data),
                    _ => None,
                }
            }
        }
    };
}

impl_element!(f32, F32);
impl_element!(u32, U32);
impl_element!(u16, U16);
impl_element!(u8, U8);

fn check_extents(extents: &[usize], len: usize) -> Result<()> {
    if extents.iter().any(|&n| n == 0) {
        return Err(EmdError::InvalidDimensions(format!(
            "extents {} must all be positive",
            format_extents(extents)
        )));
    }
    if checked_element_count(extents) != Some(len) {
        return Err(EmdError::InvalidDimensions(format!(
            "extents {} do not match {} elements",
            format_extents(extents),
            len
        )));
    }
    Ok(())
}

/// A dense 3-D volume, indexed `[x, y, z]` with `z` varying fastest
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    extents: [usize; 3],
    buffer: ElementBuffer,
}

impl Volume {
    /// Create a volume, checking that `buffer` fills `extents` exactly
    pub fn new(extents: [usize; 3], buffer: ElementBuffer) -> Result<Self> {
        check_extents(&extents, buffer.len())?;
        Ok(Self { extents, buffer })
    }

    pub fn from_vec<T: Element>(extents: [usize; 3], data: Vec<T>) -> Result<Self> {
        Self::new(extents, T::wrap(data))
    }

    pub fn from_array<T: Element>(array: Array3<T>) -> Result<Self> {
        let (nx, ny, nz) = array.dim();
        // logical iteration order is C order whatever the memory layout
        let data: Vec<T> = array.iter().copied().collect();
        Self::from_vec([nx, ny, nz], data)
    }

    pub fn extents(&self) -> [usize; 3] {
        self.extents
    }

    pub fn element_type(&self) -> ElementType {
        self.buffer.element_type()
    }

    pub fn buffer(&self) -> &ElementBuffer {
        &self.buffer
    }

    pub fn into_buffer(self) -> ElementBuffer {
        self.buffer
    }

    pub fn voxel_count(&self) -> usize {
        self.buffer.len()
    }

    pub fn size_in_bytes(&self) -> usize {
        self.voxel_count() * self.element_type().size_in_bytes()
    }

    /// Borrow the voxels as an array, if they are of type `T`
    pub fn view<T: Element>(&self) -> Option<ArrayView3<'_, T>> {
        let data = T::slice(&self.buffer)?;
        ArrayView3::from_shape(self.extents, data).ok()
    }

    pub fn into_array<T: Element>(self) -> Option<Array3<T>> {
        let extents = self.extents;
        let data = T::unwrap(self.buffer)?;
        Array3::from_shape_vec(extents, data).ok()
    }

    /// Voxel at `[x, y, z]`, if in range and of type `T`
    pub fn get<T: Element>(&self, index: [usize; 3]) -> Option<T> {
        self.view::<T>()?.get(index).copied()
    }

    /// Smallest and largest value, ignoring NaNs
    pub fn value_range(&self) -> Option<ValueRange> {
        self.buffer.value_range()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} {} volume, {}",
            format_extents(&self.extents),
            self.element_type(),
            format_bytes(self.size_in_bytes())
        )
    }
}

impl VolumeSource for Volume {
    fn extents(&self) -> [usize; 3] {
        self.extents
    }

    fn scalar_type(&self) -> ScalarType {
        self.element_type().into()
    }

    fn scalar_bytes(&self) -> &[u8] {
        self.buffer.as_bytes()
    }
}

/// An application-owned, untyped voxel buffer with a runtime scalar tag.
///
/// Unlike [`Volume`], the tag may name a type the EMD format cannot store;
/// writing such a volume fails with [`EmdError::UnsupportedType`].
#[derive(Debug, Clone)]
pub struct RawVolume {
    extents: [usize; 3],
    scalar_type: ScalarType,
    data: Bytes,
}

impl RawVolume {
    pub fn new(extents: [usize; 3], scalar_type: ScalarType, data: impl Into<Bytes>) -> Self {
        Self {
            extents,
            scalar_type,
            data: data.into(),
        }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

impl VolumeSource for RawVolume {
    fn extents(&self) -> [usize; 3] {
        self.extents
    }

    fn scalar_type(&self) -> ScalarType {
        self.scalar_type
    }

    fn scalar_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Check a source against the element table and its own extents.
pub(crate) fn validate_source<S: VolumeSource + ?Sized>(source: &S) -> Result<ElementType> {
    let element_type = ElementType::try_from(source.scalar_type())?;
    let extents = source.extents();
    let bytes = source.scalar_bytes();
    let width = element_type.size_in_bytes();
    if bytes.len() % width != 0 {
        return Err(EmdError::InvalidDimensions(format!(
            "{} bytes is not a whole number of {} elements",
            bytes.len(),
            element_type
        )));
    }
    check_extents(&extents, bytes.len() / width)?;
    Ok(element_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::ShapeBuilder;

    #[test]
    fn test_volume_indexing() {
        let data: Vec<u8> = (0..24).collect();
        let volume = Volume::from_vec([2, 3, 4], data).unwrap();
        assert_eq!(volume.element_type(), ElementType::U8);
        assert_eq!(volume.get::<u8>([1, 2, 3]), Some(23));
        assert_eq!(volume.get::<u8>([0, 1, 0]), Some(4));
        assert_eq!(volume.get::<u8>([2, 0, 0]), None);
        assert_eq!(volume.get::<u16>([0, 0, 0]), None);
    }

    #[test]
    fn test_volume_rejects_bad_extents() {
        let result = Volume::from_vec([2, 2, 2], vec![0u16; 7]);
        assert!(matches!(result, Err(EmdError::InvalidDimensions(_))));

        let result = Volume::from_vec::<u16>([0, 2, 2], Vec::new());
        assert!(matches!(result, Err(EmdError::InvalidDimensions(_))));
    }

    #[test]
    fn test_from_fortran_array_keeps_logical_order() {
        let array = Array3::from_shape_fn((2, 3, 4).f(), |(x, y, z)| (x * 100 + y * 10 + z) as u32);
        let volume = Volume::from_array(array.clone()).unwrap();
        assert_eq!(volume.get::<u32>([1, 2, 3]), Some(123));
        assert_eq!(volume.into_array::<u32>().unwrap(), array);
    }

    #[test]
    fn test_value_range() {
        let volume = Volume::from_vec([1, 2, 2], vec![3.0f32, f32::NAN, -1.5, 8.0]).unwrap();
        assert_eq!(volume.value_range(), Some(ValueRange::new(-1.5, 8.0)));
    }

    #[test]
    fn test_buffer_bytes_round_trip() {
        let buffer = ElementBuffer::U16(vec![1, 512, 65535]);
        let decoded = ElementBuffer::from_bytes(ElementType::U16, buffer.as_bytes()).unwrap();
        assert_eq!(decoded, buffer);
    }

    #[test]
    fn test_validate_source() {
        let volume = Volume::from_vec([2, 2, 1], vec![1.0f32, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(validate_source(&volume).unwrap(), ElementType::F32);

        let raw = RawVolume::new([2, 2, 1], ScalarType::I16, vec![0u8; 8]);
        assert!(matches!(
            validate_source(&raw),
            Err(EmdError::UnsupportedType(_))
        ));

        let short = RawVolume::new([2, 2, 2], ScalarType::U16, vec![0u8; 8]);
        assert!(matches!(
            validate_source(&short),
            Err(EmdError::InvalidDimensions(_))
        ));
    }

    #[test]
    fn test_summary() {
        let volume = Volume::from_vec([4, 4, 4], vec![0u16; 64]).unwrap();
        assert_eq!(volume.summary(), "4 x 4 x 4 uint16 volume, 128 B");
    }
}
