//! Utility functions

use crate::error::{EmdError, Result};
use crate::volume::Element;
use std::borrow::Cow;
use std::mem;

fn check_whole_elements<T: Element>(bytes: &[u8]) -> Result<()> {
    let width = mem::size_of::<T>();
    if bytes.len() % width != 0 {
        return Err(EmdError::InvalidDimensions(format!(
            "{} bytes is not a whole number of {}-byte elements",
            bytes.len(),
            width
        )));
    }
    Ok(())
}

/// Convert native-endian bytes to typed elements. The input need not be
/// aligned.
pub fn bytes_to_typed_data<T: Element>(bytes: &[u8]) -> Result<Vec<T>> {
    check_whole_elements::<T>(bytes)?;

    let count = bytes.len() / mem::size_of::<T>();
    let mut data = Vec::with_capacity(count);

    // SAFETY: `count` whole elements are in bounds and `Element` types are
    // plain numbers, for which any bit pattern is valid.
    unsafe {
        let ptr = bytes.as_ptr() as *const T;
        for i in 0..count {
            data.push(ptr.add(i).read_unaligned());
        }
    }

    Ok(data)
}

/// Borrow native-endian bytes as typed elements, copying only when the
/// bytes are not aligned for `T`.
pub fn typed_data_from_bytes<T: Element>(bytes: &[u8]) -> Result<Cow<'_, [T]>> {
    check_whole_elements::<T>(bytes)?;

    // SAFETY: any bit pattern is a valid `Element`; `align_to` only places
    // properly aligned whole elements in the middle slice.
    let (head, body, tail) = unsafe { bytes.align_to::<T>() };
    if head.is_empty() && tail.is_empty() {
        return Ok(Cow::Borrowed(body));
    }
    Ok(Cow::Owned(bytes_to_typed_data(bytes)?))
}

/// View typed elements as their native-endian bytes
pub fn typed_data_as_bytes<T: Element>(data: &[T]) -> &[u8] {
    // SAFETY: covers exactly the memory backing `data`; u8 has no alignment
    // requirement and `Element` types have no padding.
    unsafe { std::slice::from_raw_parts(data.as_ptr() as *const u8, mem::size_of_val(data)) }
}

/// Number of elements in an array of shape `dims`, or `None` on overflow
pub fn checked_element_count(dims: &[usize]) -> Option<usize> {
    dims.iter().try_fold(1usize, |acc, &n| acc.checked_mul(n))
}

/// Format byte size in human-readable form
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Format extents as `nx x ny x nz`
pub fn format_extents(extents: &[usize]) -> String {
    extents
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(" x ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_conversion() {
        let data: Vec<u16> = vec![1, 2, 300, 65535];
        let bytes = typed_data_as_bytes(&data);
        assert_eq!(bytes.len(), data.len() * 2);

        let recovered: Vec<u16> = bytes_to_typed_data(bytes).unwrap();
        assert_eq!(data, recovered);
    }

    #[test]
    fn test_unaligned_bytes() {
        let data: Vec<f32> = vec![1.5, -2.0, 3.25];
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(typed_data_as_bytes(&data));

        let recovered: Vec<f32> = bytes_to_typed_data(&bytes[1..]).unwrap();
        assert_eq!(data, recovered);
    }

    #[test]
    fn test_aligned_bytes_are_borrowed() {
        let data: Vec<u32> = vec![7, 70_000, u32::MAX];
        let borrowed = typed_data_from_bytes::<u32>(typed_data_as_bytes(&data)).unwrap();
        assert!(matches!(borrowed, Cow::Borrowed(_)));
        assert_eq!(&*borrowed, data.as_slice());

        // one byte past a u32 boundary is never u32-aligned
        let shifted = &typed_data_as_bytes(&data)[1..9];
        let copied = typed_data_from_bytes::<u32>(shifted).unwrap();
        assert!(matches!(copied, Cow::Owned(_)));
        assert_eq!(copied.into_owned(), bytes_to_typed_data::<u32>(shifted).unwrap());
    }

    #[test]
    fn test_ragged_bytes_rejected() {
        let result = bytes_to_typed_data::<u32>(&[0, 1, 2, 3, 4]);
        assert!(matches!(result, Err(EmdError::InvalidDimensions(_))));
        let result = typed_data_from_bytes::<u16>(&[0, 1, 2]);
        assert!(matches!(result, Err(EmdError::InvalidDimensions(_))));
    }

    #[test]
    fn test_checked_element_count() {
        assert_eq!(checked_element_count(&[4, 5, 6]), Some(120));
        assert_eq!(checked_element_count(&[usize::MAX, 2]), None);
        assert_eq!(checked_element_count(&[1 << (usize::BITS - 1), 2]), None);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }

    #[test]
    fn test_format_extents() {
        assert_eq!(format_extents(&[4, 5, 6]), "4 x 5 x 6");
    }
}
