use std::mem::size_of;
use std::ptr;
use std::slice;

/// Marker for `#[repr(C, packed)]` structs that mirror wire bytes exactly.
///
/// Implementors must have no padding and must be valid for every bit pattern.
pub unsafe trait WireStruct: Copy {}

/// Return a slice of the bytes in the given struct.
pub fn as_bytes<T: WireStruct>(x: &T) -> &[u8] {
    unsafe { slice::from_raw_parts(x as *const T as *const u8, size_of::<T>()) }
}

/// Copy a struct out of the front of the given bytes.
/// Returns `None` if there aren't enough bytes to construct it.
pub fn from_bytes<T: WireStruct>(bytes: &[u8]) -> Option<T> {
    if bytes.len() < size_of::<T>() {
        return None;
    }
    Some(unsafe { ptr::read_unaligned(bytes.as_ptr() as *const T) })
}
