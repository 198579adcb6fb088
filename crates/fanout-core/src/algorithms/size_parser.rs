//! # Max Message Size Parsing
//!
//! Untrusted size caps arrive as query strings or JSON integers. Anything that
//! does not fit `u32` exactly degrades to `0` ("no cap"): an oversized value
//! must never be truncated into a small, surprising limit.

mod sealed {
    pub trait Sealed {}
}

/// Values accepted by [`parse_max_message_size_bytes`].
pub trait SizeInput: sealed::Sealed {
    /// Convert to a byte cap, `0` on any invalid input.
    fn into_size_bytes(self) -> u32;
}

impl sealed::Sealed for &str {}
impl SizeInput for &str {
    fn into_size_bytes(self) -> u32 {
        self.parse::<u64>()
            .ok()
            .and_then(|value| u32::try_from(value).ok())
            .unwrap_or(0)
    }
}

impl sealed::Sealed for &String {}
impl SizeInput for &String {
    fn into_size_bytes(self) -> u32 {
        self.as_str().into_size_bytes()
    }
}

impl sealed::Sealed for String {}
impl SizeInput for String {
    fn into_size_bytes(self) -> u32 {
        self.as_str().into_size_bytes()
    }
}

macro_rules! impl_integer_size_input {
    ($($ty:ty),*) => {
        $(
            impl sealed::Sealed for $ty {}
            impl SizeInput for $ty {
                fn into_size_bytes(self) -> u32 {
                    u32::try_from(self).unwrap_or(0)
                }
            }
        )*
    };
}

impl_integer_size_input!(i32, i64, u64, usize);

/// Parse a maximum message size; never fails.
///
/// | Input | Result |
/// |-------|--------|
/// | `""`, `"nope"`, negative, whitespace | `0` |
/// | `0 ..= u32::MAX`, with optional leading `+` | the value |
/// | `>= 2^32` | `0` |
pub fn parse_max_message_size_bytes<T: SizeInput>(value: T) -> u32 {
    value.into_size_bytes()
}
