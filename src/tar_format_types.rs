/*
MIT License

Copyright (c) 2023 Philipp Schuster

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
*/
//! Fixed-length field types of a Tar header.

use core::fmt::{Debug, Formatter};
use core::str::{from_utf8, Utf8Error};
use num_traits::Num;

/// Base type for strings embedded in a Tar header. The length depends on the
/// context. The returned string is likely to be UTF-8/ASCII, which is verified
/// by getters, such as [`TarFormatString::as_str`].
///
/// An optionally null terminated string. The contents are either:
/// 1. A fully populated string with no null termination or
/// 2. A partially populated string where the unused bytes are zero.
#[derive(Copy, Clone, PartialEq, Eq)]
#[repr(C)]
pub struct TarFormatString<const N: usize> {
    bytes: [u8; N],
}

/// A Tar format string is a fixed length byte array containing UTF-8 bytes.
/// This string will be null terminated if it doesn't fill the entire array.
impl<const N: usize> TarFormatString<N> {
    /// Constructor.
    ///
    /// # Panics
    /// Panics of `N` is zero, i.e., the underlying array has no length.
    #[must_use]
    pub const fn new(bytes: [u8; N]) -> Self {
        assert!(N > 0, "array should have at least one element");
        Self { bytes }
    }

    /// True if the is string empty (ignoring NULL bytes).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes[0] == 0
    }

    /// Returns the length of the payload in bytes. This is either the full
    /// capacity `N` or the data until the first NULL byte.
    #[must_use]
    pub fn size(&self) -> usize {
        memchr::memchr(0, &self.bytes).unwrap_or(N)
    }

    /// The whole underlying array, including NULL bytes.
    #[must_use]
    pub const fn as_raw(&self) -> &[u8; N] {
        &self.bytes
    }

    /// The raw bytes up to (excluding) the first NULL byte.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[0..self.size()]
    }

    /// Returns a str ref without terminating or intermediate NULL bytes. The
    /// string is truncated at the first NULL byte, in case not the full length
    /// was used.
    ///
    /// # Errors
    /// Returns a [`Utf8Error`] error for invalid strings.
    pub fn as_str(&self) -> Result<&str, Utf8Error> {
        from_utf8(self.as_bytes())
    }

    /// The digits of a Tar-style encoded number: leading spaces are skipped
    /// and the number stops at the first space or NULL byte. Old writers pad
    /// numbers on both sides, e.g. `" 11221\0 "`.
    ///
    /// Returns `None` if anything but spaces and NULL bytes follows.
    fn digits(&self) -> Option<&[u8]> {
        let bytes = &self.bytes[..];
        let start = bytes.iter().position(|&b| b != b' ').unwrap_or(bytes.len());
        let bytes = &bytes[start..];
        let end = memchr::memchr2(b' ', 0, bytes).unwrap_or(bytes.len());
        let (digits, rest) = bytes.split_at(end);
        rest.iter()
            .all(|&b| b == b' ' || b == 0)
            .then_some(digits)
    }

    /// True if the field holds no number at all, only spaces and NULL bytes.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.bytes.iter().all(|&b| b == b' ' || b == 0)
    }
}

impl<const N: usize> Debug for TarFormatString<N> {
    fn fmt(&self, f: &mut Formatter) -> core::fmt::Result {
        write!(
            f,
            "str='{:?}',byte_usage={}/{}",
            self.as_str(),
            self.size(),
            N
        )
    }
}

/// A number with a specified base. Surrounding spaces in the string are ignored.
#[derive(Copy, Clone, PartialEq, Eq)]
#[repr(C)]
pub struct TarFormatNumber<const N: usize, const R: u32>(TarFormatString<N>);

/// An octal number. Surrounding spaces in the string are ignored.
#[derive(Copy, Clone, PartialEq, Eq)]
#[repr(C)]
pub struct TarFormatOctal<const N: usize>(TarFormatNumber<N, 8>);

impl<const N: usize, const R: u32> TarFormatNumber<N, R> {
    #[cfg(test)]
    const fn new(bytes: [u8; N]) -> Self {
        Self(TarFormatString::<N> { bytes })
    }

    /// Interprets the underlying value as a number of the specified type using
    /// its respective radix. An empty field is zero.
    ///
    /// Returns `None` if the field holds anything but digits of the radix
    /// between its padding, or the value does not fit into `T`.
    pub fn as_number<T>(&self) -> Option<T>
    where
        T: Num,
    {
        let digits = self.0.digits()?;
        if digits.is_empty() {
            return Some(T::zero());
        }
        // from_str_radix tolerates a sign, the format does not
        if !digits.iter().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let str = from_utf8(digits).ok()?;
        T::from_str_radix(str, R).ok()
    }

    /// Returns the underlying [`TarFormatString`].
    #[must_use]
    pub const fn as_inner(&self) -> &TarFormatString<N> {
        &self.0
    }
}

impl<const N: usize, const R: u32> Debug for TarFormatNumber<N, R> {
    fn fmt(&self, f: &mut Formatter) -> core::fmt::Result {
        match self.as_number::<u64>() {
            None => write!(f, "<invalid> [{:?}]", self.0.as_str()),
            Some(val) => write!(f, "{} [{:?}]", val, self.0.as_str()),
        }
    }
}

impl<const N: usize> Debug for TarFormatOctal<N> {
    fn fmt(&self, f: &mut Formatter) -> core::fmt::Result {
        self.0.fmt(f)
    }
}

impl<const N: usize> TarFormatOctal<N> {
    #[cfg(test)]
    #[must_use]
    pub const fn new(bytes: [u8; N]) -> Self {
        Self(TarFormatNumber::<N, 8>::new(bytes))
    }

    /// Interprets the underlying value as an octal number.
    /// See [`TarFormatNumber::as_number`].
    pub fn as_number<T>(&self) -> Option<T>
    where
        T: Num,
    {
        self.0.as_number::<T>()
    }

    /// Returns the underlying [`TarFormatString`].
    #[must_use]
    pub const fn as_inner(&self) -> &TarFormatString<N> {
        self.0.as_inner()
    }
}

#[cfg(test)]
mod tar_format_string_tests {
    use super::TarFormatString;

    use core::mem::size_of_val;

    #[test]
    fn test_empty_string() {
        let empty = TarFormatString::new([0]);
        assert_eq!(size_of_val(&empty), 1);
        assert!(empty.is_empty());
        assert_eq!(empty.size(), 0);
        assert_eq!(empty.as_str(), Ok(""));
    }

    #[test]
    fn test_one_byte_string() {
        let s = TarFormatString::new([b'A']);
        assert_eq!(size_of_val(&s), 1);
        assert!(!s.is_empty());
        assert_eq!(s.size(), 1);
        assert_eq!(s.as_str(), Ok("A"));
    }

    #[test]
    fn test_two_byte_string_nul_terminated() {
        let s = TarFormatString::new([b'A', 0, b'B']);
        assert_eq!(size_of_val(&s), 3);
        assert!(!s.is_empty());
        assert_eq!(s.size(), 1);
        assert_eq!(s.as_str(), Ok("A"));
        assert_eq!(s.as_bytes(), b"A");
    }

    #[test]
    fn test_invalid_utf8() {
        let s = TarFormatString::new([b'A', 0xff, 0]);
        assert_eq!(s.size(), 2);
        assert!(s.as_str().is_err());
    }
}

#[cfg(test)]
mod tar_format_number_tests {
    use crate::{TarFormatNumber, TarFormatOctal};

    #[test]
    fn test_as_number_with_space_in_string() {
        let str = [b'0', b'1', b'0', b' ', 0];
        let str = TarFormatNumber::<5, 10>::new(str);
        assert_eq!(str.as_number::<u64>(), Some(10));
    }

    #[test]
    fn test_octal_trailing_nul_and_space() {
        // checksum field as written by GNU tar
        let cksum = TarFormatOctal::new(*b"011221\0 ");
        assert_eq!(cksum.as_number::<u32>(), Some(0o11221));
    }

    #[test]
    fn test_octal_leading_spaces() {
        // checksum field as written by historical writers
        let cksum = TarFormatOctal::new(*b"  11221\0");
        assert_eq!(cksum.as_number::<u32>(), Some(0o11221));
    }

    #[test]
    fn test_octal_empty_is_zero() {
        assert_eq!(TarFormatOctal::new([0; 12]).as_number::<u64>(), Some(0));
        assert_eq!(TarFormatOctal::new([b' '; 8]).as_number::<u32>(), Some(0));
    }

    #[test]
    fn test_octal_rejects_garbage() {
        assert_eq!(TarFormatOctal::new(*b"0000x44\0").as_number::<u32>(), None);
        assert_eq!(TarFormatOctal::new(*b"0000948\0").as_number::<u32>(), None);
        assert_eq!(TarFormatOctal::new(*b"+000644\0").as_number::<u32>(), None);
        assert_eq!(TarFormatOctal::new(*b"12 34\0\0\0").as_number::<u32>(), None);
        assert_eq!(TarFormatOctal::new(*b"644\0x\0\0\0").as_number::<u32>(), None);
        assert_eq!(TarFormatOctal::new(*b" 644 \0 \0").as_number::<u32>(), Some(0o644));
    }

    #[test]
    fn test_octal_blank() {
        assert!(TarFormatOctal::new([b' '; 12]).as_inner().is_blank());
        assert!(TarFormatOctal::new([0; 12]).as_inner().is_blank());
        assert!(!TarFormatOctal::new(*b"00000000000\0").as_inner().is_blank());
    }

    #[test]
    fn test_octal_overflow() {
        let size = TarFormatOctal::new(*b"77777777777\0");
        assert_eq!(size.as_number::<u64>(), Some(0o77777777777));
        assert_eq!(size.as_number::<u16>(), None);
    }
}
