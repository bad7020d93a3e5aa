//! Size, precision, and scale descriptor for native types.

use serde::Serialize;

/// Sentinel used by the engine catalog for "unbounded" variable-length
/// types (`varchar(max)`, `varbinary(max)`, `xml`, and friends).
pub const MAX_LENGTH_UNLIMITED: i16 = -1;

/// Immutable size/precision/scale triple refining a base native type into
/// a concretely-sized instance.
///
/// Equality is bit-identity of the triple, which is what makes
/// [`crate::types::NativeType::refine_with_size`] able to detect no-op
/// refinements cheaply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct SizeSpec {
    /// Maximum length in bytes as the engine catalog reports it, or
    /// [`MAX_LENGTH_UNLIMITED`] for unbounded types.
    pub max_length: i16,
    /// Numeric precision (total significant digits), zero when not
    /// applicable.
    pub precision: u8,
    /// Numeric scale (digits right of the decimal point), zero when not
    /// applicable.
    pub scale: u8,
}

impl SizeSpec {
    /// Creates a size spec from the raw catalog triple.
    #[must_use]
    pub const fn new(max_length: i16, precision: u8, scale: u8) -> Self {
        Self {
            max_length,
            precision,
            scale,
        }
    }

    /// Creates a length-only spec, as used by character and binary types.
    #[must_use]
    pub const fn of_length(max_length: i16) -> Self {
        Self::new(max_length, 0, 0)
    }

    /// Creates an unbounded spec (`max` length sentinel).
    #[must_use]
    pub const fn unlimited() -> Self {
        Self::new(MAX_LENGTH_UNLIMITED, 0, 0)
    }

    /// Creates a precision/scale spec, as used by decimal types.
    #[must_use]
    pub const fn of_decimal(precision: u8, scale: u8) -> Self {
        Self::new(0, precision, scale)
    }

    /// True when the max length is the unbounded sentinel.
    #[must_use]
    pub const fn is_unlimited(&self) -> bool {
        self.max_length < 0
    }
}

impl std::fmt::Display for SizeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.precision > 0 {
            write!(f, "({}, {})", self.precision, self.scale)
        } else if self.is_unlimited() {
            write!(f, "(max)")
        } else {
            write!(f, "({})", self.max_length)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_is_bit_identity() {
        assert_eq!(SizeSpec::new(10, 0, 0), SizeSpec::of_length(10));
        assert_ne!(SizeSpec::new(10, 0, 0), SizeSpec::new(10, 1, 0));
        assert_ne!(SizeSpec::unlimited(), SizeSpec::of_length(0));
    }

    #[test]
    fn test_unlimited_sentinel() {
        assert!(SizeSpec::unlimited().is_unlimited());
        assert!(!SizeSpec::of_length(8000).is_unlimited());
    }

    #[test]
    fn test_display() {
        assert_eq!(SizeSpec::of_decimal(18, 2).to_string(), "(18, 2)");
        assert_eq!(SizeSpec::unlimited().to_string(), "(max)");
        assert_eq!(SizeSpec::of_length(50).to_string(), "(50)");
    }
}
