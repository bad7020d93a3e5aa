//! Collation descriptors and string comparison under collation rules.
//!
//! A [`Collation`] captures the engine's named string-comparison policy:
//! code page, locale, sensitivity flags, and catalog version. The derived
//! encoding and locale tags are computed at construction and may
//! legitimately be absent for code pages or locales this layer does not
//! recognize; absence only disables locale-aware comparison, it is never
//! an error.

use serde::Serialize;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Sensitivity flags of a collation, parsed from the catalog bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CompareFlags {
    /// Case-insensitive comparison (`_CI_`).
    pub ignore_case: bool,
    /// Accent-insensitive comparison (`_AI_`).
    pub ignore_accent: bool,
    /// Kana-type-insensitive comparison (`_KS` absent).
    pub ignore_kana: bool,
    /// Width-insensitive comparison (`_WS` absent).
    pub ignore_width: bool,
    /// Binary code-point ordering (`_BIN`).
    pub binary: bool,
    /// Binary-2 code-point ordering (`_BIN2`).
    pub binary2: bool,
}

impl CompareFlags {
    const IGNORE_CASE: u32 = 0x0000_0001;
    const IGNORE_ACCENT: u32 = 0x0000_0002;
    const IGNORE_KANA: u32 = 0x0000_0004;
    const IGNORE_WIDTH: u32 = 0x0000_0008;
    const BINARY: u32 = 0x0000_0010;
    const BINARY2: u32 = 0x0000_0020;

    /// Parses flags from the catalog bitmask. Unknown bits are ignored.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self {
            ignore_case: bits & Self::IGNORE_CASE != 0,
            ignore_accent: bits & Self::IGNORE_ACCENT != 0,
            ignore_kana: bits & Self::IGNORE_KANA != 0,
            ignore_width: bits & Self::IGNORE_WIDTH != 0,
            binary: bits & Self::BINARY != 0,
            binary2: bits & Self::BINARY2 != 0,
        }
    }

    /// True when either binary ordering flag is set.
    #[must_use]
    pub const fn is_binary(&self) -> bool {
        self.binary || self.binary2
    }
}

/// Catalog version a collation was introduced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CollationVersion {
    /// Version 80 (original) collations.
    V80,
    /// Version 90 collations.
    V90,
    /// Version 100 collations.
    V100,
    /// Version 140 collations.
    V140,
    /// Version 160 collations.
    V160,
}

impl CollationVersion {
    /// Maps the catalog version code. Unknown codes fall back to V80 with
    /// a debug diagnostic; version only affects display, not comparison.
    #[must_use]
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::V80,
            1 => Self::V90,
            2 => Self::V100,
            3 => Self::V140,
            4 => Self::V160,
            other => {
                tracing::debug!("unknown collation version code {other}, assuming V80");
                Self::V80
            }
        }
    }
}

/// Character encoding implied by a collation's code page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Encoding {
    /// Windows-1252 (Latin-1 superset).
    Latin1,
    /// UTF-8.
    Utf8,
    /// OEM United States (code page 437).
    Cp437,
    /// OEM Multilingual Latin 1 (code page 850).
    Cp850,
    /// Windows-1250 Central European.
    Cp1250,
    /// Windows-1251 Cyrillic.
    Cp1251,
    /// Windows-1253 Greek.
    Cp1253,
    /// Windows-1254 Turkish.
    Cp1254,
}

fn encoding_for_code_page(code_page: i32) -> Option<Encoding> {
    match code_page {
        437 => Some(Encoding::Cp437),
        850 => Some(Encoding::Cp850),
        1250 => Some(Encoding::Cp1250),
        1251 => Some(Encoding::Cp1251),
        1252 => Some(Encoding::Latin1),
        1253 => Some(Encoding::Cp1253),
        1254 => Some(Encoding::Cp1254),
        65001 => Some(Encoding::Utf8),
        _ => None,
    }
}

fn locale_for_lcid(locale_id: i32) -> Option<&'static str> {
    match locale_id {
        1028 => Some("zh-TW"),
        1031 => Some("de-DE"),
        1033 => Some("en-US"),
        1036 => Some("fr-FR"),
        1040 => Some("it-IT"),
        1041 => Some("ja-JP"),
        1042 => Some("ko-KR"),
        1045 => Some("pl-PL"),
        1046 => Some("pt-BR"),
        1049 => Some("ru-RU"),
        2052 => Some("zh-CN"),
        2057 => Some("en-GB"),
        3082 => Some("es-ES"),
        _ => None,
    }
}

/// A named collation with its comparison semantics.
///
/// Equality between two collations is structural over name, code page,
/// locale, flags, and version.
#[derive(Debug, Clone, Serialize)]
pub struct Collation {
    name: String,
    code_page: i32,
    locale_id: i32,
    flags: CompareFlags,
    version: CollationVersion,
    encoding: Option<Encoding>,
    locale: Option<&'static str>,
}

impl Collation {
    /// Builds a collation from the raw catalog row.
    ///
    /// Never fails: an unknown code page or locale merely leaves the
    /// derived fields absent and logs a diagnostic.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        code_page: i32,
        locale_id: i32,
        flag_bits: u32,
        version_code: u8,
    ) -> Self {
        let name = name.into();
        let encoding = encoding_for_code_page(code_page);
        if encoding.is_none() {
            tracing::debug!(
                "collation '{name}' uses unrecognized code page {code_page}; \
                 encoding-aware behavior disabled"
            );
        }
        let locale = locale_for_lcid(locale_id);
        if locale.is_none() {
            tracing::debug!(
                "collation '{name}' uses unrecognized locale id {locale_id}; \
                 locale-aware comparison disabled"
            );
        }
        Self {
            name,
            code_page,
            locale_id,
            flags: CompareFlags::from_bits(flag_bits),
            version: CollationVersion::from_code(version_code),
            encoding,
            locale,
        }
    }

    /// The collation's catalog name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The code page of the collation's narrow character types.
    #[must_use]
    pub const fn code_page(&self) -> i32 {
        self.code_page
    }

    /// The Windows locale id backing linguistic comparison.
    #[must_use]
    pub const fn locale_id(&self) -> i32 {
        self.locale_id
    }

    /// The sensitivity flags.
    #[must_use]
    pub const fn flags(&self) -> CompareFlags {
        self.flags
    }

    /// The catalog version.
    #[must_use]
    pub const fn version(&self) -> CollationVersion {
        self.version
    }

    /// The derived encoding, when the code page is recognized.
    #[must_use]
    pub const fn encoding(&self) -> Option<Encoding> {
        self.encoding
    }

    /// The derived BCP-47 locale tag, when the locale id is recognized.
    #[must_use]
    pub const fn locale(&self) -> Option<&'static str> {
        self.locale
    }

    fn fold(&self, s: &str) -> String {
        if self.flags.ignore_case && !self.flags.is_binary() {
            s.to_lowercase()
        } else {
            s.to_string()
        }
    }

    /// Orders two strings under this collation's flags.
    ///
    /// Binary collations compare code points directly; otherwise case
    /// folding is applied when the collation is case-insensitive.
    /// Accent/kana/width insensitivity requires locale tables this layer
    /// does not carry and is recorded but not applied.
    #[must_use]
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        if self.flags.is_binary() {
            a.bytes().cmp(b.bytes())
        } else {
            self.fold(a).cmp(&self.fold(b))
        }
    }

    /// True when the two strings are equal under this collation.
    #[must_use]
    pub fn equals(&self, a: &str, b: &str) -> bool {
        self.compare(a, b) == Ordering::Equal
    }

    /// Hashes a string consistently with [`Collation::equals`].
    #[must_use]
    pub fn hash_str(&self, s: &str) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        if self.flags.is_binary() {
            s.hash(&mut hasher);
        } else {
            self.fold(s).hash(&mut hasher);
        }
        hasher.finish()
    }
}

impl PartialEq for Collation {
    fn eq(&self, other: &Self) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
            && self.code_page == other.code_page
            && self.locale_id == other.locale_id
            && self.flags == other.flags
            && self.version == other.version
    }
}

impl Eq for Collation {}

impl std::fmt::Display for Collation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ci_as() -> Collation {
        // Latin1_General_CI_AS: case-insensitive, accent-sensitive.
        Collation::new("Latin1_General_CI_AS", 1252, 1033, 0x1, 2)
    }

    #[test]
    fn test_flags_from_bits() {
        let flags = CompareFlags::from_bits(0x1 | 0x2 | 0x10);
        assert!(flags.ignore_case);
        assert!(flags.ignore_accent);
        assert!(flags.binary);
        assert!(!flags.ignore_kana);
        assert!(flags.is_binary());
    }

    #[test]
    fn test_case_insensitive_compare() {
        let c = ci_as();
        assert!(c.equals("Widgets", "WIDGETS"));
        assert_eq!(c.compare("abc", "ABD"), Ordering::Less);
        assert_eq!(c.hash_str("Widgets"), c.hash_str("wIDGETS"));
    }

    #[test]
    fn test_binary_compare_is_case_sensitive() {
        let c = Collation::new("Latin1_General_BIN2", 1252, 1033, 0x20, 2);
        assert!(!c.equals("Widgets", "WIDGETS"));
        assert_eq!(c.compare("A", "a"), Ordering::Less);
    }

    #[test]
    fn test_unknown_code_page_and_locale_do_not_fail() {
        let c = Collation::new("Mystery_CS_AS", 12345, 99999, 0, 0);
        assert!(c.encoding().is_none());
        assert!(c.locale().is_none());
        // Comparison still works, just without locale awareness.
        assert!(c.equals("x", "x"));
        assert!(!c.equals("x", "X"));
    }

    #[test]
    fn test_derived_fields() {
        let c = ci_as();
        assert_eq!(c.encoding(), Some(Encoding::Latin1));
        assert_eq!(c.locale(), Some("en-US"));
        assert_eq!(c.version(), CollationVersion::V100);
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(ci_as(), ci_as());
        let other = Collation::new("Latin1_General_CI_AS", 1252, 1033, 0x3, 2);
        assert_ne!(ci_as(), other);
    }
}
