//! Filesystem-safe names for generated files and directories.
//!
//! Namespaces and type names can contain anything the metadata allows: generic arity
//! markers, compiler-reserved characters, path separators, characters outside the
//! Basic Multilingual Plane, or names that Windows reserves for devices. The functions
//! in this module turn such names into path segments that are valid on every
//! platform. All of them are total: any input produces a non-empty name.
//!
//! # Segment budget
//!
//! Every path segment is limited to [`MAX_SEGMENT_LENGTH`] units. A unit is a UTF-8
//! byte on Unix-like systems and a UTF-16 code unit on Windows, matching the limits
//! the respective filesystems impose on a single component. Characters that would
//! exceed the budget are dropped, scanning continues until the segment ends.
//!
//! # Examples
//!
//! ```rust
//! use dotsource::naming::{clean_up_file_name, clean_up_path};
//! use std::path::MAIN_SEPARATOR;
//!
//! assert_eq!(clean_up_file_name("List`1", ".cs"), "List.cs");
//! assert_eq!(clean_up_file_name("con", ".cs"), "con_.cs");
//! assert_eq!(
//!     clean_up_path("Namespace.A"),
//!     format!("Namespace{MAIN_SEPARATOR}A")
//! );
//! ```

use std::path::MAIN_SEPARATOR;

use strum::{AsRefStr, EnumIter, IntoEnumIterator};

/// Maximum length of one path segment, in platform units.
pub const MAX_SEGMENT_LENGTH: usize = 255;

/// Device names Windows refuses as file names, regardless of extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, AsRefStr)]
#[strum(serialize_all = "UPPERCASE")]
enum ReservedName {
    Con,
    Prn,
    Aux,
    Nul,
    Com1,
    Com2,
    Com3,
    Com4,
    Com5,
    Com6,
    Com7,
    Com8,
    Com9,
    Lpt1,
    Lpt2,
    Lpt3,
    Lpt4,
    Lpt5,
    Lpt6,
    Lpt7,
    Lpt8,
    Lpt9,
}

fn is_reserved_name(name: &str) -> bool {
    ReservedName::iter().any(|reserved| reserved.as_ref().eq_ignore_ascii_case(name))
}

/// Budget consumed by `c` on the current platform.
fn units(c: char) -> usize {
    if cfg!(windows) {
        c.len_utf16()
    } else {
        c.len_utf8()
    }
}

fn str_units(text: &str) -> usize {
    text.chars().map(units).sum()
}

/// First code point of each run of ten decimal digits in the BMP.
const DECIMAL_DIGIT_ZEROS: [u32; 37] = [
    0x0030, 0x0660, 0x06F0, 0x07C0, 0x0966, 0x09E6, 0x0A66, 0x0AE6, 0x0B66, 0x0BE6, 0x0C66,
    0x0CE6, 0x0D66, 0x0DE6, 0x0E50, 0x0ED0, 0x0F20, 0x1040, 0x1090, 0x17E0, 0x1810, 0x1946,
    0x19D0, 0x1A80, 0x1A90, 0x1B50, 0x1BB0, 0x1C40, 0x1C50, 0xA620, 0xA8D0, 0xA900, 0xA9D0,
    0xA9F0, 0xAA50, 0xABF0, 0xFF10,
];

fn is_decimal_digit(c: char) -> bool {
    let code = u32::from(c);
    let index = DECIMAL_DIGIT_ZEROS.partition_point(|&zero| zero <= code);
    index > 0 && code - DECIMAL_DIGIT_ZEROS[index - 1] < 10
}

/// Letters and decimal digits. Letter numbers such as `Ⅻ` and other numerics such as
/// `²` are not name characters.
fn is_letter_or_digit(c: char) -> bool {
    (c.is_alphabetic() && !c.is_numeric()) || is_decimal_digit(c)
}

fn is_name_char(c: char) -> bool {
    // Characters outside the BMP are a surrogate pair in UTF-16; neither half is a
    // letter, so they never pass as name characters.
    u32::from(c) <= 0xFFFF && (is_letter_or_digit(c) || c == '-' || c == '_')
}

#[derive(Clone, Copy)]
struct Mode {
    separate_at_dots: bool,
    file_name: bool,
    path: bool,
}

/// Splits `text` into base name and extension if the part after the last dot is a
/// plausible extension.
fn split_extension(text: &str) -> (&str, Option<&str>) {
    let Some(last_dot) = text.rfind('.') else {
        return (text, None);
    };

    let extension = &text[last_dot..];
    if str_units(extension) >= MAX_SEGMENT_LENGTH {
        return (text, None);
    }

    let valid = extension
        .chars()
        .all(|c| is_name_char(c) || c == '.');
    if valid {
        (&text[..last_dot], Some(extension))
    } else {
        (text, None)
    }
}

fn clean_up_name(text: &str, mode: Mode) -> String {
    let (mut text, extension) = if mode.file_name {
        split_extension(text)
    } else {
        (text, None)
    };

    if let Some(pos) = text.find(':') {
        if pos > 0 {
            text = &text[..pos];
        }
    }
    text = text.trim();
    if let Some(pos) = text.find('`') {
        if pos > 0 {
            text = text[..pos].trim();
        }
    }

    let mut result = String::with_capacity(text.len() + extension.map_or(0, str::len));
    let mut segment_length = 0usize;
    for c in text.chars() {
        if is_name_char(c) {
            segment_length += units(c);
            if segment_length <= MAX_SEGMENT_LENGTH {
                result.push(c);
            }
        } else if c == '.' && !result.is_empty() && !result.ends_with('.') {
            segment_length += 1;
            if mode.separate_at_dots || segment_length <= MAX_SEGMENT_LENGTH {
                result.push('.');
            }
            if mode.separate_at_dots {
                segment_length = 0;
            }
        } else if mode.path && (c == '/' || c == '\\') && segment_length > 0 {
            result.push(MAIN_SEPARATOR);
            segment_length = 0;
        } else {
            // The high half of a surrogate pair is dropped, the low half becomes the
            // replacement, so a supplementary character yields a single `-`.
            segment_length += 1;
            if segment_length <= MAX_SEGMENT_LENGTH {
                result.push('-');
            }
        }
    }

    if result.is_empty() {
        result.push('-');
    }
    if is_reserved_name(&result) {
        result.push('_');
    }

    if let Some(extension) = extension {
        let extension_units = str_units(extension);
        while !result.is_empty() && str_units(&result) + extension_units > MAX_SEGMENT_LENGTH {
            result.pop();
        }
        if result.is_empty() {
            result.push('-');
        }
        result.push_str(extension);
    }

    if result == "." {
        return "_".to_string();
    }
    result
}

/// Cleans up `text` for use as a file name with the given extension.
///
/// A missing leading `.` on `extension` is added.
///
/// ```rust
/// use dotsource::naming::clean_up_file_name;
///
/// assert_eq!(clean_up_file_name("Widget", "cs"), "Widget.cs");
/// assert_eq!(clean_up_file_name("<>c__DisplayClass0_0", ".cs"), "--c__DisplayClass0_0.cs");
/// ```
#[must_use]
pub fn clean_up_file_name(text: &str, extension: &str) -> String {
    let mut name = String::with_capacity(text.len() + extension.len() + 1);
    name.push_str(text);
    if !extension.starts_with('.') {
        name.push('.');
    }
    name.push_str(extension);

    clean_up_name(
        &name,
        Mode {
            separate_at_dots: false,
            file_name: true,
            path: false,
        },
    )
}

/// Cleans up a file name that may contain directory separators.
#[must_use]
pub fn sanitize_file_name(text: &str) -> String {
    clean_up_name(
        text,
        Mode {
            separate_at_dots: false,
            file_name: true,
            path: true,
        },
    )
}

/// Cleans up `text` for use as a single directory name.
///
/// Dots are kept, so a namespace maps to one collapsed directory.
#[must_use]
pub fn clean_up_directory_name(text: &str) -> String {
    clean_up_name(
        text,
        Mode {
            separate_at_dots: false,
            file_name: false,
            path: false,
        },
    )
}

/// Turns a dotted name into a relative directory path, one directory per level.
#[must_use]
pub fn clean_up_path(text: &str) -> String {
    clean_up_name(
        text,
        Mode {
            separate_at_dots: true,
            file_name: false,
            path: true,
        },
    )
    .replace('.', &MAIN_SEPARATOR.to_string())
}
