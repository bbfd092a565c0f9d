//! Route-name grammar validation.
//!
//! Regular routes match `^[A-Za-z][A-Za-z0-9_\-/]*[A-Za-z0-9]$`; system routes
//! (reserved for introspection) replace the leading letter with `_` and must
//! be at least three characters. Whenever a name contains `/`, every
//! slash-separated segment must additionally be at least two characters,
//! start with a letter, and end with a letter or digit.
//!
//! The validator reports *why* a name was rejected, not just that the regex
//! failed; registration surfaces that diagnostic to the developer.

use crate::error::RouteNameError;

fn is_letter(b: u8) -> bool {
    b.is_ascii_alphabetic()
}

fn is_letter_or_number(b: u8) -> bool {
    b.is_ascii_alphanumeric()
}

fn is_route_char(b: u8) -> bool {
    is_letter_or_number(b) || b == b'_' || b == b'-' || b == b'/'
}

/// Equivalent of the anchored route regex, over ASCII bytes.
fn matches_grammar(name: &str, system: bool) -> bool {
    let bytes = name.as_bytes();
    let min_len = if system { 3 } else { 2 };
    if bytes.len() < min_len {
        return false;
    }
    let head = if system {
        bytes[0] == b'_' && is_letter(bytes[1])
    } else {
        is_letter(bytes[0])
    };
    if !head {
        return false;
    }
    if !is_letter_or_number(bytes[bytes.len() - 1]) {
        return false;
    }
    bytes.iter().all(|&b| is_route_char(b))
}

/// Validates a route name against the grammar.
///
/// Returns the specific failure reason; registration treats any failure as a
/// fatal startup fault. Batch handling reuses the same diagnostic for the
/// 400 batch-shape error.
pub fn validate_route_name(name: &str, system: bool) -> Result<(), RouteNameError> {
    if name.is_empty() {
        return Err(RouteNameError::Missing);
    }

    let bytes = name.as_bytes();
    if system && !matches_grammar(name, true) {
        return Err(if bytes.len() < 3 {
            RouteNameError::SystemTooShort
        } else if bytes[0] != b'_' {
            RouteNameError::SystemBadStart
        } else if !is_letter_or_number(bytes[bytes.len() - 1]) {
            RouteNameError::SystemBadEnd
        } else {
            RouteNameError::SystemIllegalCharacters
        });
    }
    if !system && !matches_grammar(name, false) {
        return Err(if bytes.len() < 2 {
            RouteNameError::TooShort
        } else if !is_letter(bytes[0]) {
            RouteNameError::BadStart
        } else if !is_letter_or_number(bytes[bytes.len() - 1]) {
            RouteNameError::BadEnd
        } else {
            RouteNameError::IllegalCharacters
        });
    }

    if name.contains('/') {
        for segment in name.split('/') {
            let seg = segment.as_bytes();
            if seg.len() < 2 {
                return Err(RouteNameError::SegmentTooShort);
            } else if !is_letter(seg[0]) {
                return Err(RouteNameError::SegmentBadStart);
            } else if !is_letter_or_number(seg[seg.len() - 1]) {
                return Err(RouteNameError::SegmentBadEnd);
            }
        }
    }

    Ok(())
}
