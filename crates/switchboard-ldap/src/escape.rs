// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Search filter escaping (RFC 4515).

const HEX: &[u8; 16] = b"0123456789abcdef";

fn must_escape(b: u8) -> bool {
    b > 0x7f || matches!(b, b'(' | b')' | b'\\' | b'*' | 0)
}

/// Escapes `()*\`, NUL, and every byte outside ASCII as `\xx`.
///
/// Use on any value interpolated into a search filter.
pub fn escape_filter(value: &str) -> String {
    if !value.bytes().any(must_escape) {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() * 3);
    for b in value.bytes() {
        if must_escape(b) {
            out.push('\\');
            out.push(HEX[usize::from(b >> 4)] as char);
            out.push(HEX[usize::from(b & 0xf)] as char);
        } else {
            out.push(b as char);
        }
    }
    out
}
