use memchr::memchr;

use crate::{Error, Result};

const SAFE: u8 = 0;
const UNICODE: u8 = b'u';
const HEX: &[u8; 16] = b"0123456789abcdef";

/// Escape byte for every input byte: `SAFE` copies through, `UNICODE` becomes
/// `\u00XX`, anything else is the character following the backslash.
static ESCAPE: [u8; 256] = build_escape_table();

const fn build_escape_table() -> [u8; 256] {
    let mut table = [SAFE; 256];
    let mut byte = 0;
    while byte < 0x20 {
        table[byte] = UNICODE;
        byte += 1;
    }
    table[0x08] = b'b';
    table[0x09] = b't';
    table[0x0A] = b'n';
    table[0x0C] = b'f';
    table[0x0D] = b'r';
    table[b'"' as usize] = b'"';
    table[b'\\' as usize] = b'\\';
    table
}

/// ASCII that needs no escaping: `0x20-0x21`, `0x23-0x5B`, `0x5D-0x7E`.
#[inline]
pub fn is_plain_ascii(byte: u8) -> bool {
    (0x20..0x7F).contains(&byte) && byte != b'"' && byte != b'\\'
}

/// Appends `text` escaped for use inside a JSON string, without quotes.
/// Returns the number of bytes written.
pub fn escape_into(out: &mut Vec<u8>, text: &str) -> usize {
    let start_len = out.len();
    let bytes = text.as_bytes();
    let plain = bytes
        .iter()
        .position(|&byte| !is_plain_ascii(byte))
        .unwrap_or(bytes.len());
    out.extend_from_slice(&bytes[..plain]);
    if plain < bytes.len() {
        escape_slow(out, &bytes[plain..]);
    }
    out.len() - start_len
}

/// Appends `"text"` with escaping. Returns the number of bytes written.
pub fn write_quoted(out: &mut Vec<u8>, text: &str) -> usize {
    out.reserve(text.len() + 2);
    out.push(b'"');
    let written = escape_into(out, text);
    out.push(b'"');
    written + 2
}

fn escape_slow(out: &mut Vec<u8>, bytes: &[u8]) {
    let mut start = 0;
    for (idx, &byte) in bytes.iter().enumerate() {
        let escape = ESCAPE[byte as usize];
        if escape == SAFE {
            continue;
        }
        if start < idx {
            out.extend_from_slice(&bytes[start..idx]);
        }
        push_escape(out, byte, escape);
        start = idx + 1;
    }
    if start < bytes.len() {
        out.extend_from_slice(&bytes[start..]);
    }
}

#[inline]
fn push_escape(out: &mut Vec<u8>, byte: u8, escape: u8) {
    if escape == UNICODE {
        out.extend_from_slice(&[
            b'\\',
            b'u',
            b'0',
            b'0',
            HEX[(byte >> 4) as usize],
            HEX[(byte & 0x0F) as usize],
        ]);
    } else {
        out.extend_from_slice(&[b'\\', escape]);
    }
}

/// Escapes UTF-16 code units, combining surrogate pairs into supplementary
/// code points. Lone surrogates cannot be represented in UTF-8 and fail.
pub fn escape_utf16_into(out: &mut Vec<u8>, units: &[u16]) -> Result<usize> {
    let start_len = out.len();
    for decoded in char::decode_utf16(units.iter().copied()) {
        let ch = decoded.map_err(|err| {
            Error::encode(format!(
                "lone surrogate \\u{:04X} cannot be encoded",
                err.unpaired_surrogate()
            ))
        })?;
        let code_point = u32::from(ch);
        if code_point < 0x80 {
            let byte = code_point as u8;
            let escape = ESCAPE[byte as usize];
            if escape == SAFE {
                out.push(byte);
            } else {
                push_escape(out, byte, escape);
            }
        } else {
            push_code_point(out, code_point);
        }
    }
    Ok(out.len() - start_len)
}

/// Writes the UTF-8 encoding of a Unicode scalar value.
#[inline]
pub(crate) fn push_code_point(out: &mut Vec<u8>, code_point: u32) {
    if code_point < 0x80 {
        out.push(code_point as u8);
    } else if code_point < 0x800 {
        out.extend_from_slice(&[
            0xC0 | (code_point >> 6) as u8,
            0x80 | (code_point & 0x3F) as u8,
        ]);
    } else if code_point < 0x1_0000 {
        out.extend_from_slice(&[
            0xE0 | (code_point >> 12) as u8,
            0x80 | ((code_point >> 6) & 0x3F) as u8,
            0x80 | (code_point & 0x3F) as u8,
        ]);
    } else {
        out.extend_from_slice(&[
            0xF0 | (code_point >> 18) as u8,
            0x80 | ((code_point >> 12) & 0x3F) as u8,
            0x80 | ((code_point >> 6) & 0x3F) as u8,
            0x80 | (code_point & 0x3F) as u8,
        ]);
    }
}

/// Decodes the raw content of a JSON string (between the quotes) into `out`.
pub fn unescape_into(raw: &[u8], out: &mut Vec<u8>) -> Result<()> {
    unescape_bounded_into(raw, out, usize::MAX)
}

/// Like [`unescape_into`], but fails with `BufferLimitExceeded` as soon as the
/// decoded text grows past `limit` bytes.
pub fn unescape_bounded_into(raw: &[u8], out: &mut Vec<u8>, limit: usize) -> Result<()> {
    let start_len = out.len();
    let mut idx = 0;
    while idx < raw.len() {
        let rest = &raw[idx..];
        let run = memchr(b'\\', rest).unwrap_or(rest.len());
        if let Some(&control) = rest[..run].iter().find(|&&byte| byte < 0x20) {
            return Err(Error::malformed(format!(
                "unescaped control character 0x{control:02x} in string"
            )));
        }
        if out.len() - start_len + run > limit {
            return Err(over_limit(limit));
        }
        out.extend_from_slice(&rest[..run]);
        idx += run;
        if idx == raw.len() {
            break;
        }

        let escape = *raw
            .get(idx + 1)
            .ok_or_else(|| Error::malformed("unterminated escape sequence"))?;
        idx += 2;
        match escape {
            b'"' | b'\\' | b'/' => out.push(escape),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'u' => {
                let high = read_hex4(raw, idx)?;
                idx += 4;
                let code_point = match high {
                    0xD800..=0xDBFF => {
                        let low = if raw.get(idx) == Some(&b'\\') && raw.get(idx + 1) == Some(&b'u')
                        {
                            read_hex4(raw, idx + 2)?
                        } else {
                            return Err(lone_surrogate(high));
                        };
                        if !(0xDC00..=0xDFFF).contains(&low) {
                            return Err(lone_surrogate(high));
                        }
                        idx += 6;
                        0x1_0000 + ((high - 0xD800) << 10) + (low - 0xDC00)
                    }
                    0xDC00..=0xDFFF => return Err(lone_surrogate(high)),
                    _ => high,
                };
                push_code_point(out, code_point);
            }
            other => {
                return Err(Error::malformed(format!(
                    "invalid escape sequence '\\{}'",
                    other.escape_ascii()
                )))
            }
        }
        if out.len() - start_len > limit {
            return Err(over_limit(limit));
        }
    }
    std::str::from_utf8(&out[start_len..])
        .map_err(|err| Error::malformed(format!("invalid utf-8 in string: {err}")))?;
    Ok(())
}

fn over_limit(limit: usize) -> Error {
    Error::buffer_limit(format!("string exceeds the limit of {limit} bytes"))
}

pub fn unescape(raw: &[u8]) -> Result<String> {
    let mut out = Vec::with_capacity(raw.len());
    unescape_into(raw, &mut out)?;
    String::from_utf8(out).map_err(|err| Error::malformed(format!("invalid utf-8: {err}")))
}

fn read_hex4(raw: &[u8], idx: usize) -> Result<u32> {
    let digits = raw
        .get(idx..idx + 4)
        .ok_or_else(|| Error::malformed("truncated \\u escape"))?;
    let mut value = 0u32;
    for &byte in digits {
        let nibble = (byte as char).to_digit(16).ok_or_else(|| {
            Error::malformed(format!(
                "invalid hex digit '{}' in \\u escape",
                byte.escape_ascii()
            ))
        })?;
        value = (value << 4) | nibble;
    }
    Ok(value)
}

fn lone_surrogate(unit: u32) -> Error {
    Error::malformed(format!("lone surrogate \\u{unit:04X} in string"))
}
