//! Byte encodings for [`crate::Value`].
//!
//! Two distinct encodings are kept, per spec §4.1:
//!
//! - [`encode`] is a plain, self-describing wire form (tag + payload) used
//!   to store a value; it does not need to sort.
//! - [`encode_as_key`] is an *order-preserving* form: for values of the same
//!   type, `a.cmp(b) == encode_as_key(a).cmp(encode_as_key(b))`, and the
//!   leading type-tag byte fixes the cross-type order
//!   `NULL < BOOLEAN < INTEGER/BIGINT < DOUBLE < TIMESTAMP < TEXT < BLOB`.
//!   Passing `desc = true` bitwise-inverts the whole encoding, which
//!   reverses the relation while staying a valid byte-ordered key.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::ValueError;
use crate::Value;

pub fn base64_encode(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

pub fn base64_decode(text: &str) -> Result<Vec<u8>, ValueError> {
    BASE64.decode(text).map_err(|e| ValueError::CastError {
        from: "TEXT",
        to: "BLOB",
        reason: e.to_string(),
    })
}

const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_NUMERIC: u8 = 2;
const TAG_DOUBLE: u8 = 3;
const TAG_TIMESTAMP: u8 = 4;
const TAG_TEXT: u8 = 5;
const TAG_BLOB: u8 = 6;

fn encode_i128_ordered(x: i128, dst: &mut Vec<u8>) {
    let u = (x as u128) ^ (1u128 << 127);
    dst.extend_from_slice(&u.to_be_bytes());
}

fn encode_i64_ordered(x: i64, dst: &mut Vec<u8>) {
    let u = (x as u64) ^ (1u64 << 63);
    dst.extend_from_slice(&u.to_be_bytes());
}

fn encode_f64_ordered(x: f64, dst: &mut Vec<u8>) {
    let bits = x.to_bits();
    let t = if (bits >> 63) == 1 { !bits } else { bits | (1u64 << 63) };
    dst.extend_from_slice(&t.to_be_bytes());
}

/// Escapes `0x00` as `0x00 0xFF` and terminates with `0x00 0x00`, so that
/// concatenating several encoded values into a composite key never lets one
/// value's bytes bleed into the ordering of the next.
fn encode_bytes_ordered(bytes: &[u8], dst: &mut Vec<u8>) {
    for &b in bytes {
        if b == 0 {
            dst.push(0x00);
            dst.push(0xFF);
        } else {
            dst.push(b);
        }
    }
    dst.push(0x00);
    dst.push(0x00);
}

/// Order-preserving key encoding. See module docs.
pub fn encode_as_key(value: &Value, desc: bool, dst: &mut Vec<u8>) -> Result<(), ValueError> {
    let start = dst.len();
    match value {
        Value::Null => dst.push(TAG_NULL),
        Value::Boolean(b) => {
            dst.push(TAG_BOOL);
            dst.push(*b as u8);
        }
        Value::Integer(i) => {
            dst.push(TAG_NUMERIC);
            encode_i128_ordered(*i as i128, dst);
        }
        Value::BigInt(i) => {
            dst.push(TAG_NUMERIC);
            encode_i128_ordered(*i as i128, dst);
        }
        Value::Double(d) => {
            dst.push(TAG_DOUBLE);
            encode_f64_ordered(*d, dst);
        }
        Value::Timestamp(t) => {
            dst.push(TAG_TIMESTAMP);
            encode_i64_ordered(*t, dst);
        }
        Value::Text(s) => {
            dst.push(TAG_TEXT);
            encode_bytes_ordered(s.as_bytes(), dst);
        }
        Value::Blob(b) => {
            dst.push(TAG_BLOB);
            encode_bytes_ordered(b, dst);
        }
    }
    if desc {
        for byte in &mut dst[start..] {
            *byte = !*byte;
        }
    }
    Ok(())
}

/// Decodes one value written by [`encode`], returning the value and the
/// number of bytes consumed. Used by `corvid-row`'s `EncodedRow` to decode
/// a concatenated row buffer column by column, without allocating upfront.
pub fn decode(src: &[u8]) -> Result<(Value, usize), ValueError> {
    let bad = || ValueError::ParseError {
        kind: "encoded value",
        input: format!("{} bytes", src.len()),
        reason: "truncated or malformed buffer".to_string(),
    };
    let tag = *src.first().ok_or_else(bad)?;
    let rest = &src[1..];
    match tag {
        TAG_NULL => Ok((Value::Null, 1)),
        TAG_BOOL => {
            let b = *rest.first().ok_or_else(bad)? != 0;
            Ok((Value::Boolean(b), 2))
        }
        TAG_NUMERIC => {
            let width = *rest.first().ok_or_else(bad)?;
            match width {
                0 => {
                    let bytes: [u8; 4] = rest.get(1..5).ok_or_else(bad)?.try_into().map_err(|_| bad())?;
                    Ok((Value::Integer(i32::from_be_bytes(bytes)), 6))
                }
                1 => {
                    let bytes: [u8; 8] = rest.get(1..9).ok_or_else(bad)?.try_into().map_err(|_| bad())?;
                    Ok((Value::BigInt(i64::from_be_bytes(bytes)), 10))
                }
                _ => Err(bad()),
            }
        }
        TAG_DOUBLE => {
            let bytes: [u8; 8] = rest.get(0..8).ok_or_else(bad)?.try_into().map_err(|_| bad())?;
            Ok((Value::Double(f64::from_be_bytes(bytes)), 9))
        }
        TAG_TIMESTAMP => {
            let bytes: [u8; 8] = rest.get(0..8).ok_or_else(bad)?.try_into().map_err(|_| bad())?;
            Ok((Value::Timestamp(i64::from_be_bytes(bytes)), 9))
        }
        TAG_TEXT => {
            let len_bytes: [u8; 4] = rest.get(0..4).ok_or_else(bad)?.try_into().map_err(|_| bad())?;
            let len = u32::from_be_bytes(len_bytes) as usize;
            let body = rest.get(4..4 + len).ok_or_else(bad)?;
            let s = String::from_utf8(body.to_vec()).map_err(|_| bad())?;
            Ok((Value::Text(s), 1 + 4 + len))
        }
        TAG_BLOB => {
            let len_bytes: [u8; 4] = rest.get(0..4).ok_or_else(bad)?.try_into().map_err(|_| bad())?;
            let len = u32::from_be_bytes(len_bytes) as usize;
            let body = rest.get(4..4 + len).ok_or_else(bad)?;
            Ok((Value::Blob(body.to_vec()), 1 + 4 + len))
        }
        _ => Err(bad()),
    }
}

/// Plain tagged encoding; not order-preserving, used for row/value storage.
pub fn encode(value: &Value, dst: &mut Vec<u8>) -> Result<(), ValueError> {
    match value {
        Value::Null => dst.push(TAG_NULL),
        Value::Boolean(b) => {
            dst.push(TAG_BOOL);
            dst.push(*b as u8);
        }
        Value::Integer(i) => {
            dst.push(TAG_NUMERIC);
            dst.push(0); // width marker: 32-bit
            dst.extend_from_slice(&i.to_be_bytes());
        }
        Value::BigInt(i) => {
            dst.push(TAG_NUMERIC);
            dst.push(1); // width marker: 64-bit
            dst.extend_from_slice(&i.to_be_bytes());
        }
        Value::Double(d) => {
            dst.push(TAG_DOUBLE);
            dst.extend_from_slice(&d.to_be_bytes());
        }
        Value::Timestamp(t) => {
            dst.push(TAG_TIMESTAMP);
            dst.extend_from_slice(&t.to_be_bytes());
        }
        Value::Text(s) => {
            dst.push(TAG_TEXT);
            dst.extend_from_slice(&(s.len() as u32).to_be_bytes());
            dst.extend_from_slice(s.as_bytes());
        }
        Value::Blob(b) => {
            dst.push(TAG_BLOB);
            dst.extend_from_slice(&(b.len() as u32).to_be_bytes());
            dst.extend_from_slice(b);
        }
    }
    Ok(())
}
