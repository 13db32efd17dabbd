/**
 * MIT License
 *
 * Copyright (c) 2025 Takatoshi Kondo
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */
// MQTT string encoding: a big-endian `u16` length prefix followed by UTF-8 bytes.

use crate::error::PacketError;

/// Append `s` to `out` as a length-prefixed MQTT string.
pub fn encode(s: &str, out: &mut Vec<u8>) -> Result<(), PacketError> {
    if s.len() > u16::MAX as usize {
        return Err(PacketError::StringTooLong);
    }
    out.extend_from_slice(&(s.len() as u16).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

/// Decode a length-prefixed string from the start of `buf`.
/// Returns the string and total bytes consumed (2 + length).
pub fn decode(buf: &[u8]) -> Result<(String, usize), PacketError> {
    if buf.len() < 2 {
        return Err(PacketError::Truncated("string length prefix"));
    }
    let len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
    if buf.len() < 2 + len {
        return Err(PacketError::Truncated("string body"));
    }
    let s = std::str::from_utf8(&buf[2..2 + len]).map_err(|_| PacketError::InvalidUtf8)?;
    Ok((s.to_string(), 2 + len))
}
