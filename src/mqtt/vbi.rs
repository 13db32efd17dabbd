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
// MQTT Variable Byte Integer (VBI) encoding: 1-4 bytes, 7 data bits per byte,
// top bit set iff another byte follows.

use crate::error::VbiError;

/// Largest value representable in 4 VBI bytes.
pub const MAX: u32 = 0x0FFF_FFFF;

/// Encode `value` into its VBI byte sequence.
pub fn encode(mut value: u32) -> Result<Vec<u8>, VbiError> {
    if value > MAX {
        return Err(VbiError::Overflow);
    }
    let mut out = Vec::with_capacity(4);
    loop {
        let mut byte = (value % 128) as u8;
        value /= 128;
        if value > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
    Ok(out)
}

/// Number of bytes `encode(value)` would produce.
pub fn encoded_size(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        _ => 4,
    }
}

/// Decode a VBI from the start of `buf`. Returns the value and the number of
/// bytes consumed. A fifth continuation byte is `VbiError::Malformed`; a
/// buffer that ends before the terminating byte is `VbiError::Incomplete`.
pub fn decode(buf: &[u8]) -> Result<(u32, usize), VbiError> {
    let mut multiplier: u32 = 1;
    let mut value: u32 = 0;

    for (i, &b) in buf.iter().take(4).enumerate() {
        value = value.saturating_add(u32::from(b & 0x7F) * multiplier);
        if value > MAX {
            return Err(VbiError::Overflow);
        }
        if b & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        multiplier = multiplier.saturating_mul(128);
    }

    if buf.len() < 4 {
        Err(VbiError::Incomplete)
    } else {
        Err(VbiError::Malformed)
    }
}
