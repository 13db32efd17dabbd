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
// A minimal single-disk ZIP reader: just enough to walk a central
// directory and extract members, with no support for archive comments,
// multi-disk spanning, or writing.

use indexmap::IndexMap;

use crate::error::ZipError;

const EOCD_SIZE: usize = 22;
const EOCD_SIGNATURE: &[u8; 4] = b"PK\x05\x06";
const CENTRAL_DIR_SIGNATURE: &[u8; 4] = b"PK\x01\x02";
const CENTRAL_DIR_HEADER_SIZE: usize = 46;
const LOCAL_HEADER_SIZE: usize = 30;

const METHOD_STORE: u16 = 0;
const METHOD_DEFLATE: u16 = 8;

#[derive(Debug, Clone)]
pub struct ZipEntry {
    pub name: String,
    pub method: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    offset: u32,
}

/// An in-memory ZIP archive. Wheel and source packages arrive as a single
/// MQTT payload, so the whole archive is held in memory rather than
/// streamed from a file handle.
pub struct ZipArchive {
    data: Vec<u8>,
    entries: IndexMap<String, ZipEntry>,
}

impl ZipArchive {
    pub fn open(data: Vec<u8>) -> Result<Self, ZipError> {
        if data.len() < EOCD_SIZE {
            return Err(ZipError::BadEocd);
        }
        let eocd_start = data.len() - EOCD_SIZE;
        let eocd = &data[eocd_start..];
        if &eocd[0..4] != EOCD_SIGNATURE {
            return Err(ZipError::BadEocd);
        }
        let disk_num = u16::from_le_bytes([eocd[4], eocd[5]]);
        let disk_with_cd = u16::from_le_bytes([eocd[6], eocd[7]]);
        if disk_num != 0 || disk_with_cd != 0 {
            return Err(ZipError::MultiDiskUnsupported);
        }
        let total_entries = u16::from_le_bytes([eocd[10], eocd[11]]) as usize;
        let cd_offset = u32::from_le_bytes([eocd[16], eocd[17], eocd[18], eocd[19]]) as usize;

        let mut entries = IndexMap::with_capacity(total_entries);
        let mut cursor = cd_offset;
        for i in 0..total_entries {
            if cursor + CENTRAL_DIR_HEADER_SIZE > data.len() {
                return Err(ZipError::BadCentralDirectoryHeader(i));
            }
            let header = &data[cursor..cursor + CENTRAL_DIR_HEADER_SIZE];
            if &header[0..4] != CENTRAL_DIR_SIGNATURE {
                return Err(ZipError::BadCentralDirectoryHeader(i));
            }
            let method = u16::from_le_bytes([header[10], header[11]]);
            let crc32 = u32::from_le_bytes([header[16], header[17], header[18], header[19]]);
            let compressed_size =
                u32::from_le_bytes([header[20], header[21], header[22], header[23]]);
            let uncompressed_size =
                u32::from_le_bytes([header[24], header[25], header[26], header[27]]);
            let filename_len = u16::from_le_bytes([header[28], header[29]]) as usize;
            let extra_len = u16::from_le_bytes([header[30], header[31]]) as usize;
            let comment_len = u16::from_le_bytes([header[32], header[33]]) as usize;
            let local_header_offset =
                u32::from_le_bytes([header[42], header[43], header[44], header[45]]);

            let name_start = cursor + CENTRAL_DIR_HEADER_SIZE;
            let name_end = name_start + filename_len;
            if name_end > data.len() {
                return Err(ZipError::BadCentralDirectoryHeader(i));
            }
            let name = String::from_utf8_lossy(&data[name_start..name_end]).into_owned();

            entries.insert(
                name.clone(),
                ZipEntry {
                    name,
                    method,
                    crc32,
                    compressed_size,
                    uncompressed_size,
                    offset: local_header_offset,
                },
            );

            cursor = name_end + extra_len + comment_len;
        }

        Ok(ZipArchive { data, entries })
    }

    pub fn entries(&self) -> impl Iterator<Item = &ZipEntry> {
        self.entries.values()
    }

    pub fn entry(&self, name: &str) -> Option<&ZipEntry> {
        self.entries.get(name)
    }

    /// Seek to `entry.offset`, skip the local file header, decompress the
    /// member, and validate its CRC-32.
    pub fn read(&self, name: &str) -> Result<Vec<u8>, ZipError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| ZipError::NoSuchMember(name.to_string()))?;

        let header_start = entry.offset as usize;
        if header_start + LOCAL_HEADER_SIZE > self.data.len() {
            return Err(ZipError::NoSuchMember(name.to_string()));
        }
        let local = &self.data[header_start..header_start + LOCAL_HEADER_SIZE];
        let filename_len = u16::from_le_bytes([local[26], local[27]]) as usize;
        let extra_len = u16::from_le_bytes([local[28], local[29]]) as usize;

        let data_start = header_start + LOCAL_HEADER_SIZE + filename_len + extra_len;
        let data_end = data_start + entry.compressed_size as usize;
        if data_end > self.data.len() {
            return Err(ZipError::NoSuchMember(name.to_string()));
        }
        let compressed = &self.data[data_start..data_end];

        let uncompressed = match entry.method {
            METHOD_STORE => compressed.to_vec(),
            METHOD_DEFLATE => {
                let mut decompressor = flate2::Decompress::new(false);
                let mut out = Vec::with_capacity(entry.uncompressed_size as usize);
                decompressor
                    .decompress_vec(compressed, &mut out, flate2::FlushDecompress::Finish)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
                out
            }
            other => return Err(ZipError::UnsupportedCompression(other, name.to_string())),
        };

        if crc32fast::hash(&uncompressed) != entry.crc32 {
            return Err(ZipError::Crc32Mismatch(name.to_string()));
        }

        Ok(uncompressed)
    }
}
