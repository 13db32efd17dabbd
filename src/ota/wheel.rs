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
// Wheel package metadata: the `.dist-info/` directory inside a ZIP archive,
// its ordered METADATA/WHEEL headers, and its RECORD manifest.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use indexmap::IndexMap;
use sha2::{Digest, Sha256};

use crate::error::WheelError;
use crate::ota::zip::ZipArchive;

/// Matches the `name-version(-buildtag)?.dist-info/` pattern without a
/// regex dependency: the marker `.dist-info/` must appear after at least
/// one `-` (separating name from version), and any segment following a
/// second `-` is treated as an optional build tag starting with a digit
/// or `P<digit>`.
fn dist_info_prefix(entry_name: &str) -> Option<String> {
    let marker = ".dist-info/";
    let marker_at = entry_name.find(marker)?;
    let stem = &entry_name[..marker_at];
    if stem.contains('/') || !stem.contains('-') {
        return None;
    }
    Some(entry_name[..marker_at + marker.len()].to_string())
}

/// One line of a RECORD file: `name,algo=b64urlhash,size`. Hash and size are
/// both optional (empty fields are valid, matching generated-file entries).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEntry {
    pub name: String,
    pub hash: Option<Vec<u8>>,
    pub size: Option<u64>,
}

impl RecordEntry {
    pub fn parse(line: &str) -> Result<Self, WheelError> {
        let mut parts = line.rsplitn(3, ',');
        let size_field = parts.next().ok_or_else(|| WheelError::MalformedRecord(line.to_string()))?;
        let hash_field = parts.next().ok_or_else(|| WheelError::MalformedRecord(line.to_string()))?;
        let name = parts
            .next()
            .ok_or_else(|| WheelError::MalformedRecord(line.to_string()))?
            .to_string();

        let size = if size_field.is_empty() {
            None
        } else {
            Some(
                size_field
                    .parse()
                    .map_err(|_| WheelError::MalformedRecord(line.to_string()))?,
            )
        };

        let hash = if hash_field.is_empty() {
            None
        } else {
            let encoded = hash_field
                .strip_prefix("sha256=")
                .ok_or_else(|| WheelError::MalformedRecord(line.to_string()))?;
            Some(
                URL_SAFE_NO_PAD
                    .decode(encoded)
                    .map_err(|_| WheelError::MalformedRecord(line.to_string()))?,
            )
        };

        Ok(RecordEntry { name, hash, size })
    }
}

/// Ordered METADATA/WHEEL header lines (`Key: Value`, first colon only).
pub type HeaderMap = IndexMap<String, String>;

fn parse_headers(text: &str) -> HeaderMap {
    let mut headers = IndexMap::new();
    for line in text.lines() {
        if let Some((key, value)) = line.split_once(':') {
            headers.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    headers
}

/// Public alias used by the on-disk inventory scan, which parses the same
/// `Key: Value` header format read from loose files rather than a ZIP member.
pub fn parse_headers_from_str(text: &str) -> HeaderMap {
    parse_headers(text)
}

#[derive(Debug, Clone)]
pub struct WheelPackage {
    pub dist_info_dir: String,
    pub metadata: HeaderMap,
    pub wheel: HeaderMap,
    pub record: IndexMap<String, RecordEntry>,
}

impl WheelPackage {
    pub fn name(&self) -> Option<&str> {
        self.metadata.get("Name").map(String::as_str)
    }

    pub fn version(&self) -> Option<&str> {
        self.metadata.get("Version").map(String::as_str)
    }

    pub fn tag(&self) -> Option<&str> {
        self.wheel.get("Tag").map(String::as_str)
    }

    /// Locate `.dist-info/`, parse METADATA/WHEEL/RECORD from a just-opened
    /// archive. Does not verify member contents; use [`Self::verified_read`]
    /// for that.
    pub fn from_archive(archive: &ZipArchive) -> Result<Self, WheelError> {
        let dist_info_dir = archive
            .entries()
            .find_map(|entry| dist_info_prefix(&entry.name))
            .ok_or(WheelError::NoDistInfo)?;

        let metadata_text = String::from_utf8_lossy(
            &archive.read(&format!("{dist_info_dir}METADATA"))?,
        )
        .into_owned();
        let wheel_text =
            String::from_utf8_lossy(&archive.read(&format!("{dist_info_dir}WHEEL"))?).into_owned();
        let record_text =
            String::from_utf8_lossy(&archive.read(&format!("{dist_info_dir}RECORD"))?).into_owned();

        let metadata = parse_headers(&metadata_text);
        let wheel = parse_headers(&wheel_text);

        let mut record = IndexMap::new();
        for line in record_text.lines().filter(|l| !l.is_empty()) {
            let entry = RecordEntry::parse(line)?;
            record.insert(entry.name.clone(), entry);
        }

        if !metadata.contains_key("Name") {
            return Err(WheelError::MissingMetadata("Name"));
        }
        if !metadata.contains_key("Version") {
            return Err(WheelError::MissingMetadata("Version"));
        }

        Ok(WheelPackage {
            dist_info_dir,
            metadata,
            wheel,
            record,
        })
    }

    /// Read a member by name, verifying its RECORD size and SHA-256 (when
    /// recorded) before returning the bytes.
    pub fn verified_read(&self, archive: &ZipArchive, name: &str) -> Result<Vec<u8>, WheelError> {
        let bytes = archive.read(name)?;
        if let Some(entry) = self.record.get(name) {
            if let Some(expected_size) = entry.size {
                if bytes.len() as u64 != expected_size {
                    return Err(WheelError::VerificationFailed {
                        name: name.to_string(),
                        reason: format!("size {} != recorded {}", bytes.len(), expected_size),
                    });
                }
            }
            if let Some(expected_hash) = &entry.hash {
                let actual = Sha256::digest(&bytes);
                if actual.as_slice() != expected_hash.as_slice() {
                    return Err(WheelError::VerificationFailed {
                        name: name.to_string(),
                        reason: "sha-256 mismatch".to_string(),
                    });
                }
            }
        }
        Ok(bytes)
    }
}
