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
// The entries published on a channel's manifest topic: what should be
// installed, and where it comes from.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    Wheel,
    Src,
}

/// One line item of a channel manifest. `wheel` entries name a registry-style
/// package to fetch by name+version; `src` entries name an absolute install
/// path the payload should be written to verbatim.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ManifestEntry {
    Wheel {
        name: String,
        version: String,
        pkg_sha256: String,
    },
    Src {
        path: String,
        pkg_sha256: String,
    },
}

impl ManifestEntry {
    pub fn kind(&self) -> PackageKind {
        match self {
            ManifestEntry::Wheel { .. } => PackageKind::Wheel,
            ManifestEntry::Src { .. } => PackageKind::Src,
        }
    }

    pub fn pkg_sha256(&self) -> &str {
        match self {
            ManifestEntry::Wheel { pkg_sha256, .. } => pkg_sha256,
            ManifestEntry::Src { pkg_sha256, .. } => pkg_sha256,
        }
    }

    /// The key used to look up a matching local installation: the wheel's
    /// package name, or the destination path for a raw source drop.
    pub fn identity(&self) -> &str {
        match self {
            ManifestEntry::Wheel { name, .. } => name,
            ManifestEntry::Src { path, .. } => path,
        }
    }
}

pub fn parse_manifest(bytes: &[u8]) -> Result<Vec<ManifestEntry>, serde_json::Error> {
    serde_json::from_slice(bytes)
}
