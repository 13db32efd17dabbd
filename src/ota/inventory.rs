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
// Scans the install prefix for already-installed wheels, giving the update
// channel's manifest diff something to diff against.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;

use crate::ota::wheel::{parse_headers_from_str, RecordEntry, WheelPackage};

pub const DEFAULT_PREFIX: &str = "/lib/";

fn is_dist_info_dir(name: &str) -> bool {
    name.ends_with(".dist-info") && name.rsplit_once(".dist-info").map(|(stem, _)| stem.contains('-')).unwrap_or(false)
}

/// Read `METADATA`+`RECORD` from a single `.dist-info` directory on disk.
fn read_package(dist_info_path: &Path) -> Option<WheelPackage> {
    let metadata_text = fs::read_to_string(dist_info_path.join("METADATA")).ok()?;
    let wheel_text = fs::read_to_string(dist_info_path.join("WHEEL")).unwrap_or_default();
    let record_text = fs::read_to_string(dist_info_path.join("RECORD")).ok()?;

    let metadata = parse_headers_from_str(&metadata_text);
    let wheel = parse_headers_from_str(&wheel_text);
    metadata.get("Name")?;
    metadata.get("Version")?;

    let mut record = IndexMap::new();
    for line in record_text.lines().filter(|l| !l.is_empty()) {
        if let Ok(entry) = RecordEntry::parse(line) {
            record.insert(entry.name.clone(), entry);
        }
    }

    Some(WheelPackage {
        dist_info_dir: dist_info_path.file_name()?.to_string_lossy().into_owned() + "/",
        metadata,
        wheel,
        record,
    })
}

/// Yield every installed wheel under `prefix` (default `/lib/`).
pub fn installed_packages(prefix: Option<&Path>) -> Vec<WheelPackage> {
    let prefix = prefix.unwrap_or_else(|| Path::new(DEFAULT_PREFIX));
    let Ok(read_dir) = fs::read_dir(prefix) else {
        return Vec::new();
    };
    read_dir
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_dir())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .map(is_dist_info_dir)
                .unwrap_or(false)
        })
        .filter_map(|entry| read_package(&entry.path()))
        .collect()
}

/// The first installed package named `name`, if any.
pub fn package_info(name: &str, prefix: Option<&Path>) -> Option<WheelPackage> {
    installed_packages(prefix)
        .into_iter()
        .find(|pkg| pkg.name() == Some(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_dist_info_directory_names() {
        assert!(is_dist_info_dir("foo-1.0.1.dist-info"));
        assert!(!is_dist_info_dir("nohyphen.dist-info"));
        assert!(!is_dist_info_dir("foo-1.0.1"));
    }

    #[test]
    fn missing_prefix_yields_empty_inventory() {
        assert!(installed_packages(Some(Path::new("/does/not/exist"))).is_empty());
    }
}
