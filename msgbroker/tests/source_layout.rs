//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Checks on the layout of the crate's own source files.

use std::fs;
use std::path::{Path, PathBuf};

const HEADER_END: &str = "// limitations under the License.\n//\n";

fn rust_sources(dir: &Path, found: &mut Vec<PathBuf>) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            rust_sources(&path, found);
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            found.push(path);
        }
    }
}

#[test]
fn test_license_header_followed_by_one_blank_line() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let mut files = Vec::new();
    rust_sources(&root.join("src"), &mut files);
    rust_sources(&root.join("tests"), &mut files);
    assert!(!files.is_empty());

    for file in files {
        let text = fs::read_to_string(&file).unwrap();
        let end = text
            .find(HEADER_END)
            .unwrap_or_else(|| panic!("{} has no license header", file.display()))
            + HEADER_END.len();
        let rest = &text[end..];
        assert!(
            rest.starts_with('\n') && !rest[1..].starts_with('\n'),
            "{} needs exactly one blank line after the license header",
            file.display()
        );
    }
}
