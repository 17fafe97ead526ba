//! Directory walk (§6): a single, non-recursive listing of `.roo` files, same scope as the
//! original's `Directory`/`File` abstraction in `main.cpp`.

use std::io;
use std::path::{Path, PathBuf};

/// Every `.roo` file directly inside `dir`, sorted by file name so a build is deterministic
/// regardless of what order the filesystem happens to hand entries back in.
pub fn find_roo_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("roo") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
