//! On-disk layout of a data directory
//!
//! ```text
//! <dir>/keys.idx          collection names, '|' separated
//! <dir>/<name>.dmp        one serialized table per collection
//! ```
//!
//! Every file is written atomically via temp + fsync + rename.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use simdb_core::SimResult;
use tracing::{debug, warn};

/// Collection list file name
pub const MANIFEST_FILE: &str = "keys.idx";

/// Extension of per-collection dump files
pub const DUMP_EXTENSION: &str = "dmp";

const NAME_SEPARATOR: &str = "|";

/// Handle on a data directory
#[derive(Debug, Clone)]
pub struct Manifest {
    dir: PathBuf,
}

impl Manifest {
    /// Wrap `dir`; nothing is created until the first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Manifest { dir: dir.into() }
    }

    /// Data directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the collection list
    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    /// Path of a collection's dump file
    pub fn dump_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, DUMP_EXTENSION))
    }

    /// Collection names listed in the manifest
    ///
    /// A missing or empty manifest yields an empty list (with a warning).
    pub fn read_names(&self) -> SimResult<Vec<String>> {
        let path = self.manifest_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(target: "simdb::manifest", path = %path.display(), "No manifest found, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let names: Vec<String> = content
            .trim()
            .split(NAME_SEPARATOR)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(String::from)
            .collect();
        if names.is_empty() {
            warn!(target: "simdb::manifest", path = %path.display(), "Manifest lists no collections");
        }
        Ok(names)
    }

    /// Replace the manifest with `names`
    pub fn write_names<S: AsRef<str>>(&self, names: &[S]) -> SimResult<()> {
        let joined = names
            .iter()
            .map(|name| name.as_ref())
            .collect::<Vec<&str>>()
            .join(NAME_SEPARATOR);
        write_atomic(&self.manifest_path(), joined.as_bytes())?;
        debug!(target: "simdb::manifest", collections = names.len(), "Manifest written");
        Ok(())
    }

    /// Write a collection's serialized table
    pub fn write_dump(&self, name: &str, bytes: &[u8]) -> SimResult<()> {
        write_atomic(&self.dump_path(name), bytes)?;
        debug!(target: "simdb::manifest", collection = name, bytes = bytes.len(), "Dump written");
        Ok(())
    }

    /// Read a collection's serialized table, `None` if no dump exists
    pub fn read_dump(&self, name: &str) -> SimResult<Option<Vec<u8>>> {
        match fs::read(self.dump_path(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)
}
