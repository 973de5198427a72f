//! On-disk format of the user sheet.
//!
//! ```text
//! id,nombre,email,7
//! 1,Ana,ana@x.com
//! 3,Cal,cal@x.com
//! ```
//!
//! The first row is reserved. Its optional fourth cell records the highest id
//! ever handed out, so deleting the newest row does not let its id come back.
//! Every following row is exactly `(id, name, email)`.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::domain::User;
use crate::error::{StoreError, StoreResult};

pub const HEADER: [&str; 3] = ["id", "nombre", "email"];

/// Full in-memory copy of the sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sheet {
    pub high_water: u64,
    pub rows: Vec<User>,
}

impl Sheet {
    /// Highest id that has ever been stored, whether or not its row survives.
    pub fn last_id(&self) -> u64 {
        self.rows
            .iter()
            .map(|user| user.id)
            .max()
            .unwrap_or(0)
            .max(self.high_water)
    }

    pub fn next_id(&self) -> Option<u64> {
        self.last_id().checked_add(1)
    }

    pub fn position(&self, id: u64) -> Option<usize> {
        self.rows.iter().position(|user| user.id == id)
    }
}

/// Advisory lock on the sidecar `<file>.lock`, released on drop.
pub struct SheetLock {
    file: File,
}

impl Drop for SheetLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[derive(Clone, Copy, Debug)]
pub enum LockMode {
    Shared,
    Exclusive,
}

pub fn lock(path: &Path, mode: LockMode) -> StoreResult<SheetLock> {
    let lock_path = sidecar(path, "lock");
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|err| StoreError::unavailable(&lock_path, err))?;
    let locked = match mode {
        LockMode::Shared => file.lock_shared(),
        LockMode::Exclusive => file.lock_exclusive(),
    };
    locked.map_err(|err| StoreError::unavailable(&lock_path, err))?;
    debug!(path = %lock_path.display(), ?mode, "Sheet locked");
    Ok(SheetLock { file })
}

pub fn load(path: &Path) -> StoreResult<Sheet> {
    let file = File::open(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => StoreError::unavailable(path, "file not found"),
        _ => StoreError::unavailable(path, err),
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);
    let mut records = reader.records();

    let header = match records.next() {
        Some(record) => record.map_err(|err| StoreError::unavailable(path, err))?,
        None => return Err(StoreError::unavailable(path, "missing header row")),
    };
    let high_water = header
        .get(HEADER.len())
        .and_then(|cell| cell.trim().parse().ok())
        .unwrap_or(0);

    let mut rows = Vec::new();
    let mut seen = HashSet::new();
    for (index, record) in records.enumerate() {
        let line = index + 2;
        let record = record.map_err(|err| StoreError::unavailable(path, err))?;
        if record.len() != HEADER.len() {
            return Err(StoreError::unavailable(
                path,
                format!("row {line}: expected 3 fields, found {}", record.len()),
            ));
        }
        let id: u64 = record[0].trim().parse().map_err(|_| {
            StoreError::unavailable(path, format!("row {line}: invalid id {:?}", &record[0]))
        })?;
        if !seen.insert(id) {
            return Err(StoreError::unavailable(
                path,
                format!("row {line}: duplicate id {id}"),
            ));
        }
        rows.push(User::new(id, &record[1], &record[2]));
    }

    Ok(Sheet { high_water, rows })
}

/// Replace the sheet on disk. The table is written to `<file>.tmp`, synced,
/// then renamed over the original, so readers see the old or the new file.
/// The parent directory is synced afterwards so the rename itself is durable.
pub fn save(path: &Path, sheet: &Sheet) -> StoreResult<()> {
    let tmp = sidecar(path, "tmp");
    let result = write_table(&tmp, sheet).and_then(|()| {
        fs::rename(&tmp, path).map_err(|err| StoreError::unavailable(path, err))
    });
    let result = result.and_then(|()| sync_parent(path));
    if result.is_err() {
        if let Err(err) = fs::remove_file(&tmp) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(path = %tmp.display(), error = %err, "Failed to remove temp sheet");
            }
        }
    }
    result
}

fn write_table(tmp: &Path, sheet: &Sheet) -> StoreResult<()> {
    let file = File::create(tmp).map_err(|err| StoreError::unavailable(tmp, err))?;
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(file);

    let last_id = sheet.last_id().to_string();
    writer
        .write_record([HEADER[0], HEADER[1], HEADER[2], last_id.as_str()])
        .map_err(|err| StoreError::unavailable(tmp, err))?;
    for user in &sheet.rows {
        let id = user.id.to_string();
        writer
            .write_record([id.as_str(), user.name.as_str(), user.email.as_str()])
            .map_err(|err| StoreError::unavailable(tmp, err))?;
    }

    let file = writer
        .into_inner()
        .map_err(|err| StoreError::unavailable(tmp, err))?;
    file.sync_all()
        .map_err(|err| StoreError::unavailable(tmp, err))
}

/// Create an empty sheet. An existing file is only replaced when `force` is set.
pub fn init(path: &Path, force: bool) -> StoreResult<()> {
    let _lock = lock(path, LockMode::Exclusive)?;
    if path.exists() && !force {
        return Err(StoreError::Conflict(format!(
            "{} already exists",
            path.display()
        )));
    }
    save(path, &Sheet::default())
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> StoreResult<()> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    File::open(parent)
        .and_then(|dir| dir.sync_all())
        .map_err(|err| StoreError::unavailable(parent, err))
}

// Directories cannot be opened as files here; the rename is left to the OS.
#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> StoreResult<()> {
    Ok(())
}

fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}
