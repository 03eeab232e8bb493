use crate::error::{BlacklistError, Result};
use bitvec::{bitvec, order::Lsb0, vec::BitVec};
use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};
use tracing::{debug, warn};

/// The in-memory bit array owned by the membership filter.
pub type BitArray = BitVec<usize, Lsb0>;

pub const PARAMS_FILE: &str = "params.txt";
pub const BLOOM_FILE: &str = "bloom.txt";
pub const BLACKLIST_FILE: &str = "blacklist.txt";

// Durable side of the membership filter
pub trait BitStorage {
    /// Recreates the durable bit array as `size` zero bits
    fn reset_bits(&mut self, size: usize) -> Result<()>;
    /// Loads the persisted bits, `None` when nothing was persisted yet
    fn load_bits(&self) -> Result<Option<BitArray>>;
    /// Persists the whole array, merged with whatever is already stored
    fn store_bits(&mut self, bits: &BitArray) -> Result<()>;
}

// Durable side of the exact-match blacklist
pub trait UrlStorage {
    /// Recreates the durable blacklist as empty
    fn reset_urls(&mut self) -> Result<()>;
    /// Returns every stored line, duplicates and malformed lines included
    fn load_urls(&self) -> Result<Vec<String>>;
    /// Records one more occurrence of `url`
    fn append_url(&mut self, url: &str) -> Result<()>;
    /// Drops every stored occurrence of `url`
    fn remove_url(&mut self, url: &str) -> Result<()>;
}

/// A place holding the configuration record plus both durable structures.
pub trait StorageBackend {
    type Bits: BitStorage;
    type Urls: UrlStorage;

    fn load_record(&self) -> Result<Option<String>>;
    fn store_record(&mut self, record: &str) -> Result<()>;
    /// Handles on both durable structures. They share the backend's
    /// location, so the record can still be written afterwards.
    fn parts(&self) -> (Self::Bits, Self::Urls);
}

impl<T: BitStorage + ?Sized> BitStorage for Box<T> {
    fn reset_bits(&mut self, size: usize) -> Result<()> {
        (**self).reset_bits(size)
    }

    fn load_bits(&self) -> Result<Option<BitArray>> {
        (**self).load_bits()
    }

    fn store_bits(&mut self, bits: &BitArray) -> Result<()> {
        (**self).store_bits(bits)
    }
}

impl<T: UrlStorage + ?Sized> UrlStorage for Box<T> {
    fn reset_urls(&mut self) -> Result<()> {
        (**self).reset_urls()
    }

    fn load_urls(&self) -> Result<Vec<String>> {
        (**self).load_urls()
    }

    fn append_url(&mut self, url: &str) -> Result<()> {
        (**self).append_url(url)
    }

    fn remove_url(&mut self, url: &str) -> Result<()> {
        (**self).remove_url(url)
    }
}

/// Renders bits as the one-line `'0'`/`'1'` durable format.
pub fn bits_to_line(bits: &BitArray) -> String {
    bits.iter().map(|bit| if *bit { '1' } else { '0' }).collect()
}

/// Parses the one-line durable format. Surrounding whitespace is ignored.
pub fn parse_bit_line(line: &str) -> Result<BitArray> {
    let line = line.trim();
    let mut bits = BitArray::with_capacity(line.len());
    for (index, ch) in line.chars().enumerate() {
        match ch {
            '0' => bits.push(false),
            '1' => bits.push(true),
            other => {
                return Err(BlacklistError::MalformedState(format!(
                    "unexpected character {other:?} at bit {index}"
                )));
            }
        }
    }
    Ok(bits)
}

/// ORs `src` into `dst`, growing `dst` when `src` is longer.
pub(crate) fn merge_bits(dst: &mut BitArray, src: &BitArray) {
    if src.len() > dst.len() {
        dst.resize(src.len(), false);
    }
    for index in src.iter_ones() {
        dst.set(index, true);
    }
}

// In-memory storage implementation
//
// Clones share the same state, so a clone kept aside before handing the
// storage to an engine can later reopen it like a restarted process would.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    state: Arc<Mutex<MemoryState>>,
    fail_writes: Arc<AtomicBool>,
}

#[derive(Default)]
struct MemoryState {
    record: Option<String>,
    bits: Option<BitArray>,
    urls: Vec<String>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with a storage error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Raw stored lines of the blacklist, in write order.
    pub fn stored_urls(&self) -> Vec<String> {
        self.with_state(|state| Ok(state.urls.clone()))
            .unwrap_or_default()
    }

    /// The stored bit array in its durable text form.
    pub fn stored_bit_line(&self) -> Option<String> {
        self.with_state(|state| Ok(state.bits.as_ref().map(bits_to_line)))
            .unwrap_or_default()
    }

    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut MemoryState) -> Result<T>,
    ) -> Result<T> {
        let mut state = self.state.lock().map_err(|_| {
            BlacklistError::StorageError("in-memory state poisoned".into())
        })?;
        f(&mut state)
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BlacklistError::StorageError(
                "in-memory storage rejected write".into(),
            ));
        }
        Ok(())
    }
}

impl BitStorage for InMemoryStorage {
    fn reset_bits(&mut self, size: usize) -> Result<()> {
        self.check_writable()?;
        self.with_state(|state| {
            state.bits = Some(bitvec![usize, Lsb0; 0; size]);
            Ok(())
        })
    }

    fn load_bits(&self) -> Result<Option<BitArray>> {
        self.with_state(|state| Ok(state.bits.clone()))
    }

    fn store_bits(&mut self, bits: &BitArray) -> Result<()> {
        self.check_writable()?;
        self.with_state(|state| {
            let mut merged = bits.clone();
            if let Some(stored) = &state.bits {
                merge_bits(&mut merged, stored);
            }
            state.bits = Some(merged);
            Ok(())
        })
    }
}

impl UrlStorage for InMemoryStorage {
    fn reset_urls(&mut self) -> Result<()> {
        self.check_writable()?;
        self.with_state(|state| {
            state.urls.clear();
            Ok(())
        })
    }

    fn load_urls(&self) -> Result<Vec<String>> {
        self.with_state(|state| Ok(state.urls.clone()))
    }

    fn append_url(&mut self, url: &str) -> Result<()> {
        self.check_writable()?;
        self.with_state(|state| {
            state.urls.push(url.to_string());
            Ok(())
        })
    }

    fn remove_url(&mut self, url: &str) -> Result<()> {
        self.check_writable()?;
        self.with_state(|state| {
            state.urls.retain(|stored| stored != url);
            Ok(())
        })
    }
}

impl StorageBackend for InMemoryStorage {
    type Bits = InMemoryStorage;
    type Urls = InMemoryStorage;

    fn load_record(&self) -> Result<Option<String>> {
        self.with_state(|state| Ok(state.record.clone()))
    }

    fn store_record(&mut self, record: &str) -> Result<()> {
        self.check_writable()?;
        self.with_state(|state| {
            state.record = Some(record.to_string());
            Ok(())
        })
    }

    fn parts(&self) -> (Self::Bits, Self::Urls) {
        (self.clone(), self.clone())
    }
}

/// Plain-text files inside one data directory: `params.txt` holds the
/// configuration record, `bloom.txt` the bit line, `blacklist.txt` one URL
/// per line.
#[derive(Clone, Debug)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Opens `dir`, creating it when missing.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| BlacklistError::storage(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn params_path(&self) -> PathBuf {
        self.dir.join(PARAMS_FILE)
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(BlacklistError::storage(path, e)),
    }
}

fn write_all(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(|e| BlacklistError::storage(path, e))
}

impl StorageBackend for FileStorage {
    type Bits = BloomFile;
    type Urls = BlacklistFile;

    fn load_record(&self) -> Result<Option<String>> {
        Ok(read_optional(&self.params_path())?
            .map(|content| content.lines().next().unwrap_or("").to_string()))
    }

    fn store_record(&mut self, record: &str) -> Result<()> {
        write_all(&self.params_path(), record)
    }

    fn parts(&self) -> (Self::Bits, Self::Urls) {
        (
            BloomFile {
                path: self.dir.join(BLOOM_FILE),
            },
            BlacklistFile {
                path: self.dir.join(BLACKLIST_FILE),
            },
        )
    }
}

/// `bloom.txt`: a single line of `'0'`/`'1'` characters.
#[derive(Clone, Debug)]
pub struct BloomFile {
    path: PathBuf,
}

impl BloomFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BitStorage for BloomFile {
    fn reset_bits(&mut self, size: usize) -> Result<()> {
        write_all(&self.path, &"0".repeat(size))
    }

    fn load_bits(&self) -> Result<Option<BitArray>> {
        match read_optional(&self.path)? {
            Some(content) if !content.trim().is_empty() => {
                parse_bit_line(&content).map(Some)
            }
            Some(_) => Ok(None),
            None => {
                warn!(path = %self.path.display(), "Bit array file missing");
                Ok(None)
            }
        }
    }

    fn store_bits(&mut self, bits: &BitArray) -> Result<()> {
        // Read-modify-write so bits already on disk are never dropped.
        let mut merged = bits.clone();
        if let Some(stored) = self.load_bits()? {
            merge_bits(&mut merged, &stored);
        }
        write_all(&self.path, &bits_to_line(&merged))
    }
}

/// `blacklist.txt`: one URL per line, append-only except for deletes.
#[derive(Clone, Debug)]
pub struct BlacklistFile {
    path: PathBuf,
}

impl BlacklistFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl UrlStorage for BlacklistFile {
    fn reset_urls(&mut self) -> Result<()> {
        write_all(&self.path, "")
    }

    fn load_urls(&self) -> Result<Vec<String>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BlacklistError::storage(&self.path, e)),
        };

        // Decoded line by line: one corrupt line must not hide the others.
        Ok(bytes
            .split(|byte| *byte == b'\n')
            .enumerate()
            .filter(|(_, line)| !line.is_empty())
            .map(|(index, line)| {
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                String::from_utf8(line.to_vec()).unwrap_or_else(|e| {
                    warn!(path = %self.path.display(), line = index + 1, error = %e, "Blacklist line is not UTF-8");
                    String::from_utf8_lossy(line).into_owned()
                })
            })
            .collect())
    }

    fn append_url(&mut self, url: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| BlacklistError::storage(&self.path, e))?;
        writeln!(file, "{url}").map_err(|e| BlacklistError::storage(&self.path, e))
    }

    fn remove_url(&mut self, url: &str) -> Result<()> {
        let lines = self.load_urls()?;
        let before = lines.len();
        let kept: Vec<String> =
            lines.into_iter().filter(|line| line != url).collect();
        debug!(url, removed = before - kept.len(), "Rewriting blacklist file");

        let mut content = kept.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        write_all(&self.path, &content)
    }
}
