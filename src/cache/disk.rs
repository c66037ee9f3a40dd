use super::{CacheLayer, ChainLoader, LoadPolicy};
use crate::error::Result;
use crate::sync::lock;
use fs2::FileExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

/// Compute the xxh64 checksum of a slot payload, hex-encoded.
fn payload_hash(payload: &[u8]) -> String {
    format!("{:016x}", xxhash_rust::xxh64::xxh64(payload, 0))
}

/// Persists the last loaded value in a named slot file.
///
/// Freshness comes from the slot file's modification time, so a value
/// written by a previous process is served until it is `max_age` old.
///
/// Slot layout: a 16-character hex xxh64 checksum, a newline, then the
/// zstd-compressed JSON value. Writes go to `<slot>.json.zst.tmp` and are
/// renamed into place once synced; a crash mid-write leaves the previous
/// slot intact. A slot that fails its checksum or does not decode is
/// treated as a miss.
pub struct DiskCache<T> {
    path: PathBuf,
    lock_path: PathBuf,
    max_age: Duration,
    guard: Mutex<()>,
    _value: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for DiskCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskCache")
            .field("path", &self.path)
            .field("max_age", &self.max_age)
            .finish()
    }
}

impl<T> DiskCache<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Open the slot `slot` under `dir`, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>, slot: &str, max_age: Duration) -> io::Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        Ok(DiskCache {
            path: dir.join(format!("{slot}.json.zst")),
            lock_path: dir.join(format!("{slot}.lock")),
            max_age,
            guard: Mutex::new(()),
            _value: PhantomData,
        })
    }

    /// Returns the path of the slot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("zst.tmp")
    }

    fn lock_slot(&self) -> io::Result<File> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)?;
        file.lock_exclusive()?;
        Ok(file)
    }

    fn age(&self) -> io::Result<Option<Duration>> {
        let modified = match fs::metadata(&self.path) {
            Ok(metadata) => metadata.modified()?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(Some(
            SystemTime::now()
                .duration_since(modified)
                .unwrap_or(Duration::ZERO),
        ))
    }

    fn read_slot(&self) -> Result<Option<T>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let Some(newline) = bytes.iter().position(|&b| b == b'\n') else {
            log::warn!("cache slot {} has no header, ignoring", self.path.display());
            return Ok(None);
        };
        let (header, payload) = (&bytes[..newline], &bytes[newline + 1..]);
        if header != payload_hash(payload).as_bytes() {
            log::warn!(
                "cache slot {} checksum mismatch, ignoring",
                self.path.display()
            );
            return Ok(None);
        }

        let json = match zstd::decode_all(payload) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("cache slot {} failed to decompress: {e}", self.path.display());
                return Ok(None);
            }
        };
        match serde_json::from_slice(&json) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                log::warn!("cache slot {} failed to decode: {e}", self.path.display());
                Ok(None)
            }
        }
    }

    fn write_slot(&self, value: &T) -> Result<()> {
        let json = serde_json::to_vec(value)?;
        let payload = zstd::encode_all(json.as_slice(), 3)?;
        let tmp_path = self.tmp_path();

        let mut file = File::create(&tmp_path)?;
        writeln!(file, "{}", payload_hash(&payload))?;
        file.write_all(&payload)?;
        file.sync_data()?;
        drop(file);

        fs::rename(&tmp_path, &self.path)?;
        log::debug!(
            "wrote cache slot {} ({} bytes compressed)",
            self.path.display(),
            payload.len()
        );
        Ok(())
    }

    fn remove_if_exists(path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl<T> CacheLayer<T> for DiskCache<T>
where
    T: Serialize + DeserializeOwned,
{
    fn load(&self, loader: ChainLoader<'_, T>, policy: LoadPolicy) -> Result<T> {
        let _guard = lock(&self.guard);
        let _slot_lock = self.lock_slot()?;

        if policy == LoadPolicy::PreferCached {
            match self.age()? {
                Some(age) if age < self.max_age => {
                    if let Some(value) = self.read_slot()? {
                        log::debug!("disk cache hit: {} (age {age:?})", self.path.display());
                        return Ok(value);
                    }
                }
                Some(age) => log::debug!("disk cache slot expired (age {age:?})"),
                None => log::debug!("disk cache slot missing: {}", self.path.display()),
            }
        }

        let value = loader(policy)?;
        self.write_slot(&value)?;
        Ok(value)
    }

    fn clear(&self) -> Result<()> {
        let _guard = lock(&self.guard);
        let _slot_lock = self.lock_slot()?;
        Self::remove_if_exists(&self.path)?;
        Self::remove_if_exists(&self.tmp_path())?;
        Ok(())
    }
}
