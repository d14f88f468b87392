use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::unwarp::{LensUnwarper, UnwarpKey, UnwarpMap};

const MAGIC: [u8; 4] = *b"TWUM";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 8 + 4 + 4 + 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    source_width: u32,
    source_height: u32,
    padding: u32,
    k_bits: u64,
}

impl From<&UnwarpKey> for CacheKey {
    fn from(key: &UnwarpKey) -> Self {
        Self {
            source_width: key.source_width,
            source_height: key.source_height,
            padding: key.padding,
            k_bits: key.k.to_bits(),
        }
    }
}

/// Shared store of unwarp maps, optionally persisted to a directory.
///
/// Disk failures are logged and fall back to rebuilding; they never change
/// the map that is returned.
#[derive(Debug, Default)]
pub struct UnwarpMapCache {
    dir: Option<PathBuf>,
    maps: Mutex<HashMap<CacheKey, Arc<UnwarpMap>>>,
}

impl UnwarpMapCache {
    /// In-memory cache only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache backed by files in `dir`.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            maps: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Number of maps held in memory.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Arc<UnwarpMap>>> {
        self.maps.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Map for `key`, from memory, then disk, then freshly built.
    pub fn get_or_build(&self, key: UnwarpKey) -> Arc<UnwarpMap> {
        let cache_key = CacheKey::from(&key);
        if let Some(map) = self.lock().get(&cache_key) {
            return Arc::clone(map);
        }

        let map = match self.load_from_disk(&key) {
            Some(map) => map,
            None => {
                let map = LensUnwarper::new(key.k).build_map(
                    key.source_width,
                    key.source_height,
                    key.padding,
                );
                self.store_to_disk(&map);
                map
            }
        };

        let map = Arc::new(map);
        self.lock()
            .entry(cache_key)
            .or_insert_with(|| Arc::clone(&map))
            .clone()
    }

    fn file_path(&self, key: &UnwarpKey) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        Some(dir.join(format!(
            "unwarp_map_{}_{}.bin",
            key.target_height(),
            key.target_width()
        )))
    }

    fn load_from_disk(&self, key: &UnwarpKey) -> Option<UnwarpMap> {
        let path = self.file_path(key)?;
        if !path.exists() {
            return None;
        }
        match read_map(&path) {
            Ok(map) if map.key() == key => {
                tracing::debug!(path = %path.display(), "loaded unwarp map");
                Some(map)
            }
            Ok(_) => {
                tracing::debug!(path = %path.display(), "stale unwarp map; rebuilding");
                None
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "failed to read unwarp map: {}", e);
                None
            }
        }
    }

    fn store_to_disk(&self, map: &UnwarpMap) {
        let Some(path) = self.file_path(map.key()) else {
            return;
        };
        if let Err(e) = write_map(&path, map) {
            tracing::warn!(path = %path.display(), "failed to write unwarp map: {}", e);
        }
    }
}

/// Header fields are little-endian; entries follow in native byte order,
/// since cache directories are machine-local.
fn write_map(path: &Path, map: &UnwarpMap) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let key = map.key();
    let mut out = std::io::BufWriter::new(std::fs::File::create(path)?);
    out.write_all(&MAGIC)?;
    out.write_all(&FORMAT_VERSION.to_le_bytes())?;
    out.write_all(&key.k.to_le_bytes())?;
    out.write_all(&key.source_width.to_le_bytes())?;
    out.write_all(&key.source_height.to_le_bytes())?;
    out.write_all(&key.padding.to_le_bytes())?;
    out.write_all(bytemuck::cast_slice(map.entries()))?;
    out.flush()
}

fn invalid(msg: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, msg.to_string())
}

fn read_map(path: &Path) -> std::io::Result<UnwarpMap> {
    let mut bytes = Vec::new();
    std::fs::File::open(path)?.read_to_end(&mut bytes)?;
    if bytes.len() < HEADER_LEN {
        return Err(invalid("truncated header"));
    }
    let (header, body) = bytes.split_at(HEADER_LEN);
    if header[0..4] != MAGIC {
        return Err(invalid("bad magic"));
    }
    let u32_at = |off: usize| {
        u32::from_le_bytes([header[off], header[off + 1], header[off + 2], header[off + 3]])
    };
    if u32_at(4) != FORMAT_VERSION {
        return Err(invalid("unsupported version"));
    }
    let mut k_bytes = [0u8; 8];
    k_bytes.copy_from_slice(&header[8..16]);
    let key = UnwarpKey {
        k: f64::from_le_bytes(k_bytes),
        source_width: u32_at(16),
        source_height: u32_at(20),
        padding: u32_at(24),
    };
    if body.len() % 4 != 0 {
        return Err(invalid("truncated entries"));
    }
    // Copy into a u32 buffer; the file body carries no alignment guarantee.
    let mut entries = vec![0u32; body.len() / 4];
    bytemuck::cast_slice_mut::<u32, u8>(&mut entries).copy_from_slice(body);
    UnwarpMap::from_parts(key, entries).ok_or_else(|| invalid("entry count mismatch"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(k: f64) -> UnwarpKey {
        UnwarpKey {
            k,
            source_width: 40,
            source_height: 30,
            padding: 3,
        }
    }

    #[test]
    fn memory_cache_shares_maps() {
        let cache = UnwarpMapCache::new();
        let a = cache.get_or_build(key(0.1322595));
        let b = cache.get_or_build(key(0.1322595));
        assert!(Arc::ptr_eq(&a, &b));
        cache.get_or_build(key(0.0));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn disk_cache_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let built = UnwarpMapCache::with_dir(dir.path()).get_or_build(key(0.1322595));
        let file = dir.path().join("unwarp_map_36_46.bin");
        assert!(file.exists());

        let loaded = read_map(&file).unwrap();
        assert_eq!(&loaded, built.as_ref());

        let fresh = UnwarpMapCache::with_dir(dir.path()).get_or_build(key(0.1322595));
        assert_eq!(fresh.as_ref(), built.as_ref());
    }

    #[test]
    fn mismatched_header_is_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        UnwarpMapCache::with_dir(dir.path()).get_or_build(key(0.1322595));
        // Same target size, different k: the stored file must not be reused.
        let other = UnwarpMapCache::with_dir(dir.path()).get_or_build(key(0.0));
        assert_eq!(other.key().k, 0.0);
        assert_eq!(other.source_of(3, 3), Some((0, 0)));
    }

    #[test]
    fn partial_entries_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let built = UnwarpMapCache::with_dir(dir.path()).get_or_build(key(0.0));
        let file = dir.path().join("unwarp_map_36_46.bin");
        let bytes = std::fs::read(&file).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + 4 * built.entries().len());

        std::fs::write(&file, &bytes[..bytes.len() - 2]).unwrap();
        assert_eq!(
            read_map(&file).unwrap_err().kind(),
            std::io::ErrorKind::InvalidData
        );
        std::fs::write(&file, &bytes[..bytes.len() - 4]).unwrap();
        assert!(read_map(&file).is_err());

        let rebuilt = UnwarpMapCache::with_dir(dir.path()).get_or_build(key(0.0));
        assert_eq!(rebuilt.as_ref(), built.as_ref());
    }

    #[test]
    fn corrupt_file_falls_back_to_building() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("unwarp_map_36_46.bin"), b"garbage").unwrap();
        let map = UnwarpMapCache::with_dir(dir.path()).get_or_build(key(0.0));
        assert_eq!(map.target_width(), 46);
        assert!(read_map(&dir.path().join("unwarp_map_36_46.bin")).is_ok());
    }
}
