//! File system storage for discovered databases.

use std::fmt::{Debug, Display, Formatter};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::{fs, io};

use structbuf::{Pack, StructBuf, Unpack};
use tracing::{debug, error, warn};

use crate::gatt::StoredAttribute;

/// 48-bit peer device address in little-endian byte order.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct PeerAddr([u8; 6]);

impl PeerAddr {
    /// Creates a peer address from little-endian bytes.
    #[inline]
    #[must_use]
    pub const fn from_le_bytes(v: [u8; 6]) -> Self {
        Self(v)
    }

    /// Returns the raw little-endian bytes.
    #[inline]
    #[must_use]
    pub const fn as_le_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl Debug for PeerAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let v = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            v[5], v[4], v[3], v[2], v[1], v[0]
        )
    }
}

impl Display for PeerAddr {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

/// Remote database cache stored in a file system directory, one file per
/// peer.
///
/// Each file is a version header, a record count, and that many fixed-size
/// [`StoredAttribute`] records, all little-endian. A file that fails any
/// validation check is treated as absent, which forces a fresh discovery.
#[derive(Clone, Debug)]
#[repr(transparent)]
pub struct CacheStore(PathBuf);

impl CacheStore {
    const NAME: &'static str = "gattc";
    const FILE_NAME_FMT: &'static str = "001122334455";
    const VERSION: u16 = 1;
    const HDR: usize = 4;

    /// Creates or opens a database cache store in the specified root
    /// directory.
    #[inline(always)]
    #[must_use]
    pub fn open(root: impl AsRef<Path>) -> Self {
        Self(root.as_ref().join(Self::NAME))
    }

    /// Creates or opens a database cache store in the current user's local
    /// data directory.
    ///
    /// # Panics
    ///
    /// Panics if it cannot determine the user directory.
    #[must_use]
    pub fn per_user(app: impl AsRef<Path>) -> Self {
        let dir = dirs::data_local_dir()
            .expect("user directory not available")
            .join(app.as_ref())
            .join(Self::NAME);
        Self(dir)
    }

    /// Saves peer database records to the file system.
    pub fn save(&self, peer: PeerAddr, attrs: &[StoredAttribute]) -> bool {
        let Ok(n) = u16::try_from(attrs.len()) else {
            error!("Too many attributes to cache for {peer}");
            return false;
        };
        let mut b = StructBuf::new(Self::HDR + attrs.len() * StoredAttribute::LEN);
        let mut p = b.append();
        p.u16(Self::VERSION).u16(n);
        for at in attrs {
            at.pack(&mut p);
        }
        if let Err(e) = fs::create_dir_all(&self.0) {
            warn!(
                "Failed to create database directory: {} ({e})",
                self.0.display()
            );
        }
        let path = self.path(peer);
        match fs::File::create(&path)
            .and_then(|mut f| f.write_all(b.as_ref()).and_then(|()| f.sync_data()))
        {
            Ok(()) => {
                debug!("Wrote: {}", path.display());
                true
            }
            Err(e) => {
                error!("Failed to write: {} ({e})", path.display());
                false
            }
        }
    }

    /// Loads peer database records from the file system. Returns [`None`] if
    /// no valid cache file exists for the peer.
    #[must_use]
    pub fn load(&self, peer: PeerAddr) -> Option<Vec<StoredAttribute>> {
        let path = self.path(peer);
        let b = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound) => return None,
            Err(e) => {
                error!("Failed to read: {} ({e})", path.display());
                return None;
            }
        };
        if b.len() < Self::HDR {
            error!("Truncated cache file: {}", path.display());
            return None;
        }
        let mut p = b.unpack();
        let version = p.u16();
        if version != Self::VERSION {
            warn!("Cache version {version} mismatch: {}", path.display());
            return None;
        }
        let n = usize::from(p.u16());
        if b.len() != Self::HDR + n * StoredAttribute::LEN {
            error!("Invalid cache file length: {}", path.display());
            return None;
        }
        let mut attrs = Vec::with_capacity(n);
        for rec in b[Self::HDR..].chunks_exact(StoredAttribute::LEN) {
            let Some(at) = StoredAttribute::unpack(rec) else {
                error!("Invalid cache record: {}", path.display());
                return None;
            };
            attrs.push(at);
        }
        Some(attrs)
    }

    /// Removes peer database records from the file system.
    pub fn remove(&self, peer: PeerAddr) {
        let path = self.path(peer);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound) => {}
            Err(e) => error!("Failed to remove: {} ({e})", path.display()),
        }
    }

    /// Removes all peer database records from the file system.
    pub fn clear(&self) {
        match fs::remove_dir_all(&self.0) {
            Ok(()) => {}
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound) => {}
            Err(e) => error!("Failed to remove: {} ({e})", self.0.display()),
        }
    }

    /// Returns the cache file path for the specified peer address.
    fn path(&self, peer: PeerAddr) -> PathBuf {
        let raw = peer.as_le_bytes();
        let mut buf = Cursor::new([0_u8; Self::FILE_NAME_FMT.len()]);
        write!(
            buf,
            "{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            raw[5], raw[4], raw[3], raw[2], raw[1], raw[0]
        )
        .expect("cache file name overflow");
        // SAFETY: `buf` contains a valid UTF-8 string
        (self.0).join(unsafe { std::str::from_utf8_unchecked(buf.get_ref()) })
    }
}

#[cfg(test)]
mod tests {
    use tempfile::{Builder, TempDir};

    use crate::att::Handle;
    use crate::gatt::CharProps;
    use crate::Uuid;

    use super::*;

    const PEER: PeerAddr = PeerAddr::from_le_bytes([0x55, 0x44, 0x33, 0x22, 0x11, 0x00]);

    fn store() -> (TempDir, CacheStore) {
        let tmp = (Builder::new().prefix("gatt-cache-test-").tempdir()).unwrap();
        let db = CacheStore(tmp.path().to_path_buf());
        (tmp, db)
    }

    fn sample() -> Vec<StoredAttribute> {
        let hdl = |h| Handle::new(h).unwrap();
        vec![
            StoredAttribute::Service {
                handle: hdl(0x0001),
                end_handle: hdl(0x0005),
                uuid: Uuid::new(0x180D).unwrap(),
                is_primary: true,
            },
            StoredAttribute::Characteristic {
                handle: hdl(0x0002),
                value_handle: hdl(0x0003),
                uuid: Uuid::new(0x2A37).unwrap(),
                properties: CharProps::NOTIFY,
            },
            StoredAttribute::Descriptor {
                handle: hdl(0x0004),
                uuid: Uuid::new(0x2902).unwrap(),
            },
        ]
    }

    #[test]
    fn save_load() {
        let (tmp, db) = store();
        let attrs = sample();
        assert!(db.save(PEER, &attrs));
        assert!(tmp.path().join(CacheStore::FILE_NAME_FMT).exists());
        assert_eq!(db.load(PEER).unwrap(), attrs);

        db.remove(PEER);
        assert_eq!(db.load(PEER), None);
    }

    #[test]
    fn empty_database() {
        let (_tmp, db) = store();
        assert!(db.save(PEER, &[]));
        assert_eq!(db.load(PEER).unwrap(), []);
    }

    #[test]
    fn invalid_file() {
        let (_tmp, db) = store();
        assert!(db.save(PEER, &sample()));
        let path = db.path(PEER);

        let good = fs::read(&path).unwrap();
        let mut bad = good.clone();
        bad[0] = 0xFF; // Version mismatch
        fs::write(&path, &bad).unwrap();
        assert_eq!(db.load(PEER), None);

        fs::write(&path, &good[..good.len() - 1]).unwrap();
        assert_eq!(db.load(PEER), None);

        fs::write(&path, &good[..2]).unwrap();
        assert_eq!(db.load(PEER), None);

        fs::write(&path, &good).unwrap();
        assert_eq!(db.load(PEER).unwrap(), sample());
    }

    #[test]
    fn clear() {
        let (_tmp, db) = store();
        assert!(db.save(PEER, &sample()));
        db.clear();
        assert_eq!(db.load(PEER), None);
    }
}
