use std::{collections::BTreeMap, fs, path::PathBuf, sync::Mutex};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

use cloudtrial_core::{errors::Error, session::SessionStore, Result};

const CURRENT_VERSION: u32 = 1;
const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

type Entries = BTreeMap<String, String>;

/// Session keys persisted in a JSON file, optionally sealed with
/// ChaCha20-Poly1305.
///
/// Every mutation is a full read-modify-write of the file under one lock, so
/// batch writes go through [`SessionStore::set_many`].
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    key: Option<SessionKey>,
    lock: Mutex<()>,
}

/// Symmetric key taken from `CT_SESSION_KEY`.
#[derive(Clone, Copy)]
struct SessionKey([u8; KEY_LEN]);

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

impl SessionKey {
    /// Accepts base64 that decodes to 32 bytes, or the raw 32 ascii bytes.
    ///
    /// A 32-character alphanumeric value is also valid base64 (decoding to 24
    /// bytes), so the raw form is tried whenever base64 does not yield a key.
    fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if let Ok(decoded) = BASE64.decode(trimmed) {
            if let Ok(bytes) = <[u8; KEY_LEN]>::try_from(decoded.as_slice()) {
                return Ok(Self(bytes));
            }
        }
        <[u8; KEY_LEN]>::try_from(trimmed.as_bytes())
            .map(Self)
            .map_err(|_| {
                Error::SessionStore(
                    "CT_SESSION_KEY must be base64 of 32 bytes or a 32-byte ascii value".into(),
                )
            })
    }

    #[allow(deprecated)]
    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.0))
    }

    #[allow(deprecated)]
    fn seal(&self, plaintext: &[u8]) -> Result<SealedSession> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = self
            .cipher()
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| Error::SessionStore("Failed to encrypt session".into()))?;
        Ok(SealedSession {
            version: CURRENT_VERSION,
            nonce: BASE64.encode(nonce_bytes),
            ciphertext: BASE64.encode(ciphertext),
        })
    }

    #[allow(deprecated)]
    fn open(&self, sealed: &SealedSession) -> Result<Vec<u8>> {
        let nonce_bytes = BASE64
            .decode(&sealed.nonce)
            .map_err(|e| Error::SessionStore(format!("Failed to decode nonce: {e}")))?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(Error::SessionStore(
                "Session file nonce has the wrong length".into(),
            ));
        }
        let cipher_bytes = BASE64
            .decode(&sealed.ciphertext)
            .map_err(|e| Error::SessionStore(format!("Failed to decode ciphertext: {e}")))?;
        self.cipher()
            .decrypt(Nonce::from_slice(&nonce_bytes), cipher_bytes.as_ref())
            .map_err(|_| Error::SessionStore("Failed to decrypt session file".into()))
    }
}

/// On-disk layout. Sealed files are recognised by their `ciphertext` member.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SessionFile {
    Sealed(SealedSession),
    Plain(PlainSession),
}

#[derive(Serialize, Deserialize, Default)]
struct PlainSession {
    version: u32,
    #[serde(default)]
    entries: Entries,
}

#[derive(Serialize, Deserialize)]
struct SealedSession {
    version: u32,
    nonce: String,
    ciphertext: String,
}

impl FileSessionStore {
    pub fn new(path: PathBuf, encryption_key: Option<&str>) -> Result<Self> {
        let key = match encryption_key {
            Some(value) if !value.trim().is_empty() => Some(SessionKey::parse(value)?),
            _ => None,
        };

        Ok(Self {
            path,
            key,
            lock: Mutex::new(()),
        })
    }

    pub fn is_encrypted(&self) -> bool {
        self.key.is_some()
    }

    fn locked<T>(&self, op: impl FnOnce() -> Result<T>) -> Result<T> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| Error::SessionStore("Session file lock poisoned".into()))?;
        op()
    }

    fn update(&self, op: impl FnOnce(&mut Entries)) -> Result<()> {
        self.locked(|| {
            let mut entries = self.load()?;
            op(&mut entries);
            self.persist(entries)
        })
    }

    fn load(&self) -> Result<Entries> {
        if !self.path.exists() {
            return Ok(Entries::new());
        }
        let raw = fs::read(&self.path)?;
        if raw.is_empty() {
            return Ok(Entries::new());
        }

        match serde_json::from_slice::<SessionFile>(&raw)? {
            SessionFile::Plain(plain) => Ok(plain.entries),
            SessionFile::Sealed(sealed) => {
                let key = self.key.as_ref().ok_or_else(|| {
                    Error::SessionStore(
                        "CT_SESSION_KEY must be set to decrypt the session file".into(),
                    )
                })?;
                let plain: PlainSession = serde_json::from_slice(&key.open(&sealed)?)?;
                Ok(plain.entries)
            }
        }
    }

    fn persist(&self, entries: Entries) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let plain = PlainSession {
            version: CURRENT_VERSION,
            entries,
        };
        let file = match &self.key {
            Some(key) => SessionFile::Sealed(key.seal(&serde_json::to_vec(&plain)?)?),
            None => SessionFile::Plain(plain),
        };
        fs::write(&self.path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.locked(|| self.load())?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn set_many(&self, batch: &[(String, String)]) -> Result<()> {
        self.update(|entries| {
            entries.extend(batch.iter().cloned());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}
