use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::{BoxError, DispatchError, Result};

/// Payload cipher selected by the frame's encryption flag.
pub trait Cipher: Send + Sync {
    fn name(&self) -> &str;

    fn decrypt(&self, data: Bytes) -> std::result::Result<Bytes, BoxError>;

    fn encrypt(&self, data: Bytes) -> std::result::Result<Bytes, BoxError>;
}

/// Passes payloads through unchanged. Registered under flag 0 by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Cipher for Identity {
    fn name(&self) -> &str {
        "identity"
    }

    fn decrypt(&self, data: Bytes) -> std::result::Result<Bytes, BoxError> {
        Ok(data)
    }

    fn encrypt(&self, data: Bytes) -> std::result::Result<Bytes, BoxError> {
        Ok(data)
    }
}

/// Immutable map from encryption flag to cipher.
#[derive(Clone)]
pub struct CipherRegistry {
    ciphers: BTreeMap<u64, Arc<dyn Cipher>>,
}

impl Default for CipherRegistry {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl CipherRegistry {
    /// Builder pre-populated with [`Identity`] under flag 0.
    pub fn builder() -> CipherRegistryBuilder {
        CipherRegistryBuilder::default()
    }

    pub fn get(&self, flag: u64) -> Option<&dyn Cipher> {
        self.ciphers.get(&flag).map(|c| c.as_ref())
    }

    pub fn flags(&self) -> impl Iterator<Item = u64> + '_ {
        self.ciphers.keys().copied()
    }

    pub fn decrypt(&self, flag: u64, data: Bytes) -> Result<Bytes> {
        let cipher = self.get(flag).ok_or(DispatchError::UnknownCipherFlag(flag))?;
        cipher
            .decrypt(data)
            .map_err(|source| DispatchError::Cipher { flag, source })
    }

    pub fn encrypt(&self, flag: u64, data: Bytes) -> Result<Bytes> {
        let cipher = self.get(flag).ok_or(DispatchError::UnknownCipherFlag(flag))?;
        cipher
            .encrypt(data)
            .map_err(|source| DispatchError::Cipher { flag, source })
    }
}

impl fmt::Debug for CipherRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.ciphers.iter().map(|(flag, c)| (flag, c.name())))
            .finish()
    }
}

/// Collects ciphers before freezing them into a [`CipherRegistry`].
pub struct CipherRegistryBuilder {
    ciphers: BTreeMap<u64, Arc<dyn Cipher>>,
}

impl Default for CipherRegistryBuilder {
    fn default() -> Self {
        let mut ciphers: BTreeMap<u64, Arc<dyn Cipher>> = BTreeMap::new();
        ciphers.insert(0, Arc::new(Identity));
        Self { ciphers }
    }
}

impl CipherRegistryBuilder {
    /// Register `cipher` under `flag`, replacing any previous entry
    /// (including the default identity cipher at 0).
    pub fn register(mut self, flag: u64, cipher: impl Cipher + 'static) -> Self {
        self.ciphers.insert(flag, Arc::new(cipher));
        self
    }

    pub fn build(self) -> CipherRegistry {
        CipherRegistry {
            ciphers: self.ciphers,
        }
    }
}
