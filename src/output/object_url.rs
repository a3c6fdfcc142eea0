use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use uuid::Uuid;

/// Revocable reference to a registered [`Blob`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    const SCHEME: &'static str = "blob:multiply/";

    fn generate() -> Self {
        Self(format!("{}{}", Self::SCHEME, Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable bytes tagged with a MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    bytes: Arc<[u8]>,
    mime: String,
}

impl Blob {
    pub fn new(bytes: impl Into<Arc<[u8]>>, mime: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime: mime.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Registry handing out object URLs for blobs until they are revoked.
///
/// Clones share the same registry.
#[derive(Debug, Clone, Default)]
pub struct ObjectUrlRegistry {
    entries: Arc<Mutex<HashMap<ObjectUrl, Blob>>>,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a blob and return a fresh URL for it
    pub fn create(&self, blob: Blob) -> ObjectUrl {
        let url = ObjectUrl::generate();
        self.lock().insert(url.clone(), blob);
        url
    }

    /// Look up a blob; `None` once revoked
    pub fn resolve(&self, url: &ObjectUrl) -> Option<Blob> {
        self.lock().get(url).cloned()
    }

    /// Revoke a URL. Returns `false` if it was unknown or already revoked.
    pub fn revoke(&self, url: &ObjectUrl) -> bool {
        self.lock().remove(url).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ObjectUrl, Blob>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
