//! Per-user credential records.
//!
//! A credential is the `name,password` pair both the client and the replicas
//! derive the shared secret from. Lookups ignore the case of the name.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

use gavel_proto::Password;

use crate::error::CredentialError;

/// A stored credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// User name as registered.
    pub name: String,
    /// Plaintext password.
    pub password: Password,
}

impl Credential {
    /// Build a credential.
    pub fn new(name: impl Into<String>, password: Password) -> Self {
        Self { name: name.into(), password }
    }

    /// Render as a `name,password` record.
    pub fn to_record(&self) -> String {
        format!("{},{}", self.name, self.password.expose())
    }

    /// Parse a `name,password` record, splitting on the first comma.
    pub fn parse_record(name: &str, line: &str) -> Result<Self, CredentialError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (stored_name, password) =
            line.split_once(',').ok_or_else(|| CredentialError::Malformed { name: name.to_string() })?;
        Ok(Self::new(stored_name, Password::new(password)))
    }
}

/// Storage for credentials.
pub trait CredentialStore: Send + Sync {
    /// Credential for `name`, if one was stored.
    fn load(&self, name: &str) -> Result<Option<Credential>, CredentialError>;

    /// Store `credential`, replacing any previous one for the same name.
    fn store(&self, credential: &Credential) -> Result<(), CredentialError>;
}

/// Credentials as files: `<dir>/<NAME>.txt` holding one `name,password` line.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    /// Store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for `name`.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, CredentialError> {
        if name.is_empty() || name.contains(['/', '\\', '\0']) || name.starts_with('.') {
            return Err(CredentialError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(format!("{}.txt", name.to_uppercase())))
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self, name: &str) -> Result<Option<Credential>, CredentialError> {
        let path = self.path_for(name)?;
        match fs::read_to_string(&path) {
            Ok(content) => {
                let line = content.lines().next().unwrap_or_default();
                Credential::parse_record(name, line).map(Some)
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CredentialError::Io { name: name.to_string(), source }),
        }
    }

    fn store(&self, credential: &Credential) -> Result<(), CredentialError> {
        let path = self.path_for(&credential.name)?;
        fs::write(&path, credential.to_record())
            .map_err(|source| CredentialError::Io { name: credential.name.clone(), source })?;
        tracing::debug!(user = %credential.name, path = %path.display(), "stored credential");
        Ok(())
    }
}

/// In-memory credentials, keyed by upper-cased name.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: RwLock<HashMap<String, Credential>>,
}

impl MemoryCredentialStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored credentials.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self, name: &str) -> Result<Option<Credential>, CredentialError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(&name.to_uppercase()).cloned())
    }

    fn store(&self, credential: &Credential) -> Result<(), CredentialError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(credential.name.to_uppercase(), credential.clone());
        Ok(())
    }
}
