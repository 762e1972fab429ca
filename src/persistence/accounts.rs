use crate::entities::container::ContainerError;
use crate::entities::player::AccountDetails;
use crate::world::error::{MapError, StorageError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const MIN_USERNAME_LEN: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Bad user/password.")]
    BadCredentials,
    #[error("Username already taken.")]
    DuplicateUser,
    #[error("Username must be at least {MIN_USERNAME_LEN} characters.")]
    UsernameTooShort,
    #[error("Username may only contain letters, digits and underscores.")]
    InvalidUsername,
    #[error("That player is already logged in.")]
    AlreadyOnline,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error(transparent)]
    Map(#[from] MapError),
}

/// base64 of the SHA-1 digest; this is what account files store.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(password.as_bytes());
    STANDARD.encode(hasher.finalize())
}

pub fn validate_username(username: &str) -> Result<(), AuthError> {
    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(AuthError::UsernameTooShort);
    }
    if !username
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
    {
        return Err(AuthError::InvalidUsername);
    }
    Ok(())
}

/// One YAML file per account under `players/`. The in-memory variant backs
/// tests and throwaway worlds.
#[derive(Debug)]
pub struct PlayerStore {
    dir: Option<PathBuf>,
    memory: HashMap<String, AccountDetails>,
}

impl PlayerStore {
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            memory: HashMap::new(),
        }
    }

    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StorageError::Write {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir: Some(dir),
            memory: HashMap::new(),
        })
    }

    fn path(dir: &Path, username: &str) -> PathBuf {
        dir.join(format!("{}.yaml", username.to_ascii_lowercase()))
    }

    pub fn exists(&self, username: &str) -> bool {
        match self.dir.as_ref() {
            Some(dir) => Self::path(dir, username).exists(),
            None => self.memory.contains_key(&username.to_ascii_lowercase()),
        }
    }

    /// True before the first account is ever registered.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        let Some(dir) = self.dir.as_ref() else {
            return Ok(self.memory.is_empty());
        };
        let mut entries = fs::read_dir(dir).map_err(|source| StorageError::Read {
            path: dir.clone(),
            source,
        })?;
        Ok(!entries.any(|entry| {
            entry
                .map(|entry| entry.path().extension().is_some_and(|ext| ext == "yaml"))
                .unwrap_or(false)
        }))
    }

    pub fn load(&self, username: &str) -> Result<Option<AccountDetails>, StorageError> {
        let Some(dir) = self.dir.as_ref() else {
            return Ok(self.memory.get(&username.to_ascii_lowercase()).cloned());
        };
        let path = Self::path(dir, username);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StorageError::Read { path, source }),
        };
        serde_yaml::from_str(&data)
            .map(Some)
            .map_err(|err| StorageError::corrupt(&path, err))
    }

    pub fn save(&mut self, account: &AccountDetails) -> Result<(), StorageError> {
        let Some(dir) = self.dir.as_ref() else {
            self.memory
                .insert(account.username.to_ascii_lowercase(), account.clone());
            return Ok(());
        };
        let path = Self::path(dir, &account.username);
        let data = serde_yaml::to_string(account)?;
        fs::write(&path, data).map_err(|source| StorageError::Write { path, source })
    }

    /// Loads the account and checks its password.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<AccountDetails, AuthError> {
        let account = self.load(username)?.ok_or(AuthError::BadCredentials)?;
        if account.password_hash != hash_password(password) {
            return Err(AuthError::BadCredentials);
        }
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::container::ContainerId;
    use crate::world::coord::Coord;

    fn account(name: &str, password: &str) -> AccountDetails {
        AccountDetails {
            username: name.to_string(),
            password_hash: hash_password(password),
            inventory_id: ContainerId(1),
            equipment_id: ContainerId(2),
            is_admin: false,
            location: Coord::new(3, 4, 0),
        }
    }

    #[test]
    fn hash_is_base64_sha1() {
        assert_eq!(hash_password("abc"), "qZk+NkcGgWq6PiVxeFDCbJzQ2J0=");
    }

    #[test]
    fn username_rules() {
        assert!(matches!(
            validate_username("ab"),
            Err(AuthError::UsernameTooShort)
        ));
        assert!(matches!(
            validate_username("../etc"),
            Err(AuthError::InvalidUsername)
        ));
        assert!(validate_username("sir_tile9").is_ok());
    }

    #[test]
    fn file_store_round_trips_and_authenticates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = PlayerStore::open(dir.path()).expect("open");
        assert!(store.is_empty().expect("empty"));
        store.save(&account("Anna", "secret")).expect("save");
        assert!(!store.is_empty().expect("empty"));
        assert!(store.exists("anna"));

        let loaded = store.authenticate("anna", "secret").expect("login");
        assert_eq!(loaded.location, Coord::new(3, 4, 0));
        assert!(matches!(
            store.authenticate("anna", "wrong"),
            Err(AuthError::BadCredentials)
        ));
        assert!(matches!(
            store.authenticate("bob", "secret"),
            Err(AuthError::BadCredentials)
        ));
    }

    #[test]
    fn corrupt_account_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("anna.yaml"), "username: [").expect("write");
        let store = PlayerStore::open(dir.path()).expect("open");
        assert!(matches!(
            store.load("anna"),
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[test]
    fn memory_store_is_case_insensitive() {
        let mut store = PlayerStore::in_memory();
        store.save(&account("Anna", "pw")).expect("save");
        assert!(store.exists("ANNA"));
        assert!(store.load("anna").expect("load").is_some());
    }
}
