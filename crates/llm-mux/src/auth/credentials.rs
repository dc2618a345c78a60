//! Credential bundle persistence.
//!
//! Bundles are written to a deterministic per-principal path; the write is
//! atomic from the perspective of concurrent readers (write-to-temp +
//! rename).

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::errors::AuthError;
use super::Auth;
use crate::config::Paths;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persists `auth`, returning the path it was written to.
    async fn save(&self, auth: &Auth) -> Result<PathBuf, AuthError>;

    async fn load(&self, file_name: &str) -> Result<Option<Auth>, AuthError>;

    async fn list(&self) -> Result<Vec<Auth>, AuthError>;
}

/// Stores one JSON file per credential bundle under a single directory.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn default_dir() -> PathBuf {
        Paths::in_config_dir("auth")
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn save(&self, auth: &Auth) -> Result<PathBuf, AuthError> {
        let dir = self.dir.clone();
        let auth = auth.clone();

        let path = tokio::task::spawn_blocking(move || {
            use std::io::Write as _;

            std::fs::create_dir_all(&dir)?;
            let path = dir.join(&auth.file_name);

            let json = serde_json::to_vec_pretty(&auth).map_err(std::io::Error::other)?;

            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(&json)?;
            tmp.flush()?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o600))?;
            }
            tmp.persist(&path).map_err(|e| e.error)?;

            Ok::<_, std::io::Error>(path)
        })
        .await
        .map_err(|e| std::io::Error::other(format!("persist task failed: {e}")))??;

        Ok(path)
    }

    async fn load(&self, file_name: &str) -> Result<Option<Auth>, AuthError> {
        let path = self.path_for(file_name);
        let contents = match tokio::fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let auth = serde_json::from_slice(&contents).map_err(std::io::Error::other)?;
        Ok(Some(auth))
    }

    async fn list(&self) -> Result<Vec<Auth>, AuthError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut auths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let contents = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<Auth>(&contents) {
                Ok(auth) => auths.push(auth),
                Err(e) => tracing::warn!("skipping unreadable credential {}: {e}", path.display()),
            }
        }
        Ok(auths)
    }
}

/// Path shown to the user: the home-directory prefix is replaced with `~`.
pub fn display_path(path: &Path) -> String {
    match etcetera::home_dir() {
        Ok(home) => display_path_with_home(path, &home),
        Err(_) => path.display().to_string(),
    }
}

fn display_path_with_home(path: &Path, home: &Path) -> String {
    match path.strip_prefix(home) {
        Ok(stripped) => format!("~/{}", stripped.display()),
        Err(_) => path.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{ClaudeTokenStorage, TokenStorage};
    use chrono::Utc;
    use std::collections::HashMap;

    fn sample_auth(email: &str) -> Auth {
        let file_name = format!("claude-{email}.json");
        Auth {
            id: file_name.clone(),
            provider: "claude".to_string(),
            file_name,
            storage: TokenStorage::Claude(ClaudeTokenStorage {
                access_token: "at".to_string(),
                refresh_token: "rt".to_string(),
                expires_at: Utc::now(),
                email: email.to_string(),
                api_key: None,
            }),
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().to_path_buf());

        let auth = sample_auth("dev@example.com");
        let path = store.save(&auth).await.unwrap();
        assert_eq!(path, dir.path().join("claude-dev@example.com.json"));

        let loaded = store
            .load("claude-dev@example.com.json")
            .await
            .unwrap()
            .expect("credential exists");
        assert_eq!(loaded.principal(), "dev@example.com");
    }

    #[tokio::test]
    async fn save_overwrites_existing_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().to_path_buf());

        let auth = sample_auth("dev@example.com");
        store.save(&auth).await.unwrap();

        let mut updated = auth.clone();
        if let TokenStorage::Claude(storage) = &mut updated.storage {
            storage.access_token = "at2".to_string();
        }
        store.save(&updated).await.unwrap();

        let loaded = store
            .load(&auth.file_name)
            .await
            .unwrap()
            .expect("credential exists");
        match loaded.storage {
            TokenStorage::Claude(storage) => assert_eq!(storage.access_token, "at2"),
            _ => panic!("wrong storage variant"),
        }
        // The rename leaves no stray temp files behind.
        let count = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn load_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().to_path_buf());
        assert!(store.load("claude-nobody.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_skips_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().to_path_buf());

        store.save(&sample_auth("a@example.com")).await.unwrap();
        store.save(&sample_auth("b@example.com")).await.unwrap();
        std::fs::write(dir.path().join("broken.json"), "not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut principals: Vec<String> = store
            .list()
            .await
            .unwrap()
            .iter()
            .map(|auth| auth.principal().to_string())
            .collect();
        principals.sort();
        assert_eq!(principals, vec!["a@example.com", "b@example.com"]);
    }

    #[test]
    fn display_path_rewrites_home_prefix() {
        let home = Path::new("/home/dev");
        assert_eq!(
            display_path_with_home(Path::new("/home/dev/.config/llm-mux/auth/x.json"), home),
            "~/.config/llm-mux/auth/x.json"
        );
        assert_eq!(
            display_path_with_home(Path::new("/etc/llm-mux/x.json"), home),
            "/etc/llm-mux/x.json"
        );
    }
}
