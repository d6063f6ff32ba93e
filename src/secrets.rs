use crate::config::state_dir;
use std::path::{Path, PathBuf};

const KEY_FILE: &str = "watson.key";

fn credentials_dir_for(state_dir: &Path) -> PathBuf {
    state_dir.join("credentials")
}

fn key_file_path_for(state_dir: &Path) -> PathBuf {
    credentials_dir_for(state_dir).join(KEY_FILE)
}

pub fn write_key_to(state_dir: &Path, api_key: &str) -> anyhow::Result<PathBuf> {
    let api_key = api_key.trim();
    if api_key.is_empty() {
        anyhow::bail!("API key cannot be empty");
    }

    let dir = credentials_dir_for(state_dir);
    std::fs::create_dir_all(&dir)
        .map_err(|e| anyhow::anyhow!("failed to create {}: {e}", dir.display()))?;
    restrict_permissions(&dir, 0o700)?;

    let path = key_file_path_for(state_dir);
    std::fs::write(&path, api_key)
        .map_err(|e| anyhow::anyhow!("failed to write {}: {e}", path.display()))?;
    restrict_permissions(&path, 0o600)?;
    Ok(path)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path, mode: u32) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| anyhow::anyhow!("failed to chmod {mode:o} {}: {e}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path, _mode: u32) -> anyhow::Result<()> {
    Ok(())
}

pub fn read_key_from(state_dir: &Path) -> Option<String> {
    let value = std::fs::read_to_string(key_file_path_for(state_dir)).ok()?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Store the Watson API key in ~/.watson-middleware/credentials/watson.key.
pub fn store_api_key(api_key: &str) -> anyhow::Result<PathBuf> {
    write_key_to(&state_dir(), api_key)
}

/// Load the Watson API key from ~/.watson-middleware/credentials/watson.key.
pub fn load_api_key() -> Option<String> {
    read_key_from(&state_dir())
}

#[cfg(test)]
mod tests {
    use super::{read_key_from, write_key_to};
    use std::path::PathBuf;

    fn tmp_dir() -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "watson-middleware-secrets-test-{}",
            uuid::Uuid::new_v4()
        ));
        std::fs::create_dir_all(&path).expect("create temp dir");
        path
    }

    #[test]
    fn writes_and_reads_key() {
        let dir = tmp_dir();
        let path = write_key_to(&dir, "  iam-key-123\n").expect("write key");
        assert!(path.exists());
        assert_eq!(read_key_from(&dir).as_deref(), Some("iam-key-123"));
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn rejects_blank_key() {
        let dir = tmp_dir();
        let err = write_key_to(&dir, "   ").expect_err("should fail");
        assert!(err.to_string().contains("cannot be empty"));
        assert!(read_key_from(&dir).is_none());
        std::fs::remove_dir_all(dir).ok();
    }
}
