//! Local credentials file (§6.3): read by the SDK when `init()` receives no
//! explicit `api_key`; written only by the CLI after a successful poll.

use std::io::Write as _;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::SdkError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub api_key: String,
    pub dsn: String,
    pub app_id: Uuid,
    pub app_name: String,
}

/// `~/.config/logsentry/credentials.json` (or platform equivalent via
/// `dirs::config_dir`).
pub fn credentials_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("logsentry").join("credentials.json"))
}

pub fn read_credentials() -> Option<Credentials> {
    let path = credentials_path()?;
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

/// Write credentials with `0600` permissions, creating the parent directory
/// if needed. Overwrites any existing file (§6.3: "written only by the CLI
/// after a successful poll").
pub fn write_credentials(creds: &Credentials) -> Result<(), SdkError> {
    let path = credentials_path()
        .ok_or_else(|| SdkError::Credentials("could not resolve config directory".into()))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| SdkError::Credentials(format!("create_dir_all: {e}")))?;
    }

    let json = serde_json::to_string_pretty(creds)
        .map_err(|e| SdkError::Credentials(format!("serialize: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&path)
            .map_err(|e| SdkError::Credentials(format!("open: {e}")))?;
        file.write_all(json.as_bytes())
            .map_err(|e| SdkError::Credentials(format!("write: {e}")))?;
    }
    #[cfg(not(unix))]
    {
        std::fs::write(&path, json.as_bytes())
            .map_err(|e| SdkError::Credentials(format!("write: {e}")))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_round_trip_through_json() {
        let creds = Credentials {
            api_key: "sk_test".into(),
            dsn: "http://localhost:3210".into(),
            app_id: Uuid::new_v4(),
            app_name: "demo".into(),
        };
        let json = serde_json::to_string(&creds).unwrap();
        let parsed: Credentials = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.api_key, creds.api_key);
        assert_eq!(parsed.app_id, creds.app_id);
    }
}
