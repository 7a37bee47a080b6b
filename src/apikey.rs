//! API key registry.
//!
//! Keys live in a JSON file (`APIKEYS` env) shaped `{ "key": "Display Name" }`.
//! The file is re-read whenever its mtime changes, so keys can be rotated
//! without a restart. A missing or unparsable file means no valid keys.

use parking_lot::RwLock;
use std::{collections::HashMap, fs, path::PathBuf, time::SystemTime};

#[derive(Default)]
pub struct ApiKeys {
    path: PathBuf,
    state: RwLock<KeyState>,
}

#[derive(Default)]
struct KeyState {
    mtime: Option<SystemTime>,
    keys: HashMap<String, String>,
}

impl ApiKeys {
    pub fn load(path: Option<&str>) -> Self {
        let path = path
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("app/data/api_keys.json"));
        let this = Self {
            path,
            state: RwLock::new(KeyState::default()),
        };
        this.refresh();
        this
    }

    fn refresh(&self) {
        let mtime = fs::metadata(&self.path).ok().and_then(|m| m.modified().ok());
        {
            let state = self.state.read();
            if mtime.is_some() && mtime == state.mtime {
                return;
            }
        }

        let keys = fs::read_to_string(&self.path)
            .ok()
            .and_then(|text| serde_json::from_str::<HashMap<String, String>>(&text).ok())
            .unwrap_or_default();

        let mut state = self.state.write();
        state.keys = keys;
        state.mtime = mtime;
    }

    /// Resolve a key to its display name; `None` means the key is invalid.
    pub fn name(&self, key: &str) -> Option<String> {
        self.refresh();
        self.state.read().keys.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_rejects_everything() {
        let keys = ApiKeys::load(Some("/nonexistent/api_keys.json"));
        assert_eq!(keys.name("any"), None);
    }

    #[test]
    fn resolves_names_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_keys.json");
        let mut f = fs::File::create(&path).unwrap();
        write!(f, r#"{{"api_abc":"Partner A"}}"#).unwrap();

        let keys = ApiKeys::load(path.to_str());
        assert_eq!(keys.name("api_abc").as_deref(), Some("Partner A"));
        assert_eq!(keys.name("api_nope"), None);
    }
}
