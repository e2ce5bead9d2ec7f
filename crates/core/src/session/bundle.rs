//! Import, export and clearing of the full set of session keys.
//!
//! A bundle is a JSON object mapping session keys to their stored values. It
//! is how a session captured in one browser is carried into the store.

use log::info;
use serde_json::{Map, Value};

use super::SessionStore;
use crate::constants::SESSION_BUNDLE_KEYS;
use crate::errors::{Result, ValidationError};

/// Write every member of a JSON object bundle into `store`.
///
/// String values are stored as-is; any other value is stored JSON-encoded.
/// Every value is encoded before anything is written, and the entries reach
/// the store in a single [`SessionStore::set_many`] call, so a malformed
/// bundle leaves the store untouched. Returns the number of keys written.
pub fn import_bundle(store: &dyn SessionStore, raw: &str) -> Result<usize> {
    let value: Value = serde_json::from_str(raw.trim()).map_err(|e| {
        ValidationError::InvalidInput(format!("Session bundle is not valid JSON: {}", e))
    })?;
    let Value::Object(entries) = value else {
        return Err(
            ValidationError::InvalidInput("Session bundle must be a JSON object".into()).into(),
        );
    };
    if entries.is_empty() {
        return Err(ValidationError::MissingField("session keys".into()).into());
    }

    let batch = entries
        .into_iter()
        .map(|(key, value)| -> Result<(String, String)> {
            let stored = match value {
                Value::String(s) => s,
                other => serde_json::to_string(&other)?,
            };
            Ok((key, stored))
        })
        .collect::<Result<Vec<_>>>()?;
    store.set_many(&batch)?;

    info!("[Session] Imported {} session keys", batch.len());
    Ok(batch.len())
}

/// Export the known session keys present in `store`, in canonical order.
pub fn export_bundle(store: &dyn SessionStore) -> Result<String> {
    let mut out = Map::new();
    for key in SESSION_BUNDLE_KEYS {
        if let Some(value) = store.get(key)? {
            out.insert(key.to_string(), Value::String(value));
        }
    }
    Ok(serde_json::to_string_pretty(&Value::Object(out))?)
}

/// Remove every known session key from `store`.
pub fn clear_bundle(store: &dyn SessionStore) -> Result<()> {
    for key in SESSION_BUNDLE_KEYS {
        store.remove(key)?;
    }
    info!("[Session] Cleared session keys");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SESSION_RECORD_KEY;
    use crate::errors::{Error, Result};
    use crate::session::{MemorySessionStore, SessionCredentials};
    use std::sync::Mutex;

    #[test]
    fn test_import_writes_strings_and_encodes_objects() {
        let store = MemorySessionStore::new();
        let written = import_bundle(
            &store,
            r#"{
                "UGPHONE-Token": "abc",
                "UGPHONE-MQTT": {"access_token": "tok", "login_id": "me"}
            }"#,
        )
        .unwrap();

        assert_eq!(written, 2);
        assert_eq!(store.get("UGPHONE-Token").unwrap().as_deref(), Some("abc"));
        assert_eq!(
            SessionCredentials::read(&store),
            SessionCredentials::new("tok", "me")
        );
    }

    /// Records each write call so batching is observable.
    #[derive(Default)]
    struct RecordingStore {
        inner: MemorySessionStore,
        writes: Mutex<Vec<usize>>,
    }

    impl SessionStore for RecordingStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            self.writes.lock().unwrap().push(1);
            self.inner.set(key, value)
        }

        fn set_many(&self, entries: &[(String, String)]) -> Result<()> {
            self.writes.lock().unwrap().push(entries.len());
            self.inner.set_many(entries)
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_import_writes_all_keys_in_one_batch() {
        let store = RecordingStore::default();
        let written = import_bundle(
            &store,
            r#"{"UGPHONE-Token": "abc", "UGPHONE-ID": 7, "ugPhoneLang": "en"}"#,
        )
        .unwrap();

        assert_eq!(written, 3);
        assert_eq!(*store.writes.lock().unwrap(), vec![3]);
        assert_eq!(store.get("UGPHONE-ID").unwrap().as_deref(), Some("7"));
    }

    #[test]
    fn test_import_rejects_non_objects() {
        let store = MemorySessionStore::new();
        for raw in ["[]", "\"text\"", "not json", "{}"] {
            let err = import_bundle(&store, raw).unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "input {:?}", raw);
        }
        assert!(store.is_empty());
    }

    #[test]
    fn test_export_uses_canonical_order_and_skips_unknown_keys() {
        let store = MemorySessionStore::with_entries([
            (SESSION_RECORD_KEY, "{}"),
            ("ugPhoneLang", "en"),
            ("unrelated", "x"),
        ]);
        let exported = export_bundle(&store).unwrap();

        let lang = exported.find("ugPhoneLang").unwrap();
        let record = exported.find(SESSION_RECORD_KEY).unwrap();
        assert!(lang < record);
        assert!(!exported.contains("unrelated"));
    }

    #[test]
    fn test_clear_removes_known_keys_only() {
        let store = MemorySessionStore::with_entries([
            (SESSION_RECORD_KEY, "{}"),
            ("UGPHONE-ID", "1"),
            ("unrelated", "x"),
        ]);
        clear_bundle(&store).unwrap();

        assert!(store.get(SESSION_RECORD_KEY).unwrap().is_none());
        assert!(store.get("UGPHONE-ID").unwrap().is_none());
        assert_eq!(store.get("unrelated").unwrap().as_deref(), Some("x"));
    }
}
