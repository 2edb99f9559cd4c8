//! Save/load for banked meta state
//!
//! Two non-negative integers under a single namespaced key. Any load
//! failure (missing key, corrupt JSON, wrong shape) yields a zero-valued
//! default; nothing here ever surfaces an error to gameplay. The pure JSON
//! helpers keep the round-trip testable without a storage backend.

use serde::{Deserialize, Serialize};

use crate::meta::MetaProgress;

/// Persisted envelope: just the banked pair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaSave {
    pub currency: u64,
    pub xp: u64,
}

impl MetaSave {
    /// LocalStorage key (used only in wasm32)
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "swarmfall_meta";

    pub fn from_meta(meta: &MetaProgress) -> Self {
        Self {
            currency: meta.currency,
            xp: meta.xp,
        }
    }

    pub fn apply_to(&self, meta: &mut MetaProgress) {
        meta.currency = self.currency;
        meta.xp = self.xp;
    }

    pub fn to_json(&self) -> String {
        // Two u64 fields cannot fail to serialize
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Corrupt or missing input decodes to the zero-valued default
    pub fn from_json(json: &str) -> Self {
        serde_json::from_str(json).unwrap_or_else(|e| {
            log::warn!("meta save unreadable ({}), starting fresh", e);
            Self::default()
        })
    }

    /// Load from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                let save = Self::from_json(&json);
                log::info!("loaded meta save: {} currency, {} xp", save.currency, save.xp);
                return save;
            }
        }

        log::info!("no meta save found, starting fresh");
        Self::default()
    }

    /// Save to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            let _ = storage.set_item(Self::STORAGE_KEY, &self.to_json());
            log::info!("meta save written");
        }
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::default()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        // No-op for native
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_exact() {
        let save = MetaSave {
            currency: 1234,
            xp: 98765,
        };
        let reloaded = MetaSave::from_json(&save.to_json());
        assert_eq!(reloaded, save);
    }

    #[test]
    fn test_corrupt_json_defaults_to_zero() {
        for garbage in ["", "not json", "{\"currency\": -5}", "[1,2,3]", "{\"currency\": \"x\"}"] {
            let save = MetaSave::from_json(garbage);
            assert_eq!(save, MetaSave::default());
            assert_eq!((save.currency, save.xp), (0, 0));
        }
    }

    #[test]
    fn test_missing_fields_default() {
        // Partial envelopes are not an error either
        let save = MetaSave::from_json("{}");
        assert_eq!((save.currency, save.xp), (0, 0));
    }

    #[test]
    fn test_apply_to_meta() {
        let save = MetaSave { currency: 10, xp: 20 };
        let mut meta = MetaProgress::default();
        save.apply_to(&mut meta);
        assert_eq!(meta.currency, 10);
        assert_eq!(meta.xp, 20);
        assert_eq!(MetaSave::from_meta(&meta), save);
    }
}
