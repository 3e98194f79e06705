use lumen_model::{ItemId, ItemKind};
use uuid::Uuid;

use crate::config::{IdentityConfig, ServerPaths};
use crate::error::{LibraryError, Result};

/// Namespace for all content-derived item ids. Changing this re-keys every
/// library in existence; treat it as frozen.
const ITEM_ID_NAMESPACE: Uuid = Uuid::from_u128(0x8f4e_1db2_6c3a_4b7e_9d21_54c6_a0f3_7e58);

/// Deterministic, collision-resistant mapping from (key, kind) to an item id.
///
/// The key is a filesystem path or a synthetic by-name string. Same key and
/// kind under unchanged configuration always produce the same id; flipping
/// either [`IdentityConfig`] flag re-derives every id, which is an accepted
/// migration hazard rather than a bug.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    paths: ServerPaths,
    config: IdentityConfig,
}

impl IdGenerator {
    pub fn new(paths: ServerPaths, config: IdentityConfig) -> Self {
        Self { paths, config }
    }

    pub fn generate(&self, key: &str, kind: ItemKind) -> Result<ItemId> {
        if key.is_empty() {
            return Err(LibraryError::InvalidArgument(
                "identity key must not be empty".to_string(),
            ));
        }

        let mut key = key.to_string();

        // Keys under the program-data root are stored relative with
        // canonical separators, making ids portable across data-root
        // relocations.
        let data_root = self.paths.program_data_path.to_string_lossy();
        if !data_root.is_empty() && key.starts_with(data_root.as_ref()) {
            key = key[data_root.len()..]
                .trim_start_matches(['/', '\\'])
                .replace('\\', "/");
        }

        if self.config.case_insensitive_ids || self.config.normalize_by_name_ids {
            key = key.to_lowercase();
        }

        let material = format!("{}{}", kind.descriptor(), key);
        Ok(ItemId(Uuid::new_v5(&ITEM_ID_NAMESPACE, material.as_bytes())))
    }
}
