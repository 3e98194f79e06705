use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Strongly typed identifier for library items.
///
/// Item ids are content-derived (see the identity generator in `lumen-core`):
/// the same normalized path and item kind always hash to the same id. The
/// random constructor exists for sentinel ids that must never match a stored
/// item.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
)]
pub struct ItemId(pub Uuid);

impl ItemId {
    /// A random id, guaranteed (probabilistically) not to collide with any
    /// content-derived id.
    pub fn random() -> Self {
        ItemId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for ItemId {
    fn from(value: Uuid) -> Self {
        ItemId(value)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strongly typed identifier for users.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        UserId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
