//! Entity keys and entity groups.
//!
//! Every stored entity is addressed by an [`EntityKey`]: a non-empty path of
//! `(kind, id)` pairs from the root ancestor down to the entity itself.
//!
//! ```text
//! Profile("alice")                      ← root, entity group of alice
//! └── Conference(42)                    ← organised by alice
//!     └── Session(7)                    ← belongs to conference 42
//! ```
//!
//! The root of the path is the entity's *group*. Ancestor queries and
//! transactions are scoped by groups.
//!
//! Keys travel over the wire in a websafe form: URL-safe base64 (no padding)
//! of the JSON-encoded path.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Entity kinds known to the conference backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    /// A user profile (entity group root).
    Profile,
    /// A conference, child of its organizer's profile.
    Conference,
    /// A session, child of its conference.
    Session,
    /// A wishlist entry, child of the owning profile.
    WishListEntry,
}

impl Kind {
    /// Stable name of the kind, used for storage and display.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Profile => "Profile",
            Self::Conference => "Conference",
            Self::Session => "Session",
            Self::WishListEntry => "WishListEntry",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of an entity within its parent.
///
/// Profiles are named by user id; everything else gets an allocated integer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyId {
    /// Store-allocated numeric id.
    Id(u64),
    /// Caller-chosen string name.
    Name(String),
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl From<u64> for KeyId {
    fn from(id: u64) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for KeyId {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for KeyId {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

/// Errors decoding a websafe key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// The string is not valid URL-safe base64.
    #[error("key is not valid base64: {0}")]
    Encoding(String),

    /// The decoded bytes are not a key path.
    #[error("key does not decode to an entity path: {0}")]
    Path(String),

    /// The decoded path has no elements.
    #[error("key path is empty")]
    Empty,
}

/// Full path of an entity from its root ancestor.
///
/// Invariant: the path is never empty.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    path: Vec<(Kind, KeyId)>,
}

impl EntityKey {
    /// Key of a root entity (no parent).
    #[must_use]
    pub fn root(kind: Kind, id: impl Into<KeyId>) -> Self {
        Self {
            path: vec![(kind, id.into())],
        }
    }

    /// Key of a child of `self`.
    #[must_use]
    pub fn child(&self, kind: Kind, id: impl Into<KeyId>) -> Self {
        let mut path = self.path.clone();
        path.push((kind, id.into()));
        Self { path }
    }

    /// Key of the profile of `user_id`.
    #[must_use]
    pub fn profile(user_id: &str) -> Self {
        Self::root(Kind::Profile, user_id)
    }

    /// Kind of the entity this key addresses.
    #[must_use]
    pub fn kind(&self) -> Kind {
        self.last().0
    }

    /// Id of the entity within its parent.
    #[must_use]
    pub fn id(&self) -> &KeyId {
        &self.last().1
    }

    /// Parent key, `None` for roots.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        (self.path.len() > 1).then(|| Self {
            path: self.path[..self.path.len() - 1].to_vec(),
        })
    }

    /// Entity group this key belongs to.
    #[must_use]
    pub fn group(&self) -> EntityGroup {
        EntityGroup(Self {
            path: self.path[..1].to_vec(),
        })
    }

    /// Whether `self` equals `ancestor` or lies in its subtree.
    #[must_use]
    pub fn has_ancestor(&self, ancestor: &Self) -> bool {
        self.path.starts_with(&ancestor.path)
    }

    /// Every prefix of the path, from the root down to `self` inclusive.
    #[must_use]
    pub fn ancestry(&self) -> Vec<Self> {
        (1..=self.path.len())
            .map(|len| Self {
                path: self.path[..len].to_vec(),
            })
            .collect()
    }

    /// Number of elements in the path.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// Encode as a websafe string.
    #[must_use]
    pub fn to_urlsafe(&self) -> String {
        // Serializing a Vec of (enum, enum) pairs to JSON cannot fail.
        let json = serde_json::to_vec(&self.path).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decode a websafe string produced by [`EntityKey::to_urlsafe`].
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] if the string is not base64, not a JSON path, or an empty path.
    pub fn from_urlsafe(encoded: &str) -> Result<Self, KeyError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim())
            .map_err(|e| KeyError::Encoding(e.to_string()))?;
        let path: Vec<(Kind, KeyId)> =
            serde_json::from_slice(&bytes).map_err(|e| KeyError::Path(e.to_string()))?;
        if path.is_empty() {
            return Err(KeyError::Empty);
        }
        Ok(Self { path })
    }

    fn last(&self) -> &(Kind, KeyId) {
        // The constructors never produce an empty path.
        &self.path[self.path.len() - 1]
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (kind, id)) in self.path.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{kind}:{id}")?;
        }
        Ok(())
    }
}

impl Serialize for EntityKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_urlsafe())
    }
}

impl<'de> Deserialize<'de> for EntityKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::from_urlsafe(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Root key naming a transactional boundary.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityGroup(EntityKey);

impl EntityGroup {
    /// The root key of the group.
    #[must_use]
    pub const fn root(&self) -> &EntityKey {
        &self.0
    }

    /// Whether `key` belongs to this group.
    #[must_use]
    pub fn contains(&self, key: &EntityKey) -> bool {
        key.has_ancestor(&self.0)
    }
}

impl fmt::Display for EntityGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group({})", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn urlsafe_round_trip_keeps_path() {
        let conference = EntityKey::profile("alice@example.com").child(Kind::Conference, 42);
        let session = conference.child(Kind::Session, 7);

        let decoded = EntityKey::from_urlsafe(&session.to_urlsafe()).unwrap();

        assert_eq!(decoded, session);
        assert_eq!(decoded.parent(), Some(conference));
        assert_eq!(decoded.kind(), Kind::Session);
        assert!(!session.to_urlsafe().contains('='));
    }

    #[test]
    fn group_is_root_of_path() {
        let session = EntityKey::profile("alice")
            .child(Kind::Conference, 1)
            .child(Kind::Session, 2);

        assert_eq!(session.group().root(), &EntityKey::profile("alice"));
        assert_eq!(session.ancestry().len(), 3);
        assert_eq!(session.ancestry()[0], EntityKey::profile("alice"));
        assert_eq!(session.ancestry()[2], session);
        assert!(session.group().contains(&session));
        assert!(!EntityKey::profile("bob").group().contains(&session));
    }

    #[test]
    fn malformed_keys_are_rejected() {
        assert!(matches!(
            EntityKey::from_urlsafe("not base64!"),
            Err(KeyError::Encoding(_))
        ));
        assert!(matches!(
            EntityKey::from_urlsafe(&URL_SAFE_NO_PAD.encode(b"{\"a\":1}")),
            Err(KeyError::Path(_))
        ));
        assert_eq!(
            EntityKey::from_urlsafe(&URL_SAFE_NO_PAD.encode(b"[]")),
            Err(KeyError::Empty)
        );
    }

    #[test]
    fn numeric_and_named_ids_stay_distinct() {
        let by_id = EntityKey::root(Kind::Profile, 42);
        let by_name = EntityKey::root(Kind::Profile, "42");

        assert_ne!(by_id, by_name);
        assert_eq!(EntityKey::from_urlsafe(&by_name.to_urlsafe()).unwrap(), by_name);
    }

    #[test]
    fn display_is_readable_path() {
        let key = EntityKey::profile("alice").child(Kind::Conference, 3);
        assert_eq!(key.to_string(), "Profile:alice/Conference:3");
    }
}
