//! Untyped stored entities and the typed models layered on top of them.
//!
//! The store only sees [`Entity`] values: a key plus a JSON property map.
//! Domain types implement [`Model`] and are converted explicitly with
//! [`Entity::from_model`] / [`Entity::to_model`].

use crate::key::{EntityKey, Kind};
use crate::store::StoreError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Property map of a stored entity.
pub type Properties = Map<String, Value>;

/// A stored entity: key plus named properties.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    /// Full key of the entity.
    pub key: EntityKey,
    /// Property values, keyed by property name.
    pub properties: Properties,
}

impl Entity {
    /// Create an entity from its parts.
    #[must_use]
    pub const fn new(key: EntityKey, properties: Properties) -> Self {
        Self { key, properties }
    }

    /// Value of a property, if present and not null.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name).filter(|v| !v.is_null())
    }

    /// Build an entity from a typed model.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if the model does not serialize to a JSON object
    /// or the key kind does not match [`Model::KIND`].
    pub fn from_model<M: Model>(key: EntityKey, model: &M) -> Result<Self, StoreError> {
        if key.kind() != M::KIND {
            return Err(StoreError::Serialization(format!(
                "cannot store a {} under key {key}",
                M::KIND
            )));
        }
        match serde_json::to_value(model) {
            Ok(Value::Object(properties)) => Ok(Self { key, properties }),
            Ok(other) => Err(StoreError::Serialization(format!(
                "{} serialized to a non-object value: {other}",
                M::KIND
            ))),
            Err(e) => Err(StoreError::Serialization(e.to_string())),
        }
    }

    /// Decode the entity into a typed model.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] on kind mismatch or malformed properties.
    pub fn to_model<M: Model>(&self) -> Result<M, StoreError> {
        if self.key.kind() != M::KIND {
            return Err(StoreError::Serialization(format!(
                "entity {} is not a {}",
                self.key,
                M::KIND
            )));
        }
        serde_json::from_value(Value::Object(self.properties.clone()))
            .map_err(|e| StoreError::Serialization(format!("{}: {e}", self.key)))
    }
}

/// A domain type persisted as an entity of a fixed kind.
pub trait Model: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Kind under which the model is stored.
    const KIND: Kind;
}

/// A decoded model together with its key.
#[derive(Clone, Debug, PartialEq)]
pub struct Record<M> {
    /// Key of the stored entity.
    pub key: EntityKey,
    /// Decoded model.
    pub model: M,
}

impl<M: Model> Record<M> {
    /// Pair a model with its key.
    #[must_use]
    pub const fn new(key: EntityKey, model: M) -> Self {
        Self { key, model }
    }

    /// Decode an entity.
    ///
    /// # Errors
    ///
    /// See [`Entity::to_model`].
    pub fn from_entity(entity: &Entity) -> Result<Self, StoreError> {
        Ok(Self {
            key: entity.key.clone(),
            model: entity.to_model()?,
        })
    }

    /// Encode back into an entity.
    ///
    /// # Errors
    ///
    /// See [`Entity::from_model`].
    pub fn to_entity(&self) -> Result<Entity, StoreError> {
        Entity::from_model(self.key.clone(), &self.model)
    }
}
