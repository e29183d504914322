//! Explicit model registry
//!
//! Models describe themselves through [`Model`] and are registered by the host.
//! Every model hangs off a parent; models without an explicit parent sit directly
//! under the abstract base [`BASE_MODEL`]. Abstract models group other models and own
//! no table.

use crate::error::{CqlError, CqlResult};
use crate::schema::TableSchema;

/// Name of the implicit abstract root every model descends from
pub const BASE_MODEL: &str = "Model";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDef {
    pub name: String,
    pub parent: String,
    pub is_abstract: bool,
    pub table: Option<TableSchema>,
}

impl ModelDef {
    /// A model mapped to `table`, directly under the base
    pub fn concrete(name: impl Into<String>, table: TableSchema) -> Self {
        Self {
            name: name.into(),
            parent: BASE_MODEL.to_string(),
            is_abstract: false,
            table: Some(table),
        }
    }

    pub fn abstract_model(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: BASE_MODEL.to_string(),
            is_abstract: true,
            table: None,
        }
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = parent.into();
        self
    }
}

/// Implemented by application types mapped to a table
///
/// ```ignore
/// struct Task;
///
/// impl Model for Task {
///     fn definition() -> ModelDef {
///         ModelDef::concrete("Task", TableSchema::new("tasks") /* ... */)
///     }
/// }
/// ```
pub trait Model {
    fn definition() -> ModelDef;
}

#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: Vec<ModelDef>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<M: Model>(&mut self) -> CqlResult<()> {
        self.register_def(M::definition())
    }

    pub fn register_def(&mut self, def: ModelDef) -> CqlResult<()> {
        if def.name == BASE_MODEL || self.get(&def.name).is_some() {
            return Err(CqlError::DuplicateModel(def.name));
        }
        if def.parent == def.name {
            return Err(CqlError::schema(format!(
                "model '{}' cannot extend itself",
                def.name
            )));
        }
        match (&def.table, def.is_abstract) {
            (None, false) => {
                return Err(CqlError::schema(format!(
                    "concrete model '{}' has no table",
                    def.name
                )));
            }
            (Some(table), false) => table.validate()?,
            (_, true) => {}
        }

        self.models.push(def);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ModelDef> {
        self.models.iter().find(|m| m.name == name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Direct children of `parent`, in registration order
    pub fn children<'a>(&'a self, parent: &'a str) -> impl Iterator<Item = &'a ModelDef> {
        self.models.iter().filter(move |m| m.parent == parent)
    }

    /// Every concrete model reachable from the base through abstract models.
    ///
    /// Depth-first: an abstract model contributes the flattened results of its
    /// children; a concrete model contributes itself and its own children are not
    /// visited. Models whose parent chain never reaches the base are not returned.
    pub fn concrete_models(&self) -> Vec<&ModelDef> {
        self.descend(BASE_MODEL)
    }

    fn descend<'a>(&'a self, name: &str) -> Vec<&'a ModelDef> {
        if let Some(def) = self.get(name)
            && !def.is_abstract
        {
            return vec![def];
        }

        self.models
            .iter()
            .filter(|m| m.parent == name)
            .flat_map(|child| self.descend(&child.name))
            .collect()
    }
}
