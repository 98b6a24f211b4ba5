//! Raw entity metadata as declared by a model or a mapping document, before
//! validation and inference.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OrmError;

/// How far save, update and delete propagate into related entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cascade {
    /// Persist related entities, foreign keys and join rows
    #[default]
    All,
    /// Maintain foreign keys and join rows only
    Keys,
    /// Skip relationship persistence entirely
    None,
}

impl FromStr for Cascade {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "keys" => Ok(Self::Keys),
            "none" => Ok(Self::None),
            other => Err(OrmError::model_configuration(format!(
                "unknown cascade mode '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Cascade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::All => "ALL",
            Self::Keys => "KEYS",
            Self::None => "NONE",
        })
    }
}

/// Declared relationship of a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationDeclaration {
    ManyToMany { join_table: Option<String> },
    ManyToOne { column: Option<String> },
    OneToMany { column: Option<String> },
    /// `owner` is true when the foreign key lives on the declaring entity
    OneToOne { owner: bool, column: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDeclaration {
    pub name: String,
    pub column: Option<String>,
    pub primary_key: bool,
    pub autoincrement: bool,
    pub nullable: bool,
    pub unique: bool,
    pub transient: bool,
    pub relation: Option<RelationDeclaration>,
}

impl FieldDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column: None,
            primary_key: false,
            autoincrement: false,
            nullable: true,
            unique: false,
            transient: false,
            relation: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntityDeclaration {
    pub table: Option<String>,
    pub transient: bool,
    pub cascade: Cascade,
    pub lazy: bool,
    pub endpoint: Option<String>,
    pub fields: Vec<FieldDeclaration>,
}

impl EntityDeclaration {
    pub fn field(&self, name: &str) -> Option<&FieldDeclaration> {
        self.fields.iter().find(|f| f.name == name)
    }
}
