//! Relationships Module - value objects describing declared associations
//!
//! Identity is structural: two relationships are equal when they describe
//! the same association, whichever side declared them. Many-to-many and
//! one-to-one identity is direction-symmetric.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::model::EntityType;

/// The four association shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipKind {
    ManyToMany,
    ManyToOne,
    OneToMany,
    OneToOne,
}

impl RelationshipKind {
    /// Whether the declaring side holds at most one related instance
    pub fn is_to_one(self) -> bool {
        matches!(self, Self::ManyToOne | Self::OneToOne)
    }
}

/// Many-to-many association through a join table
#[derive(Debug, Clone)]
pub struct ManyToMany {
    pub name: String,
    pub join_table: String,
    pub first: EntityType,
    pub second: EntityType,
    /// Primary-key field of `first`
    pub first_field: String,
    /// Primary-key field of `second`
    pub second_field: String,
    /// Join-table column referencing `first`
    pub first_column: String,
    /// Join-table column referencing `second`
    pub second_column: String,
}

impl ManyToMany {
    fn side_key(&self, first: bool) -> (&str, &str, &str) {
        if first {
            (self.first.name(), &self.first_field, &self.first_column)
        } else {
            (self.second.name(), &self.second_field, &self.second_column)
        }
    }

    /// Join columns as (column referencing `entity`, column referencing the other side)
    pub fn columns_from(&self, entity: EntityType) -> Option<(&str, &str)> {
        if entity == self.first {
            Some((&self.first_column, &self.second_column))
        } else if entity == self.second {
            Some((&self.second_column, &self.first_column))
        } else {
            None
        }
    }
}

impl PartialEq for ManyToMany {
    fn eq(&self, other: &Self) -> bool {
        if self.join_table != other.join_table {
            return false;
        }
        let same = self.first == other.first
            && self.second == other.second
            && self.first_field == other.first_field
            && self.second_field == other.second_field;
        let swapped = self.first == other.second
            && self.second == other.first
            && self.first_field == other.second_field
            && self.second_field == other.first_field;
        same || swapped
    }
}

impl Eq for ManyToMany {}

impl Hash for ManyToMany {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.join_table.hash(state);
        let a = self.side_key(true);
        let b = self.side_key(false);
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        low.0.hash(state);
        low.1.hash(state);
        high.0.hash(state);
        high.1.hash(state);
    }
}

/// The declaring side references one instance whose key it stores
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ManyToOne {
    pub name: String,
    /// Side whose table carries the foreign key
    pub many: EntityType,
    pub one: EntityType,
    pub column: String,
}

/// The declaring side owns a collection whose rows store its key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OneToMany {
    pub name: String,
    pub one: EntityType,
    /// Side whose table carries the foreign key
    pub many: EntityType,
    pub column: String,
}

#[derive(Debug, Clone)]
pub struct OneToOne {
    pub name: String,
    pub first: EntityType,
    pub second: EntityType,
    /// Side whose table carries the foreign key
    pub owner: EntityType,
    pub column: String,
}

impl OneToOne {
    /// The side that does not carry the foreign key
    pub fn owned(&self) -> EntityType {
        if self.owner == self.first {
            self.second
        } else {
            self.first
        }
    }
}

impl PartialEq for OneToOne {
    fn eq(&self, other: &Self) -> bool {
        let pair = (self.first == other.first && self.second == other.second)
            || (self.first == other.second && self.second == other.first);
        pair && self.owner == other.owner && self.column == other.column
    }
}

impl Eq for OneToOne {}

impl Hash for OneToOne {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.owner.hash(state);
        self.owned().hash(state);
        self.column.hash(state);
    }
}

/// A declared association between two entity types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Relationship {
    ManyToMany(ManyToMany),
    ManyToOne(ManyToOne),
    OneToMany(OneToMany),
    OneToOne(OneToOne),
}

impl Relationship {
    pub fn kind(&self) -> RelationshipKind {
        match self {
            Self::ManyToMany(_) => RelationshipKind::ManyToMany,
            Self::ManyToOne(_) => RelationshipKind::ManyToOne,
            Self::OneToMany(_) => RelationshipKind::OneToMany,
            Self::OneToOne(_) => RelationshipKind::OneToOne,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::ManyToMany(r) => &r.name,
            Self::ManyToOne(r) => &r.name,
            Self::OneToMany(r) => &r.name,
            Self::OneToOne(r) => &r.name,
        }
    }

    /// The two participating types
    pub fn entities(&self) -> (EntityType, EntityType) {
        match self {
            Self::ManyToMany(r) => (r.first, r.second),
            Self::ManyToOne(r) => (r.many, r.one),
            Self::OneToMany(r) => (r.one, r.many),
            Self::OneToOne(r) => (r.first, r.second),
        }
    }

    pub fn contains(&self, entity: EntityType) -> bool {
        let (a, b) = self.entities();
        a == entity || b == entity
    }

    /// The other participant, if `entity` takes part
    pub fn opposite(&self, entity: EntityType) -> Option<EntityType> {
        let (a, b) = self.entities();
        if a == entity {
            Some(b)
        } else if b == entity {
            Some(a)
        } else {
            None
        }
    }

    /// Foreign-key column, for the key-carrying variants
    pub fn foreign_key_column(&self) -> Option<&str> {
        match self {
            Self::ManyToMany(_) => None,
            Self::ManyToOne(r) => Some(&r.column),
            Self::OneToMany(r) => Some(&r.column),
            Self::OneToOne(r) => Some(&r.column),
        }
    }

    /// Type whose table carries the foreign key
    pub fn key_holder(&self) -> Option<EntityType> {
        match self {
            Self::ManyToMany(_) => None,
            Self::ManyToOne(r) => Some(r.many),
            Self::OneToMany(r) => Some(r.many),
            Self::OneToOne(r) => Some(r.owner),
        }
    }

    /// Whether the declaring model's own table stores the foreign key
    pub fn is_owning_side(&self) -> bool {
        match self {
            Self::ManyToOne(_) => true,
            Self::OneToOne(r) => r.owner == r.first,
            Self::ManyToMany(_) | Self::OneToMany(_) => false,
        }
    }

    /// Whether both describe one association from opposite sides, such as a
    /// one-to-many and the many-to-one sharing its foreign key.
    pub fn mirrors(&self, other: &Relationship) -> bool {
        match (self, other) {
            (Self::OneToMany(a), Self::ManyToOne(b)) | (Self::ManyToOne(b), Self::OneToMany(a)) => {
                a.one == b.one && a.many == b.many && a.column == b.column
            }
            _ => self == other,
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self.kind(), self.name())
    }
}

/// Default join-table name: both model names, lowercased, sorted
pub fn default_join_table(a: EntityType, b: EntityType) -> String {
    let mut names = [a.name().to_lowercase(), b.name().to_lowercase()];
    names.sort();
    format!("{}_{}", names[0], names[1])
}
