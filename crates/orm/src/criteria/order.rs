//! Sort orders

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Asc,
    Desc,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Asc => write!(f, "ASC"),
            Direction::Desc => write!(f, "DESC"),
        }
    }
}

/// Sort on one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub field: String,
    pub direction: Direction,
    pub ignore_case: bool,
}

impl Order {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Asc,
            ignore_case: false,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Desc,
            ignore_case: false,
        }
    }

    /// Sort text without regard to case
    pub fn ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }
}
