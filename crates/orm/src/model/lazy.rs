//! Deferred relationship values.
//!
//! A relationship field is either resolved when its owner is loaded or
//! carries a loader captured at load time. The first `get()` runs the loader
//! and memoises the result.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::Model;
use crate::error::OrmResult;

type Loader<T> = Arc<dyn Fn() -> OrmResult<T> + Send + Sync>;

pub struct Lazy<T> {
    cell: OnceCell<T>,
    loader: Option<Loader<T>>,
}

impl<T> Lazy<T> {
    /// A value that is already resolved
    pub fn loaded(value: T) -> Self {
        Self {
            cell: OnceCell::with_value(value),
            loader: None,
        }
    }

    /// A value resolved on first access
    pub fn deferred<F>(loader: F) -> Self
    where
        F: Fn() -> OrmResult<T> + Send + Sync + 'static,
    {
        Self {
            cell: OnceCell::new(),
            loader: Some(Arc::new(loader)),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    /// The resolved value, without triggering the loader
    pub fn peek(&self) -> Option<&T> {
        self.cell.get()
    }

    /// Mutable access to the resolved value, without triggering the loader
    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.cell.get_mut()
    }

    /// Replace the value, discarding any pending loader
    pub fn set(&mut self, value: T) {
        self.cell = OnceCell::with_value(value);
        self.loader = None;
    }

    pub fn into_inner(self) -> Option<T> {
        self.cell.into_inner()
    }
}

impl<T: Default> Lazy<T> {
    /// Resolve the value, running the loader on first access
    pub fn get(&self) -> OrmResult<&T> {
        self.cell.get_or_try_init(|| match &self.loader {
            Some(loader) => loader(),
            None => Ok(T::default()),
        })
    }
}

impl<T: Default> Default for Lazy<T> {
    fn default() -> Self {
        Self::loaded(T::default())
    }
}

impl<T: Clone> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        let cell = match self.cell.get() {
            Some(value) => OnceCell::with_value(value.clone()),
            None => OnceCell::new(),
        };
        Self {
            cell,
            loader: self.loader.clone(),
        }
    }
}

impl<T: PartialEq> PartialEq for Lazy<T> {
    fn eq(&self, other: &Self) -> bool {
        self.peek() == other.peek()
    }
}

impl<T: fmt::Debug> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.get() {
            Some(value) => f.debug_tuple("Lazy").field(value).finish(),
            None => f.write_str("Lazy(<deferred>)"),
        }
    }
}

impl<T> From<T> for Lazy<T> {
    fn from(value: T) -> Self {
        Self::loaded(value)
    }
}

/// Container shapes a relationship field can take
pub trait Related: Clone + Default + Send + Sync + 'static {
    type Target: Model;

    /// Whether the field holds many related instances
    const COLLECTION: bool;

    fn members(&self) -> Vec<&Self::Target>;

    fn members_mut(&mut self) -> Vec<&mut Self::Target>;

    fn from_members(members: Vec<Self::Target>) -> Self;
}

impl<T: Model> Related for Option<T> {
    type Target = T;
    const COLLECTION: bool = false;

    fn members(&self) -> Vec<&T> {
        self.iter().collect()
    }

    fn members_mut(&mut self) -> Vec<&mut T> {
        self.iter_mut().collect()
    }

    fn from_members(members: Vec<T>) -> Self {
        members.into_iter().next()
    }
}

impl<T: Model> Related for Vec<T> {
    type Target = T;
    const COLLECTION: bool = true;

    fn members(&self) -> Vec<&T> {
        self.iter().collect()
    }

    fn members_mut(&mut self) -> Vec<&mut T> {
        self.iter_mut().collect()
    }

    fn from_members(members: Vec<T>) -> Self {
        members
    }
}
