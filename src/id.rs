//! String IDs, cheap to clone and compared by value.
use anyhow::{Context, Result};
use indexmap::IndexSet;
use std::borrow::Borrow;
use std::fmt::Display;
use std::hash::Hash;

macro_rules! define_id_type {
    ($name:ident) => {
        /// A reference-counted name, used as an ID
        #[derive(
            Clone,
            std::hash::Hash,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Debug,
            serde::Deserialize,
            serde::Serialize,
        )]
        pub struct $name(pub std::rc::Rc<str>);

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(std::rc::Rc::from(s))
            }
        }
    };
}
pub(crate) use define_id_type;

/// A set of IDs which can be looked up by name
pub trait IDCollection<ID> {
    /// Get a copy of the ID in the collection with the given name, or an error if there is none
    fn get_id(&self, id: &str) -> Result<ID>;
}

impl<ID> IDCollection<ID> for IndexSet<ID>
where
    ID: Eq + Hash + Borrow<str> + Clone + Display,
{
    fn get_id(&self, id: &str) -> Result<ID> {
        self.get(id)
            .cloned()
            .with_context(|| format!("Unknown ID {id} found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;

    define_id_type!(GenericID);

    #[test]
    fn test_get_id() {
        let ids: IndexSet<GenericID> = ["a".into(), "b".into()].into_iter().collect();
        assert_eq!(ids.get_id("b").unwrap(), GenericID::from("b"));
        assert_eq!(ids.get_id("a").unwrap().to_string(), "a");
        assert_error!(ids.get_id("c"), "Unknown ID c found");
    }
}
