//! Code for handling component names.
//!
//! Every network component is identified by a human-readable name following the
//! `"<node> <technology>"` convention (or `"EU <carrier>"` for continental
//! aggregate buses). Each component class gets its own ID type so that e.g. a
//! bus name cannot be passed where a link name is expected.

macro_rules! define_id_type {
    ($name:ident) => {
        #[derive(
            Clone, std::hash::Hash, PartialEq, Eq, serde::Deserialize, Debug, serde::Serialize,
        )]
        /// A component name (e.g. `BusID`, `LinkID`, etc.)
        pub struct $name(pub std::rc::Rc<str>);

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(std::rc::Rc::from(s))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(std::rc::Rc::from(s))
            }
        }

        impl $name {
            /// Create a new ID from a string slice
            pub fn new(id: &str) -> Self {
                $name(std::rc::Rc::from(id))
            }

            /// The name as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Derive a new ID by appending `suffix` (e.g. node → `"<node> H2"`)
            pub fn suffixed(&self, suffix: &str) -> Self {
                $name(std::rc::Rc::from(format!("{}{}", self.0, suffix)))
            }

            /// The country code encoded in the first two characters of the name
            pub fn country(&self) -> &str {
                &self.0[..self.0.len().min(2)]
            }
        }
    };
}
pub(crate) use define_id_type;

define_id_type!(CarrierID);
define_id_type!(BusID);
define_id_type!(LineID);
define_id_type!(LinkID);
define_id_type!(GeneratorID);
define_id_type!(StorageUnitID);
define_id_type!(StoreID);
define_id_type!(LoadID);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffixed() {
        let node = BusID::new("DE0 1");
        assert_eq!(node.suffixed(" H2").as_str(), "DE0 1 H2");
    }

    #[test]
    fn test_country() {
        assert_eq!(BusID::new("ES2 0").country(), "ES");
        assert_eq!(BusID::new("X").country(), "X");
    }
}
