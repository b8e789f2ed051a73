use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Mint a fresh id that is unique for the lifetime of the process and beyond.
            pub fn generate() -> Self {
                $name(format!(concat!($prefix, "-{}"), Uuid::new_v4().simple()))
            }

            /// Wrap an id that was stored elsewhere.
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                $name(id.to_string())
            }
        }
    };
}

string_id!(
    /// Stable id of a report section or subsection.
    SectionId,
    "sec"
);
string_id!(
    /// Id of a content block inside a [`crate::blocks::Document`].
    BlockId,
    "blk"
);
string_id!(DocumentId, "doc");
string_id!(ImageId, "img");
string_id!(
    /// Id of a template revision. Editing a template mints a new one.
    TemplateId,
    "tpl"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_prefixed_and_unique() {
        let a = SectionId::generate();
        let b = SectionId::generate();
        assert!(a.as_str().starts_with("sec-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_id_serializes_as_plain_string() {
        let id = BlockId::new("blk-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"blk-1\"");
        let back: BlockId = serde_json::from_str("\"blk-1\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_display_matches_inner() {
        assert_eq!(format!("{}", TemplateId::from("tpl-a")), "tpl-a");
    }
}
