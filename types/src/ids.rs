use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{kind} must not be empty")]
pub struct EmptyIdError {
    pub kind: &'static str,
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Result<Self, EmptyIdError> {
                let value = value.into();
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(EmptyIdError { kind: $kind });
                }
                if trimmed.len() == value.len() {
                    Ok(Self(value))
                } else {
                    Ok(Self(trimmed.to_owned()))
                }
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = EmptyIdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = EmptyIdError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Isolation boundary. Every row and every query is scoped to one tenant.
    TenantId,
    "tenant id"
);
string_id!(AssetId, "asset id");
string_id!(BidId, "bid id");
string_id!(DocumentId, "document id");
string_id!(ActorId, "actor id");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_ids() {
        let err = TenantId::new("   ").unwrap_err();
        assert_eq!(err.kind, "tenant id");
        assert_eq!(err.to_string(), "tenant id must not be empty");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let id = AssetId::new("  a-1 ").unwrap();
        assert_eq!(id.as_str(), "a-1");
    }

    #[test]
    fn deserialize_rejects_empty() {
        let parsed: Result<DocumentId, _> = serde_json::from_str("\"\"");
        assert!(parsed.is_err());
        let parsed: DocumentId = serde_json::from_str("\"doc-7\"").unwrap();
        assert_eq!(parsed.to_string(), "doc-7");
    }
}
