//! Validated identifiers for events and layout elements.
//!
//! Both ids are caller-chosen strings that end up as document path
//! segments, so they are checked once at the edge: non-empty, at most
//! [`MAX_ID_LEN`] characters, no `/`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum accepted identifier length, in characters.
pub const MAX_ID_LEN: usize = 120;

/// Why an identifier was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// Empty or whitespace-only.
    #[error("{0} must not be empty")]
    Empty(&'static str),
    /// Longer than [`MAX_ID_LEN`].
    #[error("{0} must be at most {MAX_ID_LEN} characters")]
    TooLong(&'static str),
    /// Contains a path separator.
    #[error("{0} must not contain '/'")]
    Separator(&'static str),
}

fn check(kind: &'static str, raw: &str) -> Result<String, IdError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(IdError::Empty(kind));
    }
    if trimmed.chars().count() > MAX_ID_LEN {
        return Err(IdError::TooLong(kind));
    }
    if trimmed.contains('/') {
        return Err(IdError::Separator(kind));
    }
    Ok(trimmed.to_string())
}

/// Identifier of an event; one layout exists per event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventId(String);

/// Caller-chosen identifier of an element, unique within its layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ElementId(String);

macro_rules! string_id {
    ($ty:ident, $kind:literal) => {
        impl $ty {
            /// Validates and wraps a raw identifier. Surrounding whitespace
            /// is trimmed.
            ///
            /// # Errors
            ///
            /// Returns an [`IdError`] if the identifier is empty, too long,
            /// or contains `/`.
            pub fn parse(raw: &str) -> Result<Self, IdError> {
                check($kind, raw).map(Self)
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $ty {
            type Error = IdError;

            fn try_from(raw: String) -> Result<Self, Self::Error> {
                Self::parse(&raw)
            }
        }

        impl From<$ty> for String {
            fn from(id: $ty) -> Self {
                id.0
            }
        }
    };
}

string_id!(EventId, "event id");
string_id!(ElementId, "element id");
