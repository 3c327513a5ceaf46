//! Type-safe ID newtypes for persisted documents
//!
//! Thread, step and element ids are assigned by the host; `new()` mints a
//! random UUID for callers (and tests) that need a fresh one.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Macro to define a type-safe ID newtype
macro_rules! define_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Create from an existing string (for loading from the store)
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Get the inner string value
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner string
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }
    };
}

define_id!(UserId, "Identifier of a user document (its partition key)");
define_id!(ThreadId, "Identifier of a thread; partition key for its steps and elements");
define_id!(StepId, "Identifier of a step, unique within its thread");
define_id!(ElementId, "Identifier of an element attached to a thread");
define_id!(SessionId, "Identifier of a host session whose step/element writes are gated");

/// Separator between the two halves of a feedback id
const FEEDBACK_SEPARATOR: &str = "::";

/// Derived feedback identity: `<threadId>::<forId>`
///
/// Never stored on its own; it is recomputed from the pair it names.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedbackId(String);

impl FeedbackId {
    pub fn compose(thread_id: &ThreadId, for_id: &StepId) -> Self {
        Self(format!("{}{}{}", thread_id, FEEDBACK_SEPARATOR, for_id))
    }

    /// Split a composite id back into `(threadId, forId)`.
    ///
    /// Exactly one separator and two non-empty halves are accepted.
    pub fn parse(raw: &str) -> Option<(ThreadId, StepId)> {
        let mut parts = raw.split(FEEDBACK_SEPARATOR);
        let thread_id = parts.next()?;
        let for_id = parts.next()?;
        if parts.next().is_some() || thread_id.is_empty() || for_id.is_empty() {
            return None;
        }
        Some((ThreadId::from(thread_id), StepId::from(for_id)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeedbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<FeedbackId> for String {
    fn from(id: FeedbackId) -> String {
        id.0
    }
}
