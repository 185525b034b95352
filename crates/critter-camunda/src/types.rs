//! Identifier types and shared response envelopes.

use std::fmt;

use derive_more::{Display, From};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

macro_rules! engine_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        ///
        /// Keys are 64-bit integers on the engine side but travel as strings
        /// in the v2 REST API. Numeric keys are accepted when decoding.
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[derive(Display, From, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a key from its string form.
            pub fn new(key: impl Into<String>) -> Self {
                Self(key.into())
            }

            /// Returns the key as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(key: &str) -> Self {
                Self(key.to_owned())
            }
        }

        impl From<u64> for $name {
            fn from(key: u64) -> Self {
                Self(key.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                deserializer.deserialize_any(KeyVisitor).map(Self)
            }
        }
    };
}

engine_key!(
    /// Key of a deployment.
    DeploymentKey
);
engine_key!(
    /// Key of a deployed process definition.
    ProcessDefinitionKey
);
engine_key!(
    /// Key of a process instance.
    ProcessInstanceKey
);
engine_key!(
    /// Key of a job.
    JobKey
);
engine_key!(
    /// Key of a variable.
    VariableKey
);
engine_key!(
    /// Key of a deployed form.
    FormKey
);

/// Accepts a key encoded either as a JSON string or as a JSON integer.
struct KeyVisitor;

impl Visitor<'_> for KeyVisitor {
    type Value = String;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an engine key as string or integer")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        Ok(value.to_owned())
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<Self::Value, E> {
        Ok(value)
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        Ok(value.to_string())
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        Ok(value.to_string())
    }
}

/// Pagination details of a search response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    /// Total number of matching items.
    #[serde(default)]
    pub total_items: u64,
    /// Cursor of the first returned item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_cursor: Option<String>,
    /// Cursor of the last returned item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_cursor: Option<String>,
}

/// Envelope returned by the `*/search` endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct SearchResult<T> {
    /// Matching items of the current page.
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    /// Pagination details.
    #[serde(default)]
    pub page: SearchPage,
}

impl<T> SearchResult<T> {
    /// Returns `true` if the page holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the first item, if any.
    #[must_use]
    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }
}

/// Variables attached to a process instance or job.
pub type Variables = serde_json::Map<String, serde_json::Value>;
