//! Identifier types for stream segments, barriers and mainstems.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use xxhash_rust::xxh64::xxh64;

// Stable UUID derived from a parent id, a tag and a part number.
fn derive_uuid(parent: Uuid, tag: &[u8], part: u64) -> Uuid {
    let mut bytes = Vec::with_capacity(16 + tag.len() + 8);
    bytes.extend_from_slice(parent.as_bytes());
    bytes.extend_from_slice(tag);
    bytes.extend_from_slice(&part.to_le_bytes());
    Uuid::from_u64_pair(xxh64(&bytes, 0), xxh64(&bytes, 1))
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Create an id from a UUID.
            pub fn new(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parse an id from a UUID string.
            pub fn from_str(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(Uuid::parse_str(s)?))
            }

            /// Get the inner UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_id!(
    /// Identity of a stream segment (edge) in the network.
    EdgeId
);

uuid_id!(
    /// Identity of a barrier (physical or gradient-derived).
    BarrierId
);

uuid_id!(
    /// Identity of a mainstem.
    ///
    /// Mainstems are named after their downstream-most edge, so the same
    /// network always resolves to the same ids.
    MainstemId
);

impl BarrierId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Id of the gradient barrier at a vertex of an edge.
    pub fn at_break_point(edge: EdgeId, vertex: usize) -> Self {
        Self(derive_uuid(edge.as_uuid(), b"gradient", vertex as u64))
    }
}

impl MainstemId {
    /// The mainstem id that starts at the given edge.
    pub fn starting_at(edge: EdgeId) -> Self {
        Self(edge.as_uuid())
    }
}

impl EdgeId {
    /// Id of the `part`-th piece (upstream first) of a split edge.
    pub fn split_part(&self, part: usize) -> Self {
        Self(derive_uuid(self.0, b"split", part as u64))
    }
}

/// Short code identifying a fish species (e.g. `"bt"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpeciesCode(String);

impl SpeciesCode {
    /// Create a species code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Borrow the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpeciesCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SpeciesCode {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}
