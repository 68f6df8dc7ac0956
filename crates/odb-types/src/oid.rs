use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// The two disjoint OID namespaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OidKind {
    /// Identifies a persisted application object.
    Object,
    /// Identifies class metadata (a class-info record).
    Class,
}

/// Generated identifier for a persisted object or class.
///
/// An `Oid` wraps a positive 64-bit integer tagged with its [`OidKind`].
/// Object and class identifiers never compare equal, even when the
/// underlying integers match. The value `0` is reserved for the null OID.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Oid {
    kind: OidKind,
    id: u64,
}

impl Oid {
    /// An object identifier.
    pub const fn object(id: u64) -> Self {
        Self {
            kind: OidKind::Object,
            id,
        }
    }

    /// A class-metadata identifier.
    pub const fn class(id: u64) -> Self {
        Self {
            kind: OidKind::Class,
            id,
        }
    }

    /// The null object ID. Represents "no such object".
    pub const fn null() -> Self {
        Self::object(0)
    }

    /// Returns `true` if this OID carries the reserved null value.
    pub const fn is_null(&self) -> bool {
        self.id == 0
    }

    /// The underlying integer.
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// The namespace this OID belongs to.
    pub const fn kind(&self) -> OidKind {
        self.kind
    }

    pub const fn is_object_oid(&self) -> bool {
        matches!(self.kind, OidKind::Object)
    }

    pub const fn is_class_oid(&self) -> bool {
        matches!(self.kind, OidKind::Class)
    }
}

impl Default for Oid {
    fn default() -> Self {
        Self::null()
    }
}

impl Ord for Oid {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id
            .cmp(&other.id)
            .then_with(|| self.kind.cmp(&other.kind))
    }
}

impl PartialOrd for Oid {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            OidKind::Object => write!(f, "Oid({})", self.id),
            OidKind::Class => write!(f, "ClassOid({})", self.id),
        }
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            OidKind::Object => write!(f, "{}", self.id),
            OidKind::Class => write!(f, "c{}", self.id),
        }
    }
}

impl FromStr for Oid {
    type Err = TypeError;

    /// Parse the `Display` form: `"42"` for objects, `"c42"` for classes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, digits) = match s.strip_prefix('c') {
            Some(rest) => (OidKind::Class, rest),
            None => (OidKind::Object, s),
        };
        let id = digits
            .parse::<u64>()
            .map_err(|e| TypeError::InvalidOid(format!("{s}: {e}")))?;
        Ok(Self { kind, id })
    }
}
