/// Cached position of an OID's data.
///
/// Callers must distinguish all three outcomes: a `NotInCache` OID has to be
/// looked up on disk, while a `Deleted` one is logically gone even though
/// its record may still exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectPosition {
    /// The OID is active at this position.
    Found(i64),
    /// No position is cached for the OID.
    NotInCache,
    /// The OID was deleted in this session.
    Deleted,
}

impl ObjectPosition {
    pub fn position(&self) -> Option<i64> {
        match self {
            Self::Found(p) => Some(*p),
            Self::NotInCache | Self::Deleted => None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted)
    }
}
