use std::collections::HashSet;

use odb_types::Oid;

use crate::engine::QueryEngine;
use crate::error::{QueryError, QueryResult};

/// Walks the objects of one class by following the `next_object_oid` links
/// of their headers.
///
/// A link to an OID without a header ends the walk. A link back to an
/// already visited OID is reported as an error and ends it too.
pub struct ClassChain<'a> {
    engine: &'a dyn QueryEngine,
    next: Oid,
    visited: HashSet<Oid>,
    done: bool,
}

impl<'a> ClassChain<'a> {
    pub fn new(engine: &'a dyn QueryEngine, first: Oid) -> Self {
        Self {
            engine,
            next: first,
            visited: HashSet::new(),
            done: first.is_null(),
        }
    }

    fn advance(&mut self) -> QueryResult<Option<Oid>> {
        let oid = self.next;
        if !self.visited.insert(oid) {
            return Err(QueryError::Engine(format!("class chain loops back to {oid}")));
        }
        let Some(header) = self.engine.object_header(oid)? else {
            return Ok(None);
        };
        self.next = header.next_object_oid;
        Ok(Some(oid))
    }
}

impl Iterator for ClassChain<'_> {
    type Item = QueryResult<Oid>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = self.advance();
        if !matches!(result, Ok(Some(_))) || self.next.is_null() {
            self.done = true;
        }
        result.transpose()
    }
}
