//! Scan execution.
//!
//! A [`ValuesQuery`] streams candidate OIDs, reads each candidate's header
//! and attribute values through a [`QueryEngine`], filters them with an
//! optional [`Criterion`] and feeds the matches to its values actions.

use odb_types::Oid;
use tracing::debug;

use crate::action::{ActionValue, ValuesAction};
use crate::criterion::Criterion;
use crate::engine::QueryEngine;
use crate::error::{QueryError, QueryResult};

/// One result row: action aliases mapped to their values, in action order.
#[derive(Clone, Debug)]
pub struct ObjectValues {
    oid: Option<Oid>,
    values: Vec<(String, ActionValue)>,
}

impl ObjectValues {
    /// The candidate this row was produced from. `None` for aggregate rows.
    pub fn oid(&self) -> Option<Oid> {
        self.oid
    }

    pub fn get(&self, alias: &str) -> Option<&ActionValue> {
        self.values.iter().find(|(a, _)| a == alias).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(a, _)| a.as_str())
    }

    fn collect(oid: Option<Oid>, actions: &[Box<dyn ValuesAction>]) -> Self {
        Self {
            oid,
            values: actions
                .iter()
                .map(|action| (action.alias().to_string(), action.value()))
                .collect(),
        }
    }
}

/// A criteria query with values actions.
///
/// If any action is multi-row the query yields one row per matching
/// candidate, with every action started, executed and ended on that
/// candidate alone. Otherwise all matches are folded into a single row.
#[derive(Debug, Default)]
pub struct ValuesQuery {
    criterion: Option<Criterion>,
    actions: Vec<Box<dyn ValuesAction>>,
}

impl ValuesQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, criterion: Criterion) -> Self {
        self.criterion = Some(criterion);
        self
    }

    pub fn action(mut self, action: impl ValuesAction + 'static) -> Self {
        self.actions.push(Box::new(action));
        self
    }

    pub fn criterion(&self) -> Option<&Criterion> {
        self.criterion.as_ref()
    }

    pub fn is_multi_row(&self) -> bool {
        self.actions.iter().any(|action| action.is_multi_row())
    }

    /// Attributes read by the criterion and the actions, without duplicates.
    pub fn attribute_names(&self) -> Vec<String> {
        let mut names = self
            .criterion
            .as_ref()
            .map(Criterion::attribute_names)
            .unwrap_or_default();
        for action in &self.actions {
            let name = action.attribute_name();
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }

    /// Run the query over `candidates`.
    ///
    /// Candidates without a header (deleted or unknown OIDs) are skipped.
    /// The query's own actions are left untouched; each run works on copies.
    pub fn execute<I, E>(&self, engine: &dyn QueryEngine, candidates: I) -> QueryResult<Vec<ObjectValues>>
    where
        I: IntoIterator<Item = Result<Oid, E>>,
        E: Into<QueryError>,
    {
        let mut actions: Vec<Box<dyn ValuesAction>> = self.actions.iter().map(|a| a.copy()).collect();
        let names = self.attribute_names();
        let multi_row = self.is_multi_row();
        let mut rows = Vec::new();
        let (mut scanned, mut matched) = (0usize, 0usize);

        if !multi_row {
            actions.iter_mut().for_each(|a| a.start());
        }
        for candidate in candidates {
            let oid = candidate.map_err(Into::into)?;
            scanned += 1;
            let Some(header) = engine.object_header(oid)? else {
                continue;
            };
            let values = engine.attribute_values(&header, &names)?;
            if let Some(criterion) = &self.criterion {
                if !criterion.matches(&values)? {
                    continue;
                }
            }
            matched += 1;
            for action in &mut actions {
                if multi_row {
                    action.start();
                }
                action.execute(oid, &values)?;
                if multi_row {
                    action.end();
                }
            }
            if multi_row {
                rows.push(ObjectValues::collect(Some(oid), &actions));
            }
        }
        if !multi_row {
            actions.iter_mut().for_each(|a| a.end());
            rows.push(ObjectValues::collect(None, &actions));
        }

        debug!(scanned, matched, rows = rows.len(), "values query executed");
        Ok(rows)
    }
}
