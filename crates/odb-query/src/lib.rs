//! Criteria evaluation and values actions for the odb object database.
//!
//! A query streams candidate OIDs, asks a [`QueryEngine`] for each
//! candidate's attribute values, keeps the candidates a [`Criterion`]
//! accepts and feeds them to [`ValuesAction`]s.
//!
//! # Key Types
//!
//! - [`QueryEngine`] -- introspection service: OID <-> object, headers and
//!   attribute values ([`InMemoryEngine`] for tests and embedding)
//! - [`Evaluation`] -- single-attribute predicate: equals, contains,
//!   starts-with, ends-with and ordered comparison
//! - [`Criterion`] -- boolean combination of evaluations
//! - [`ValuesAction`] -- per-candidate projection or scan-wide aggregate:
//!   field, size, min, max, sum, average and count
//! - [`ValuesQuery`] -- the scan executor producing [`ObjectValues`] rows
//! - [`ClassChain`] -- candidate source walking the objects of a class
//!
//! Candidates may equally come from an index, for instance the values of a
//! [`PersistentBTree`](odb_btree::PersistentBTree) enumerator.

pub mod action;
pub mod chain;
pub mod config;
pub mod criterion;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod query;

pub use action::{
    ActionValue, AverageValueAction, CountValueAction, FieldValueAction, LazyList, MaxValueAction,
    MinValueAction, SizeValueAction, SumValueAction, ValuesAction,
};
pub use chain::ClassChain;
pub use config::QueryConfig;
pub use criterion::Criterion;
pub use engine::{InMemoryEngine, QueryEngine};
pub use error::{QueryError, QueryResult};
pub use evaluation::{
    ComparisonEvaluation, ComparisonOp, ContainsEvaluation, CriterionValue, EndsWithEvaluation,
    EqualsEvaluation, Evaluation, StartsWithEvaluation,
};
pub use query::{ObjectValues, ValuesQuery};
