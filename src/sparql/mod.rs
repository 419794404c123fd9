//! SPARQL persistence layer.

mod executor;
mod transaction;
pub mod vocabulary;

pub use executor::{Binding, ResultBindings, SparqlExecutor};
pub use transaction::TransactionState;
