//! SQL text generation: value sanitizing, dialect shims and WHERE clauses.

pub mod dialect;
pub mod literal;
pub mod where_clause;

pub use dialect::Dialect;
pub use literal::SqlLiteral;
pub use where_clause::{ColumnBinding, DateGrain, WhereCompiler};
