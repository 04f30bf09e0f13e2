//! Relational operators over [`crate::DataFrame`].
//!
//! Every operator takes its inputs by reference and returns a new DataFrame; inputs are
//! never modified. The [`crate::DataFrame`] methods of the same names delegate here.
//!
//! - [`filter_mask()`] / [`filter_eq()`]: row selection
//! - [`query()`]: `<column> <op> <literal>` predicates
//! - [`sort()`]: stable single-column sort, nulls last
//! - [`concat()`]: vertical union of identical schemas
//! - [`groupby_sum()`] / [`groupby_agg()`]: grouped aggregation
//! - [`join()`]: inner equi-join
//! - [`reduce()`]: count/sum/min/max/mean of one column
//!
//! ## Example: query → sort → groupby
//!
//! ```rust
//! use grizzly::column::Column;
//! use grizzly::types::Value;
//! use grizzly::DataFrame;
//!
//! let df = DataFrame::from_columns(vec![
//!     ("city", Column::Utf8(vec![Some("NY".into()), Some("LA".into()), Some("NY".into())])),
//!     ("age", Column::Int64(vec![Some(30), Some(25), Some(35)])),
//! ])
//! .unwrap();
//!
//! let adults = df.query("age >= 30").unwrap().sort("age", false).unwrap();
//! assert_eq!(adults.value(0, "age").unwrap(), Value::Int64(35));
//!
//! let by_city = df.groupby_sum("city", "age").unwrap();
//! assert_eq!(by_city.shape(), (2, 2));
//! assert_eq!(by_city.value(0, "age_sum").unwrap(), Value::Int64(65));
//! ```

pub mod concat;
pub mod filter;
pub mod groupby;
pub mod join;
pub mod query;
pub mod reduce;
pub mod sort;

pub use concat::concat;
pub use filter::{filter_eq, filter_mask};
pub use groupby::{groupby_agg, groupby_sum};
pub use join::join;
pub use query::{query, CompareOp, Predicate};
pub use reduce::{reduce, ReduceOp};
pub use sort::sort;
