//! Types that represent the core data model, such as `Transaction` and `Amount`.
mod amount;
mod mapping;
mod transaction;

pub use amount::{Amount, AmountError, AmountFormat};
pub(crate) use amount::strip_cell;
pub use mapping::{Header, Mapping};
pub use transaction::{Transaction, TransactionField};
