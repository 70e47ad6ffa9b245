//! Record sources.
//!
//! A [`ProductSource`] turns a query window into the ordered list of
//! product spans that must be read, resolving overlaps between products of
//! one collection and between redundant collections.

mod product;
mod record;
mod selector;

pub use product::{ProductSource, RecordIter, MAX_COLLECTIONS};
pub use record::{ProductRecord, Record};
pub use selector::{PrioritySelector, SupersedingSelector};
