//! Types that represent the core data model, such as `Table`, `Roster` and `Amount`.
mod amount;
mod mapping;
mod outcome;
mod role;
mod roster;
mod table;

pub use amount::{Amount, AmountError, AmountFormat, CURRENCY_SYMBOL};
pub use mapping::{normalize, Header, Mapping};
pub use outcome::{Diagnostic, Outcome};
pub(crate) use outcome::Diagnostics;
pub use role::Role;
pub use roster::{normalize_code, Roster, Station, StationField};
pub use table::{Record, Table};
