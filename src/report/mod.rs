//! The reporting pipeline: resolve columns, merge sources, then aggregate per station and extract
//! high-value shipments.
//!
//! Every stage is a plain synchronous function over in-memory tables. Reading and writing
//! worksheets happens in `commands`.

pub mod aggregate;
pub mod high_value;
pub mod html;
pub mod merge;
pub mod resolver;
pub mod summary;

pub use aggregate::{
    aggregate, AggregateRow, CategoryAmount, CategoryRule, CategoryRules, HubExclusion, RowLabel,
};
pub use high_value::{extract, HighValueRecord};
pub use merge::{merge, MergedRow, MergedTable, Source, SOURCE_HEADER};
pub use resolver::{resolve, ColumnRules, Matcher, Resolution, RoleRules};
pub use summary::{build_summary, SortOrder, TOTAL_LABEL};
