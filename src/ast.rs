//! # Sieve Query Language - Token Model
//!
//! This module defines the parsed form of a sieve query: a flat list of
//! [`Token`]s, some of which (groups, nested filters, paging) own child tokens.
//!
//! ## Architecture Overview
//!
//! - **[tokens]** - the [`Token`] enum, [`TokenKind`] and per-token [`Annotations`]
//! - **[operators]** - operator and mode enums shared by several tokens
//! - **[filters]** - row-restricting tokens (comparison, is, in, date range, array, group, nested filter)
//! - **[paging]** - projection, ordering, limits and metadata requests
//! - **[display]** - serialization back to query-string form, including the canonical form
//!
//! ## Quick Start
//!
//! ```text
//! status=eq.open&or=(amount.gt.100,tags.incl(vip))&paging=(sort(created.desc),limit.20)
//! ```
//!
//! This query keeps open orders that are either large or tagged `vip`, newest first,
//! twenty per page.
//!
//! ## Nesting Levels
//!
//! Top-level fragments (level 1) are joined with `&` and use assignment syntax,
//! `field=op.value`. Anything inside a group, nested filter or paging envelope is
//! level 2 or deeper, joined with `,`, and uses dot syntax, `field.op.value`:
//!
//! ```text
//! name=eq.Alice                      level 1
//! and=(name.eq.Alice,age.gt.30)      level 1 group, level 2 children
//! ```
//!
//! ## Scoping
//!
//! Children of a nested filter address fields inside an embedded JSON column. The
//! path is recorded on each child's [`Annotations::json_path`] when the nested filter
//! is built, so later stages never need to track scope themselves.
pub mod display;
pub mod filters;
pub mod operators;
pub mod paging;
pub mod tokens;

pub use display::canonical_query;
pub use filters::{ArrayOperation, Comparison, DateRange, Group, InToken, IsToken, NestedFilter};
pub use operators::{
    ArrayMode, ComparisonOperator, DateRangeOperator, DateUnit, InMode, IsValue,
    NestingOperator, SortDirection,
};
pub use paging::{
    Cursor, KEY_PLACEHOLDER, Limit, MetaInclude, Paging, Select, ShowCount, Sort, SortField,
};
pub use tokens::{Annotations, Token, TokenKind};
