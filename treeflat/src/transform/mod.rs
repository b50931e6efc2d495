//! Hierarchy transformation.
//!
//! - `fill`: restore sparse ancestor levels
//! - `range`: leaf range expressions
//! - `expand`: one row per leaf member
//! - `pipeline`: load, fill, expand, store

pub mod expand;
pub mod fill;
pub mod pipeline;
pub mod range;

pub use expand::{denormalize, execute, plan, Expansion, ExpansionReport, Plan, Step};
pub use fill::{fill, FillReport, Filled};
pub use pipeline::*;
pub use range::{parse_range, range_size, RangeExpr};
