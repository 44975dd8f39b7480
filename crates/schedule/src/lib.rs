//! # Devbench Schedule
//!
//! Incremental development scheduler: decides, once per core function, which development step
//! owns it.
//!
//! ## Architecture
//!
//! ```text
//! TraceRecord[]
//!     │
//!     ├──> collect_footprints   (drop traces whose root is absent)
//!     ├──> group_footprints     (exact core-set equality, discovery order)
//!     ├──> order_blocks         (stable, ascending core count)
//!     └──> plan_development     (claim unclaimed core nodes, number steps from 0)
//!            └─ DevelopmentStep[] + DependencyGraphRecord[]
//! ```

mod block;
mod error;
mod plan;

pub use block::{collect_footprints, group_footprints, order_blocks, ScheduleBlock, TraceFootprint};
pub use error::{Result, ScheduleError};
pub use plan::{build_schedule, collect_nodes_to_develop, plan_development, DevelopmentPlan};
