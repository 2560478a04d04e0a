#![deny(clippy::all)]

pub mod config;
pub mod error;
pub mod immich;
pub mod logging;
pub mod stacking;

pub use error::StackError;
pub use stacking::criteria::{CriterionSpec, default_criteria, parse_criteria, resolve_key};
pub use stacking::grouping::group_assets;
pub use stacking::parent::ParentRanking;
pub use stacking::runner::{AssetService, RunOptions, RunSummary, StackRunner};
pub use stacking::{Asset, CriteriaKey, Group, KeyPart, Stack, Timestamp};
