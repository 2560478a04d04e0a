//! Drives one run: fetch, group, rank, submit.

use std::thread;
use std::time::Duration;

use tracing::{error, info};

use super::criteria::{CriterionSpec, default_criteria};
use super::grouping::group_assets;
use super::parent::ParentRanking;
use super::{Asset, Stack};
use crate::error::StackError;

/// The remote service holding the assets.
pub trait AssetService {
    /// Every asset, across all pages.
    fn fetch_assets(&self) -> Result<Vec<Asset>, StackError>;

    /// Attach `child_ids` to the stack whose parent is `parent_id`.
    fn submit_stack(&self, parent_id: &str, child_ids: &[String]) -> Result<(), StackError>;
}

impl<S: AssetService + ?Sized> AssetService for &S {
    fn fetch_assets(&self) -> Result<Vec<Asset>, StackError> {
        (**self).fetch_assets()
    }

    fn submit_stack(&self, parent_id: &str, child_ids: &[String]) -> Result<(), StackError> {
        (**self).submit_stack(parent_id, child_ids)
    }
}

/// Everything a run needs besides the service.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub criteria: Vec<CriterionSpec>,
    pub skip_unmatched: bool,
    /// Only submit children that are not already stacked.
    pub skip_previous: bool,
    pub dry_run: bool,
    pub ranking: ParentRanking,
    /// Pause before each submission.
    pub submit_delay: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            criteria: default_criteria(),
            skip_unmatched: false,
            skip_previous: true,
            dry_run: false,
            ranking: ParentRanking::default(),
            submit_delay: Duration::from_millis(100),
        }
    }
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub assets: usize,
    pub groups: usize,
    /// Stacks with at least one child to submit.
    pub planned: usize,
    pub submitted: usize,
    /// Stacks whose children were all filtered out.
    pub skipped: usize,
    pub failed: usize,
}

pub struct StackRunner<S> {
    service: S,
    options: RunOptions,
}

impl<S: AssetService> StackRunner<S> {
    pub fn new(service: S, options: RunOptions) -> Self {
        StackRunner { service, options }
    }

    /// Run once over the whole library.
    ///
    /// Fails on fetch errors and criteria mismatches. Submission errors are
    /// logged and counted, and the run moves on to the next stack.
    pub fn run(&self) -> Result<RunSummary, StackError> {
        let options = &self.options;
        let mut summary = RunSummary::default();

        info!("============== INITIALIZING ==============");
        if options.dry_run {
            info!("Dry run enabled, no changes will be applied");
        }

        let assets = self.service.fetch_assets().map_err(|e| match e {
            StackError::Fetch(_) => e,
            other => StackError::Fetch(other.to_string()),
        })?;
        summary.assets = assets.len();

        let groups = group_assets(assets, &options.criteria, options.skip_unmatched)?;
        summary.groups = groups.len();
        let total = groups.len();

        for (i, group) in groups.into_iter().enumerate() {
            let Some(stack) = options.ranking.into_stack(group) else {
                continue;
            };

            let child_ids = plan_children(&stack, options.skip_previous);
            if child_ids.is_empty() {
                info!(
                    "{}/{} Key: {} SKIP! All children are already stacked",
                    i, total, stack.key
                );
                summary.skipped += 1;
                continue;
            }

            summary.planned += 1;
            log_stack(i, total, &stack);

            if options.dry_run {
                continue;
            }

            thread::sleep(options.submit_delay);
            match self.service.submit_stack(stack.parent.id(), &child_ids) {
                Ok(()) => {
                    info!("   Success!");
                    summary.submitted += 1;
                }
                Err(e) => {
                    error!("   Error! {}", e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Done: {} assets, {} groups, {} planned, {} submitted, {} skipped, {} failed",
            summary.assets,
            summary.groups,
            summary.planned,
            summary.submitted,
            summary.skipped,
            summary.failed
        );

        Ok(summary)
    }
}

/// Child ids to submit for a stack, in ranked order.
///
/// With `skip_previous`, children that already belong to a stack are left out.
pub fn plan_children(stack: &Stack, skip_previous: bool) -> Vec<String> {
    stack
        .children
        .iter()
        .filter(|child| !skip_previous || !child.is_stacked())
        .map(|child| child.id().to_string())
        .collect()
}

fn log_stack(i: usize, total: usize, stack: &Stack) {
    info!("{}/{} Key: {}", i, total, stack.key);
    info!(
        "   Parent name: {} ID: {}",
        stack.parent.original_file_name(),
        stack.parent.id()
    );
    for child in &stack.children {
        info!(
            "   Child name:  {} ID: {}",
            child.original_file_name(),
            child.id()
        );
    }
}
