//! Batch loaders filling [`Branch`] and [`Inforequest`] caches.
//!
//! Each loader issues one query per [`MAX_IDS_PER_QUERY`] distinct targets
//! (none for an empty target list). Targets are taken as an iterator of mutable
//! references, so loaders compose over nested collections:
//!
//! ```no_run
//! # use inforequests_core::db::{Store, prefetch, query::{self, ActionQuery}};
//! # use inforequests_core::model::Inforequest;
//! # fn demo(store: &Store) -> anyhow::Result<()> {
//! let mut inforequests = query::list_inforequests(store, None)?;
//! prefetch::prefetch_branches(store, inforequests.iter_mut(), None)?;
//! prefetch::prefetch_actions(
//!     store,
//!     inforequests.iter_mut().flat_map(Inforequest::branches_mut),
//!     &ActionQuery::default(),
//! )?;
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use std::collections::HashMap;

use super::{MAX_IDS_PER_QUERY, Store};
use super::query::{self, ActionQuery, BranchFilter, BranchOrder};
use crate::model::branch::Branch;
use crate::model::inforequest::Inforequest;

fn collect_targets<'b>(
    branches: impl IntoIterator<Item = &'b mut Branch>,
) -> (Vec<&'b mut Branch>, Vec<i64>) {
    let targets: Vec<&mut Branch> = branches.into_iter().collect();
    let mut ids: Vec<i64> = targets.iter().map(|branch| branch.branch_id).collect();
    ids.sort_unstable();
    ids.dedup();
    (targets, ids)
}

/// Fill the `actions` cache of every branch.
///
/// `base` narrows or reorders what is cached; the default caches every
/// action in position order. A narrowed cache is what later
/// [`Branch::actions`] calls return until the branch is invalidated.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn prefetch_actions<'b>(
    store: &Store,
    branches: impl IntoIterator<Item = &'b mut Branch>,
    base: &ActionQuery,
) -> Result<()> {
    let (targets, ids) = collect_targets(branches);
    if targets.is_empty() {
        return Ok(());
    }

    let loaded = query::load_actions(store, &ids, base)?;
    for branch in targets {
        let actions = loaded.get(&branch.branch_id).cloned().unwrap_or_default();
        branch.set_actions(actions, base.is_full());
    }
    tracing::debug!(branches = ids.len(), "prefetched branch actions");
    Ok(())
}

/// Fill the `actions_by_email` cache of every branch. The email-only
/// condition is always applied on top of `base`.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn prefetch_actions_by_email<'b>(
    store: &Store,
    branches: impl IntoIterator<Item = &'b mut Branch>,
    base: &ActionQuery,
) -> Result<()> {
    let (targets, ids) = collect_targets(branches);
    if targets.is_empty() {
        return Ok(());
    }

    let query = base.clone().with_email_only();
    let loaded = query::load_actions(store, &ids, &query)?;
    for branch in targets {
        let actions = loaded.get(&branch.branch_id).cloned().unwrap_or_default();
        branch.set_actions_by_email(actions);
    }
    tracing::debug!(branches = ids.len(), "prefetched branch email actions");
    Ok(())
}

/// Fill the `last_action` cache of every branch, fetching only the final
/// action (among those matching `base`) per branch.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn prefetch_last_action<'b>(
    store: &Store,
    branches: impl IntoIterator<Item = &'b mut Branch>,
    base: &ActionQuery,
) -> Result<()> {
    let (targets, ids) = collect_targets(branches);
    if targets.is_empty() {
        return Ok(());
    }

    let loaded = query::load_last_actions(store, &ids, base)?;
    for branch in targets {
        branch.set_last_action(loaded.get(&branch.branch_id).cloned());
    }
    tracing::debug!(branches = ids.len(), "prefetched last actions");
    Ok(())
}

/// Fill the branch cache of every inforequest.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn prefetch_branches<'i>(
    store: &Store,
    inforequests: impl IntoIterator<Item = &'i mut Inforequest>,
    order: Option<BranchOrder>,
) -> Result<()> {
    let targets: Vec<&mut Inforequest> = inforequests.into_iter().collect();
    if targets.is_empty() {
        return Ok(());
    }

    let mut ids: Vec<i64> = targets.iter().map(|ir| ir.inforequest_id).collect();
    ids.sort_unstable();
    ids.dedup();

    let mut grouped: HashMap<i64, Vec<Branch>> = HashMap::new();
    for chunk in ids.chunks(MAX_IDS_PER_QUERY) {
        let filter = BranchFilter {
            inforequest_ids: Some(chunk.to_vec()),
            order,
            ..BranchFilter::default()
        };
        for branch in query::list_branches(store, &filter)? {
            grouped.entry(branch.inforequest_id).or_default().push(branch);
        }
    }
    for inforequest in targets {
        let branches = grouped
            .get(&inforequest.inforequest_id)
            .cloned()
            .unwrap_or_default();
        inforequest.set_branches(branches);
    }
    Ok(())
}
