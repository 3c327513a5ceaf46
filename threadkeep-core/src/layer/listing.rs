//! Thread listing with offset cursors, and cross-thread step searches
//!
//! The cursor is the decimal offset of the page's first item in the full
//! sorted result set. Each page re-runs the query; there is no server-side
//! continuation.

use std::collections::HashSet;
use tracing::debug;

use super::{decode_all, DocumentDataLayer};
use crate::storage::error::{AdapterResult, ValidationError};
use crate::storage::handle::CollectionKind;
use crate::storage::ids::UserId;
use crate::storage::traits::{Query, SortOrder};
use crate::storage::types::{
    PageInfo, PaginatedResponse, Pagination, StepDict, ThreadFilter, ThreadRecord, ThreadSummary,
};

fn start_offset(pagination: &Pagination) -> Result<usize, ValidationError> {
    if pagination.first == 0 {
        return Err(ValidationError::InvalidPageSize);
    }
    match pagination.cursor.as_deref() {
        None | Some("") => Ok(0),
        Some(cursor) => cursor
            .parse()
            .map_err(|_| ValidationError::InvalidCursor(cursor.to_string())),
    }
}

/// Slice one page out of a fully sorted result set.
///
/// `hasNextPage` holds exactly when items remain past the page; the end
/// cursor is then the offset of the next page.
pub fn paginate<T>(items: Vec<T>, pagination: &Pagination) -> Result<PaginatedResponse<T>, ValidationError> {
    let start = start_offset(pagination)?;
    let end = start.saturating_add(pagination.first);
    let has_next_page = items.len() > end;

    let data = items
        .into_iter()
        .skip(start)
        .take(pagination.first)
        .collect();

    Ok(PaginatedResponse {
        data,
        page_info: PageInfo {
            has_next_page,
            start_cursor: pagination.cursor.clone(),
            end_cursor: has_next_page.then(|| end.to_string()),
        },
    })
}

impl DocumentDataLayer {
    pub(super) async fn page_threads(
        &self,
        pagination: &Pagination,
        filter: &ThreadFilter,
    ) -> AdapterResult<PaginatedResponse<ThreadSummary>> {
        // Reject a bad cursor before touching the store
        start_offset(pagination)?;
        debug!(
            user_id = %filter.user_id,
            cursor = ?pagination.cursor,
            "Listing threads"
        );

        let threads = self.collection(CollectionKind::Threads)?;
        let mut query = Query::cross_partition().eq("userId", filter.user_id.as_str());
        if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
            query = query.contains_ignore_case("name", search);
        }
        let query = query.order_by("createdAt", SortOrder::Desc);

        let records: Vec<ThreadRecord> = decode_all(CollectionKind::Threads, threads.query(&query).await?);
        let summaries = records.into_iter().map(ThreadSummary::from).collect();
        let page = paginate(summaries, pagination)?;

        debug!(
            user_id = %filter.user_id,
            count = page.data.len(),
            has_next_page = page.page_info.has_next_page,
            "Listed threads"
        );
        Ok(page)
    }

    /// Favorite steps from every thread the user owns, newest first
    pub(super) async fn favorite_steps(&self, user_id: &UserId) -> AdapterResult<Vec<StepDict>> {
        debug!(user_id = %user_id, "Retrieving favorite steps");
        let threads = self.collection(CollectionKind::Threads)?;
        let owned: Vec<ThreadRecord> = decode_all(
            CollectionKind::Threads,
            threads
                .query(&Query::cross_partition().eq("userId", user_id.as_str()))
                .await?,
        );
        if owned.is_empty() {
            return Ok(Vec::new());
        }
        let owned: HashSet<_> = owned.into_iter().map(|t| t.id).collect();

        let steps = self.collection(CollectionKind::Steps)?;
        let query = Query::cross_partition()
            .eq("metadata.favorite", true)
            .order_by("createdAt", SortOrder::Desc);
        let favorites: Vec<StepDict> = decode_all(CollectionKind::Steps, steps.query(&query).await?);

        let favorites: Vec<StepDict> = favorites
            .into_iter()
            .filter(|step| owned.contains(&step.thread_id))
            .collect();
        debug!(user_id = %user_id, count = favorites.len(), "Retrieved favorite steps");
        Ok(favorites)
    }
}
