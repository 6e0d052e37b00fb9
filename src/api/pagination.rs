// src/api/pagination.rs
//! Pagination that turns a sequence of listing requests into one collection.
//!
//! The API comes in two shapes: offset+limit listings, and listings that hand
//! back an opaque "next" link. Callers pick a [`PaginationStrategy`] and hand
//! over a fetch closure; which request to make next is decided here.

use super::responses::ListingResponse;
use crate::error::AppError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Position of the next listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
    /// Numeric offset into the listing.
    Offset(u32),
    /// Server-provided link to the next page.
    Link(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationStrategy {
    OffsetLimit,
    Cursor,
}

impl PaginationStrategy {
    /// Where to continue after `listing`, or `None` when the listing is exhausted.
    ///
    /// A short page always ends the listing; the cursor strategy additionally
    /// requires the server to announce a next link. A page is full when it
    /// holds as many items as the limit the server reports having applied,
    /// which may be lower than the requested `limit`.
    pub fn advance<T>(
        &self,
        current: &PageCursor,
        listing: &ListingResponse<T>,
        limit: u32,
    ) -> Option<PageCursor> {
        let returned = listing.results.len() as u32;
        let page_limit = listing.limit.filter(|applied| *applied > 0).unwrap_or(limit);
        if returned == 0 || returned < page_limit {
            return None;
        }

        match self {
            Self::OffsetLimit => {
                let offset = match current {
                    PageCursor::Offset(start) => *start,
                    PageCursor::Link(_) => listing.start.unwrap_or(0),
                };
                Some(PageCursor::Offset(offset + returned))
            }
            Self::Cursor => listing
                .links
                .next
                .as_ref()
                .filter(|next| !next.is_empty())
                .filter(|next| !matches!(current, PageCursor::Link(c) if c == *next))
                .map(|next| PageCursor::Link(next.clone())),
        }
    }
}

/// Fetches every page of a listing and merges the results in server order.
///
/// `delay` is slept between consecutive requests; waiting is abandoned with
/// [`AppError::Cancelled`] when `cancel` fires.
pub async fn fetch_all_pages<T, F, Fut>(
    strategy: PaginationStrategy,
    limit: u32,
    delay: Duration,
    cancel: &CancellationToken,
    mut fetch_fn: F,
) -> Result<Vec<T>, AppError>
where
    F: FnMut(PageCursor) -> Fut,
    Fut: std::future::Future<Output = Result<ListingResponse<T>, AppError>>,
{
    let mut all_items = Vec::new();
    let mut cursor = PageCursor::Offset(0);
    let mut pages_fetched = 0u32;

    loop {
        let listing = fetch_fn(cursor.clone()).await?;
        pages_fetched += 1;

        let next = strategy.advance(&cursor, &listing, limit);
        all_items.extend(listing.results);

        let Some(next) = next else {
            break;
        };
        cursor = next;

        if !delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(AppError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        } else if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
    }

    log::debug!(
        "Pagination finished: {} items over {} requests",
        all_items.len(),
        pages_fetched
    );
    Ok(all_items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::responses::ListingLinks;
    use parking_lot::Mutex;

    fn listing(items: Vec<u32>, next: Option<&str>) -> ListingResponse<u32> {
        ListingResponse {
            results: items,
            start: None,
            limit: None,
            size: None,
            links: ListingLinks {
                next: next.map(str::to_string),
            },
        }
    }

    #[tokio::test]
    async fn test_offset_pagination_stops_on_short_page() {
        let seen = Mutex::new(Vec::new());
        let token = CancellationToken::new();

        let items = fetch_all_pages(
            PaginationStrategy::OffsetLimit,
            2,
            Duration::ZERO,
            &token,
            |cursor| {
                seen.lock().push(cursor.clone());
                async move {
                    Ok(match cursor {
                        PageCursor::Offset(0) => listing(vec![1, 2], None),
                        PageCursor::Offset(2) => listing(vec![3, 4], None),
                        _ => listing(vec![5], None),
                    })
                }
            },
        )
        .await
        .unwrap();

        assert_eq!(items, vec![1, 2, 3, 4, 5]);
        assert_eq!(
            *seen.lock(),
            vec![
                PageCursor::Offset(0),
                PageCursor::Offset(2),
                PageCursor::Offset(4)
            ]
        );
    }

    #[tokio::test]
    async fn test_cursor_pagination_needs_next_link() {
        let token = CancellationToken::new();

        let items = fetch_all_pages(
            PaginationStrategy::Cursor,
            2,
            Duration::ZERO,
            &token,
            |cursor| async move {
                Ok(match cursor {
                    PageCursor::Offset(_) => listing(vec![1, 2], Some("/next?cursor=a")),
                    PageCursor::Link(ref l) if l == "/next?cursor=a" => listing(vec![3, 4], None),
                    PageCursor::Link(_) => listing(vec![99], None),
                })
            },
        )
        .await
        .unwrap();

        // Full page without a next link ends the listing
        assert_eq!(items, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_repeated_next_link_ends_listing() {
        let current = PageCursor::Link("/same".to_string());
        let page = listing(vec![1, 2], Some("/same"));
        assert_eq!(PaginationStrategy::Cursor.advance(&current, &page, 2), None);
    }

    #[test]
    fn test_server_capped_limit_still_counts_as_full_page() {
        let mut capped = listing(vec![1, 2, 3], None);
        capped.limit = Some(3);
        assert_eq!(
            PaginationStrategy::OffsetLimit.advance(&PageCursor::Offset(0), &capped, 50),
            Some(PageCursor::Offset(3))
        );

        capped.results.pop();
        assert_eq!(
            PaginationStrategy::OffsetLimit.advance(&PageCursor::Offset(3), &capped, 50),
            None
        );
    }

    #[tokio::test]
    async fn test_errors_propagate() {
        let token = CancellationToken::new();
        let result: Result<Vec<u32>, _> = fetch_all_pages(
            PaginationStrategy::OffsetLimit,
            2,
            Duration::ZERO,
            &token,
            |_| async { Err(AppError::MalformedResponse("boom".to_string())) },
        )
        .await;
        assert!(matches!(result, Err(AppError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_cancellation_between_pages() {
        let token = CancellationToken::new();
        let result = fetch_all_pages(
            PaginationStrategy::OffsetLimit,
            1,
            Duration::from_secs(60),
            &token,
            |_| {
                token.cancel();
                async { Ok(listing(vec![1], None)) }
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::Cancelled)));
    }
}
