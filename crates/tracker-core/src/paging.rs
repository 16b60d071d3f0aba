//! Offset/limit paging and the first/prev/next/last link calculation.

use crate::error::{CoreError, Result};
use serde::Serialize;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_LIMIT: usize = 20;
/// Largest page size a caller may ask for.
pub const MAX_PAGE_LIMIT: usize = 100;

/// A requested page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

impl PageRequest {
    /// Create a page request.
    ///
    /// # Errors
    /// Returns `CoreError::BadParameter` if `limit` is zero.
    pub fn new(offset: usize, limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(CoreError::bad_parameter("limit", limit));
        }
        Ok(Self { offset, limit })
    }

    /// Build a request from raw query parameters.
    ///
    /// An offset that is missing, unparsable or negative becomes 0. A limit
    /// that is missing or not positive becomes `default_limit`, and one above
    /// `max_limit` is capped.
    #[must_use]
    pub fn from_params(
        offset: Option<&str>,
        limit: Option<i64>,
        default_limit: usize,
        max_limit: usize,
    ) -> Self {
        let offset = offset
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .and_then(|o| usize::try_from(o).ok())
            .unwrap_or(0);

        let max_limit = max_limit.max(1);
        let limit = match limit.and_then(|l| usize::try_from(l).ok()) {
            Some(0) | None => default_limit,
            Some(l) => l,
        }
        .clamp(1, max_limit);

        Self { offset, limit }
    }
}

/// A page window expressed as a start index and a size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageLink {
    pub start: usize,
    pub size: usize,
}

impl PageLink {
    #[must_use]
    pub const fn new(start: usize, size: usize) -> Self {
        Self { start, size }
    }

    /// Render as `page[offset]=..&page[limit]=..`.
    #[must_use]
    pub fn to_query(&self) -> String {
        format!("page[offset]={}&page[limit]={}", self.start, self.size)
    }
}

/// Navigation links for a list response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageLinks {
    pub first: PageLink,
    pub prev: Option<PageLink>,
    pub next: Option<PageLink>,
    pub last: PageLink,
}

/// Compute paging links for a list response.
///
/// `result_count` is the number of items actually returned for the window
/// `(offset, limit)` and `total_count` the number of items matching the
/// query overall. A `limit` of zero is treated as one.
#[must_use]
pub fn page_links(offset: usize, limit: usize, result_count: usize, total_count: usize) -> PageLinks {
    let limit = limit.max(1);

    // Sized so that paging forward from it lands on `offset`. An aligned
    // offset past 0 yields an empty first window.
    let first = if offset > 0 {
        PageLink::new(0, offset % limit)
    } else {
        PageLink::new(0, limit)
    };

    let prev = (offset > 0 && total_count > 0).then(|| {
        if offset <= total_count {
            retreat(offset, 1, limit)
        } else {
            retreat(offset, pages_past_end(offset, total_count, limit), limit)
        }
    });

    let next_start = offset + result_count;
    let next = (next_start < total_count).then(|| PageLink::new(next_start, limit));

    let last = if total_count == 0 {
        PageLink::new(0, limit)
    } else {
        let link = if offset < total_count {
            let pages = (total_count - offset - 1) / limit;
            PageLink::new(offset + pages * limit, limit)
        } else {
            retreat(offset, pages_past_end(offset, total_count, limit), limit)
        };
        PageLink::new(link.start, link.size.min(total_count - link.start))
    };

    PageLinks {
        first,
        prev,
        next,
        last,
    }
}

/// Whole pages to step back from an offset at or beyond the end so the
/// window overlaps the valid range again.
const fn pages_past_end(offset: usize, total_count: usize, limit: usize) -> usize {
    (offset - total_count) / limit + 1
}

/// Step back `pages` whole pages. A window reaching before the origin is
/// clipped to start at 0 and shrunk by the overshoot.
fn retreat(offset: usize, pages: usize, limit: usize) -> PageLink {
    let back = pages * limit;
    if back <= offset {
        PageLink::new(offset - back, limit)
    } else {
        PageLink::new(0, limit.saturating_sub(back - offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn link(start: usize, size: usize) -> PageLink {
        PageLink::new(start, size)
    }

    /// Items a store would return for a window.
    fn fetched(start: usize, size: usize, total: usize) -> usize {
        size.min(total.saturating_sub(start))
    }

    #[test]
    fn test_empty_collection() {
        let links = page_links(0, 20, 0, 0);
        assert_eq!(
            links,
            PageLinks {
                first: link(0, 20),
                prev: None,
                next: None,
                last: link(0, 20),
            }
        );
    }

    #[test]
    fn test_first_page() {
        let links = page_links(0, 20, 20, 95);
        assert_eq!(
            links,
            PageLinks {
                first: link(0, 20),
                prev: None,
                next: Some(link(20, 20)),
                last: link(80, 15),
            }
        );
    }

    #[test]
    fn test_middle_page() {
        let links = page_links(40, 20, 20, 95);
        assert_eq!(links.prev, Some(link(20, 20)));
        assert_eq!(links.next, Some(link(60, 20)));
        assert_eq!(links.last, link(80, 15));
        assert_eq!(links.first, link(0, 0));
    }

    #[test]
    fn test_final_partial_page() {
        let links = page_links(80, 20, 15, 95);
        assert_eq!(links.prev, Some(link(60, 20)));
        assert_eq!(links.next, None);
        assert_eq!(links.last, link(80, 15));
    }

    #[test]
    fn test_aligned_offset_gives_empty_first() {
        assert_eq!(page_links(20, 10, 10, 95).first, link(0, 0));
        assert_eq!(page_links(7, 7, 7, 30).first, link(0, 0));
        assert_eq!(page_links(0, 7, 7, 30).first, link(0, 7));
    }

    #[test]
    fn test_unaligned_offset() {
        let links = page_links(5, 20, 20, 95);
        assert_eq!(links.first, link(0, 5));
        assert_eq!(links.prev, Some(link(0, 5)));
        assert_eq!(links.next, Some(link(25, 20)));
        assert_eq!(links.last, link(85, 10));
    }

    #[test]
    fn test_offset_past_end() {
        let links = page_links(100, 20, 0, 95);
        assert_eq!(links.prev, Some(link(80, 20)));
        assert_eq!(links.next, None);
        assert_eq!(links.last, link(80, 15));

        let links = page_links(130, 20, 0, 95);
        assert_eq!(links.prev, Some(link(90, 20)));
        assert_eq!(links.last, link(90, 5));
    }

    #[test]
    fn test_offset_past_end_clips_at_origin() {
        let links = page_links(2, 5, 0, 1);
        assert_eq!(links.prev, Some(link(0, 2)));
        assert_eq!(links.last, link(0, 1));
    }

    #[test]
    fn test_offset_past_end_of_empty_collection() {
        let links = page_links(40, 20, 0, 0);
        assert_eq!(links.prev, None);
        assert_eq!(links.next, None);
        assert_eq!(links.last, link(0, 20));
    }

    #[test]
    fn test_links_are_deterministic() {
        assert_eq!(page_links(37, 10, 10, 200), page_links(37, 10, 10, 200));
    }

    #[test]
    fn test_link_laws_hold_exhaustively() {
        for total in 0..40 {
            for limit in 1..12 {
                for offset in 0..55 {
                    let returned = fetched(offset, limit, total);
                    let links = page_links(offset, limit, returned, total);
                    let case = format!("offset={offset} limit={limit} total={total}");

                    let last = links.last;
                    assert_eq!(
                        last.start + fetched(last.start, last.size, total),
                        total,
                        "last link misses the end: {case}"
                    );
                    assert!(last.size >= 1, "empty last link: {case}");

                    assert_eq!(links.first.start, 0, "{case}");
                    let expected_first = if offset > 0 { offset % limit } else { limit };
                    assert_eq!(links.first.size, expected_first, "{case}");

                    if let Some(prev) = links.prev {
                        assert!(offset > 0 && total > 0, "{case}");
                        assert!(prev.size >= 1, "empty prev link: {case}");
                        assert!(prev.start + prev.size <= offset, "prev overlaps current: {case}");
                    } else {
                        assert!(offset == 0 || total == 0, "missing prev link: {case}");
                    }

                    match links.next {
                        Some(next) => {
                            assert_eq!(next.start, offset + returned, "{case}");
                            assert_eq!(next.size, limit, "{case}");
                            assert!(next.start < total, "{case}");
                        }
                        None => assert!(offset + returned >= total, "missing next link: {case}"),
                    }
                }
            }
        }
    }

    #[test]
    fn test_page_request_from_params() {
        assert_eq!(
            PageRequest::from_params(None, None, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT),
            PageRequest { offset: 0, limit: 20 }
        );
        assert_eq!(
            PageRequest::from_params(Some("abc"), Some(0), 20, 100),
            PageRequest { offset: 0, limit: 20 }
        );
        assert_eq!(
            PageRequest::from_params(Some("-5"), Some(-3), 20, 100),
            PageRequest { offset: 0, limit: 20 }
        );
        assert_eq!(
            PageRequest::from_params(Some("40"), Some(500), 20, 100),
            PageRequest { offset: 40, limit: 100 }
        );
        assert!(PageRequest::new(0, 0).is_err());
    }

    #[test]
    fn test_query_rendering() {
        assert_eq!(link(80, 15).to_query(), "page[offset]=80&page[limit]=15");
    }
}
