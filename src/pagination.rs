//! Cursor tracking for paged collections.
//!
//! Platforms address pages in one of two ways: a numeric offset (Spotify) or
//! an opaque continuation token handed out by the server (YouTube). A
//! [`PageCursor`] carries the scheme chosen for its platform and never mixes
//! the two. [`Paginator`] drives the cursor through fetches owned by one view.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use tracing::debug;

/// Addressing scheme of a paged collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PagingMode {
    Offset,
    Token,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    pub fn as_str(&self) -> &'static str {
        match self {
            Order::Asc => "asc",
            Order::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sort {
    pub by: String,
    pub order: Order,
}

impl Sort {
    pub fn new(by: impl Into<String>, order: Order) -> Self {
        Self {
            by: by.into(),
            order,
        }
    }
}

/// Where a page starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PageAddress {
    Offset(u64),
    /// `None` addresses the first page.
    Token(Option<String>),
}

/// Parameters of one page request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageQuery {
    pub limit: u32,
    pub address: PageAddress,
    pub sort: Option<Sort>,
}

impl PageQuery {
    /// Query for the first page of a collection.
    pub fn first(mode: PagingMode, limit: u32, sort: Option<Sort>) -> Self {
        let address = match mode {
            PagingMode::Offset => PageAddress::Offset(0),
            PagingMode::Token => PageAddress::Token(None),
        };
        Self {
            limit,
            address,
            sort,
        }
    }

    /// Query-string pairs understood by the collection endpoints.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("limit", self.limit.to_string())];
        match &self.address {
            PageAddress::Offset(offset) => pairs.push(("offset", offset.to_string())),
            PageAddress::Token(Some(token)) => pairs.push(("page_token", token.clone())),
            PageAddress::Token(None) => {}
        }
        if let Some(sort) = &self.sort {
            pairs.push(("sort_by", sort.by.clone()));
            pairs.push(("order", sort.order.as_str().to_string()));
        }
        pairs
    }
}

impl fmt::Display for PageQuery {
    /// Stable textual form, used to build cache keys.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "limit={}", self.limit)?;
        match &self.address {
            PageAddress::Offset(offset) => write!(f, ":offset={offset}")?,
            PageAddress::Token(Some(token)) => {
                write!(f, ":token={}", urlencoding::encode(token))?
            }
            PageAddress::Token(None) => write!(f, ":token=")?,
        }
        if let Some(sort) = &self.sort {
            write!(
                f,
                ":sort={}.{}",
                urlencoding::encode(&sort.by),
                sort.order.as_str()
            )?;
        }
        Ok(())
    }
}

/// One page of a collection, as returned by the collection endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub prev_page_token: Option<String>,
    #[serde(default)]
    pub has_more: Option<bool>,
    #[serde(default)]
    pub has_previous: Option<bool>,
    #[serde(default)]
    pub total: Option<u64>,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self {
            data,
            offset: None,
            next_page_token: None,
            prev_page_token: None,
            has_more: None,
            has_previous: None,
            total: None,
        }
    }
}

/// Position inside a collection, in the addressing scheme of its platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    Offset {
        offset: u64,
    },
    Token {
        /// Token of the page currently shown; `None` for the first page.
        current: Option<String>,
        next: Option<String>,
        previous: Option<String>,
    },
}

impl Cursor {
    fn initial(mode: PagingMode) -> Self {
        match mode {
            PagingMode::Offset => Cursor::Offset { offset: 0 },
            PagingMode::Token => Cursor::Token {
                current: None,
                next: None,
                previous: None,
            },
        }
    }

    pub fn mode(&self) -> PagingMode {
        match self {
            Cursor::Offset { .. } => PagingMode::Offset,
            Cursor::Token { .. } => PagingMode::Token,
        }
    }
}

/// Cursor state of one collection view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    cursor: Cursor,
    page_size: u32,
    has_next: bool,
    has_previous: bool,
    total: u64,
    loaded: bool,
}

impl PageCursor {
    pub fn new(mode: PagingMode, page_size: u32) -> Self {
        Self {
            cursor: Cursor::initial(mode),
            page_size: page_size.max(1),
            has_next: false,
            has_previous: false,
            total: 0,
            loaded: false,
        }
    }

    pub fn mode(&self) -> PagingMode {
        self.cursor.mode()
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn has_next(&self) -> bool {
        self.has_next
    }

    pub fn has_previous(&self) -> bool {
        self.has_previous
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Back to the zero state, keeping mode and page size.
    pub fn reset(&mut self) {
        *self = Self::new(self.mode(), self.page_size);
    }

    pub fn first_query(&self, sort: Option<Sort>) -> PageQuery {
        PageQuery::first(self.mode(), self.page_size, sort)
    }

    /// Query for the next page, or `None` when there is no next page.
    pub fn next_query(&self, sort: Option<Sort>) -> Option<PageQuery> {
        if !self.has_next {
            return None;
        }
        let address = match &self.cursor {
            Cursor::Offset { offset } => {
                PageAddress::Offset(offset.saturating_add(u64::from(self.page_size)))
            }
            Cursor::Token { next, .. } => PageAddress::Token(Some(next.clone()?)),
        };
        Some(PageQuery {
            limit: self.page_size,
            address,
            sort,
        })
    }

    /// Query for the previous page, or `None` when there is no previous page.
    ///
    /// A token collection whose server did not hand out a previous-page token
    /// cannot step back one page; the query then addresses the first page.
    pub fn previous_query(&self, sort: Option<Sort>) -> Option<PageQuery> {
        if !self.has_previous {
            return None;
        }
        let address = match &self.cursor {
            Cursor::Offset { offset } => {
                PageAddress::Offset(offset.saturating_sub(u64::from(self.page_size)))
            }
            Cursor::Token { previous, .. } => {
                if previous.is_none() {
                    debug!("no previous page token, falling back to the first page");
                }
                PageAddress::Token(previous.clone())
            }
        };
        Some(PageQuery {
            limit: self.page_size,
            address,
            sort,
        })
    }

    /// Replaces the cursor with the position described by a fetched page.
    pub fn apply<T>(&mut self, query: &PageQuery, page: &Page<T>) {
        match (&mut self.cursor, &query.address) {
            (Cursor::Offset { offset }, PageAddress::Offset(requested)) => {
                *offset = page.offset.unwrap_or(*requested);
                let shown = offset.saturating_add(page.data.len() as u64);
                self.has_next = page
                    .has_more
                    .unwrap_or_else(|| page.total.is_some_and(|total| shown < total));
                self.has_previous = page.has_previous.unwrap_or(*offset > 0);
            }
            (
                Cursor::Token {
                    current,
                    next,
                    previous,
                },
                PageAddress::Token(requested),
            ) => {
                *current = requested.clone();
                *next = page.next_page_token.clone();
                *previous = page.prev_page_token.clone();
                self.has_next = next.is_some() && page.has_more.unwrap_or(true);
                self.has_previous = page
                    .has_previous
                    .unwrap_or(previous.is_some() || current.is_some());
            }
            (cursor, address) => {
                debug!(?cursor, ?address, "page query does not match cursor mode, ignored");
                return;
            }
        }
        self.total = page.total.unwrap_or(0);
        self.loaded = true;
    }
}

/// Drives a [`PageCursor`] through first/next/previous fetches.
///
/// The fetch function is injected per call, so the paginator owns only
/// cursor state. Transitions that are not currently possible (next with no
/// next page, previous on the first page) do nothing and fetch nothing.
#[derive(Debug, Clone)]
pub struct Paginator {
    cursor: PageCursor,
    sort: Option<Sort>,
}

impl Paginator {
    pub fn new(mode: PagingMode, page_size: u32) -> Self {
        Self {
            cursor: PageCursor::new(mode, page_size),
            sort: None,
        }
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    pub fn sort(&self) -> Option<&Sort> {
        self.sort.as_ref()
    }

    pub fn reset(&mut self) {
        self.cursor.reset();
    }

    /// Changes the sort order. Cursors of the old order are dropped.
    pub fn set_sort(&mut self, sort: Option<Sort>) {
        if self.sort != sort {
            self.sort = sort;
            self.cursor.reset();
        }
    }

    /// Switches to another addressing scheme, e.g. when the platform changes.
    pub fn switch_mode(&mut self, mode: PagingMode) {
        self.cursor = PageCursor::new(mode, self.cursor.page_size());
    }

    /// Fetches the first page and replaces the cursor with its position.
    pub async fn load_first<T, E, F, Fut>(&mut self, fetch: F) -> Result<Page<T>, E>
    where
        F: FnOnce(PageQuery) -> Fut,
        Fut: Future<Output = Result<Page<T>, E>>,
    {
        let query = self.cursor.first_query(self.sort.clone());
        self.run(query, fetch).await
    }

    /// Fetches the next page. `Ok(None)` means there was nothing to fetch.
    pub async fn load_next<T, E, F, Fut>(&mut self, fetch: F) -> Result<Option<Page<T>>, E>
    where
        F: FnOnce(PageQuery) -> Fut,
        Fut: Future<Output = Result<Page<T>, E>>,
    {
        match self.cursor.next_query(self.sort.clone()) {
            Some(query) => self.run(query, fetch).await.map(Some),
            None => Ok(None),
        }
    }

    /// Fetches the previous page. `Ok(None)` means there was nothing to fetch.
    pub async fn load_previous<T, E, F, Fut>(&mut self, fetch: F) -> Result<Option<Page<T>>, E>
    where
        F: FnOnce(PageQuery) -> Fut,
        Fut: Future<Output = Result<Page<T>, E>>,
    {
        match self.cursor.previous_query(self.sort.clone()) {
            Some(query) => self.run(query, fetch).await.map(Some),
            None => Ok(None),
        }
    }

    async fn run<T, E, F, Fut>(&mut self, query: PageQuery, fetch: F) -> Result<Page<T>, E>
    where
        F: FnOnce(PageQuery) -> Fut,
        Fut: Future<Output = Result<Page<T>, E>>,
    {
        let page = fetch(query.clone()).await?;
        self.cursor.apply(&query, &page);
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    type Fetched = RefCell<Vec<PageQuery>>;

    async fn serve(
        seen: &Fetched,
        query: PageQuery,
        page: Page<u32>,
    ) -> Result<Page<u32>, String> {
        seen.borrow_mut().push(query);
        Ok(page)
    }

    fn offset_page(offset: u64, len: u32, total: u64) -> Page<u32> {
        let mut page = Page::new((0..len).collect());
        page.offset = Some(offset);
        page.total = Some(total);
        page
    }

    #[tokio::test]
    async fn test_load_next_without_next_page_is_noop() {
        let seen = Fetched::default();
        let mut paginator = Paginator::new(PagingMode::Token, 20);
        paginator
            .load_first(|q| serve(&seen, q, Page::new(vec![1, 2])))
            .await
            .unwrap();
        let before = paginator.cursor().clone();
        assert!(!before.has_next());

        let result = paginator
            .load_next(|q| serve(&seen, q, Page::new(vec![3])))
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(paginator.cursor(), &before);
    }

    #[tokio::test]
    async fn test_next_page_token_is_forwarded() {
        let seen = Fetched::default();
        let mut paginator = Paginator::new(PagingMode::Token, 20);

        let mut first = Page::new(vec![1, 2]);
        first.next_page_token = Some("abc".to_string());
        paginator.load_first(|q| serve(&seen, q, first)).await.unwrap();
        assert!(paginator.cursor().has_next());
        assert!(!paginator.cursor().has_previous());

        paginator
            .load_next(|q| serve(&seen, q, Page::new(vec![3])))
            .await
            .unwrap();

        let seen = seen.borrow();
        assert_eq!(seen[1].address, PageAddress::Token(Some("abc".to_string())));
        assert!(seen[1].query_pairs().contains(&("page_token", "abc".to_string())));
    }

    #[tokio::test]
    async fn test_token_previous_falls_back_to_first_page() {
        let seen = Fetched::default();
        let mut paginator = Paginator::new(PagingMode::Token, 10);

        let mut first = Page::new(vec![1]);
        first.next_page_token = Some("p2".to_string());
        paginator.load_first(|q| serve(&seen, q, first)).await.unwrap();
        paginator
            .load_next(|q| serve(&seen, q, Page::new(vec![2])))
            .await
            .unwrap();
        // on page two without a previous token from the server
        assert!(paginator.cursor().has_previous());

        paginator
            .load_previous(|q| serve(&seen, q, Page::new(vec![1])))
            .await
            .unwrap();
        assert_eq!(seen.borrow()[2].address, PageAddress::Token(None));
    }

    #[tokio::test]
    async fn test_token_previous_uses_server_token() {
        let seen = Fetched::default();
        let mut paginator = Paginator::new(PagingMode::Token, 10);

        let mut third = Page::new(vec![3]);
        third.prev_page_token = Some("p2".to_string());
        paginator.load_first(|q| serve(&seen, q, third)).await.unwrap();

        paginator
            .load_previous(|q| serve(&seen, q, Page::new(vec![2])))
            .await
            .unwrap();
        assert_eq!(
            seen.borrow()[1].address,
            PageAddress::Token(Some("p2".to_string()))
        );
    }

    #[tokio::test]
    async fn test_offset_navigation() {
        let seen = Fetched::default();
        let mut paginator = Paginator::new(PagingMode::Offset, 20)
            .with_sort(Sort::new("name", Order::Asc));

        paginator
            .load_first(|q| serve(&seen, q, offset_page(0, 20, 45)))
            .await
            .unwrap();
        assert!(paginator.cursor().has_next());
        assert!(!paginator.cursor().has_previous());
        assert_eq!(paginator.cursor().total(), 45);

        paginator
            .load_next(|q| serve(&seen, q, offset_page(20, 20, 45)))
            .await
            .unwrap();
        paginator
            .load_next(|q| serve(&seen, q, offset_page(40, 5, 45)))
            .await
            .unwrap();
        assert!(!paginator.cursor().has_next());
        assert!(paginator.cursor().has_previous());

        paginator
            .load_previous(|q| serve(&seen, q, offset_page(20, 20, 45)))
            .await
            .unwrap();

        let addresses: Vec<_> = seen.borrow().iter().map(|q| q.address.clone()).collect();
        assert_eq!(
            addresses,
            vec![
                PageAddress::Offset(0),
                PageAddress::Offset(20),
                PageAddress::Offset(40),
                PageAddress::Offset(20),
            ]
        );
        assert_eq!(
            seen.borrow()[0].query_pairs(),
            vec![
                ("limit", "20".to_string()),
                ("offset", "0".to_string()),
                ("sort_by", "name".to_string()),
                ("order", "asc".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_offset_near_max_does_not_overflow() {
        let seen = Fetched::default();
        let mut paginator = Paginator::new(PagingMode::Offset, 20);

        let mut page = offset_page(u64::MAX - 5, 3, u64::MAX);
        page.has_more = Some(true);
        paginator.load_first(|q| serve(&seen, q, page)).await.unwrap();

        paginator
            .load_next(|q| serve(&seen, q, offset_page(u64::MAX, 0, u64::MAX)))
            .await
            .unwrap();
        assert_eq!(seen.borrow()[1].address, PageAddress::Offset(u64::MAX));
    }

    #[tokio::test]
    async fn test_previous_on_first_page_is_noop() {
        let seen = Fetched::default();
        let mut paginator = Paginator::new(PagingMode::Offset, 20);

        let result = paginator
            .load_previous(|q| serve(&seen, q, offset_page(0, 1, 1)))
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(seen.borrow().is_empty());
        assert!(!paginator.cursor().is_loaded());
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_cursor() {
        let mut paginator = Paginator::new(PagingMode::Offset, 20);
        paginator
            .load_first(|_| async { Ok::<_, String>(offset_page(0, 20, 100)) })
            .await
            .unwrap();
        let before = paginator.cursor().clone();

        let result = paginator
            .load_next(|_| async { Err::<Page<u32>, _>("boom".to_string()) })
            .await;
        assert_eq!(result, Err("boom".to_string()));
        assert_eq!(paginator.cursor(), &before);
    }

    #[tokio::test]
    async fn test_sort_change_and_reset_return_to_initial_state() {
        let mut paginator = Paginator::new(PagingMode::Offset, 20);
        paginator
            .load_first(|_| async { Ok::<_, String>(offset_page(0, 20, 100)) })
            .await
            .unwrap();
        assert!(paginator.cursor().is_loaded());

        paginator.set_sort(Some(Sort::new("created_at", Order::Desc)));
        assert_eq!(paginator.cursor(), &PageCursor::new(PagingMode::Offset, 20));

        paginator
            .load_first(|_| async { Ok::<_, String>(offset_page(0, 20, 100)) })
            .await
            .unwrap();
        paginator.reset();
        assert!(!paginator.cursor().is_loaded());
        assert!(!paginator.cursor().has_next());
        assert_eq!(paginator.cursor().total(), 0);

        paginator.switch_mode(PagingMode::Token);
        assert_eq!(paginator.cursor().mode(), PagingMode::Token);
    }

    #[test]
    fn test_query_display_is_stable() {
        let query = PageQuery {
            limit: 50,
            address: PageAddress::Token(Some("a b".to_string())),
            sort: Some(Sort::new("name", Order::Desc)),
        };
        assert_eq!(query.to_string(), "limit=50:token=a%20b:sort=name.desc");
        assert_eq!(
            PageQuery::first(PagingMode::Offset, 20, None).to_string(),
            "limit=20:offset=0"
        );
    }
}
