//! Paged reader over pending operations.

use crate::application::error::ApplicationResult;
use crate::domain::entities::Operation;
use crate::domain::value_objects::OperationId;
use crate::infrastructure::persistence::OperationRepository;
use std::collections::VecDeque;
use std::sync::Arc;

/// Default page size.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Yields pending operations one at a time, fetching them in pages of
/// ascending id.
///
/// The cursor is the last id handed out, so operations consolidated in the
/// meantime never shift later pages. The reader is exhausted on an empty
/// page or once the source reports no further pages.
#[derive(Debug)]
pub struct OperationReader {
    operations: Arc<dyn OperationRepository>,
    page_size: usize,
    cursor: Option<OperationId>,
    buffer: VecDeque<Operation>,
    exhausted: bool,
    pages_read: usize,
}

impl OperationReader {
    /// Creates a reader positioned before the first pending operation.
    #[must_use]
    pub fn new(operations: Arc<dyn OperationRepository>, page_size: usize) -> Self {
        Self {
            operations,
            page_size: page_size.max(1),
            cursor: None,
            buffer: VecDeque::new(),
            exhausted: false,
            pages_read: 0,
        }
    }

    /// Returns the next pending operation, or `None` once exhausted.
    ///
    /// # Errors
    ///
    /// Returns a repository error if a page fetch fails; the reader can be
    /// polled again afterwards.
    pub async fn read(&mut self) -> ApplicationResult<Option<Operation>> {
        if self.buffer.is_empty() && !self.exhausted {
            self.fetch_page().await?;
        }
        Ok(self.buffer.pop_front())
    }

    /// Returns the number of non-empty pages fetched.
    #[must_use]
    pub fn pages_read(&self) -> usize {
        self.pages_read
    }

    /// Returns true once the source has no further items.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted && self.buffer.is_empty()
    }

    async fn fetch_page(&mut self) -> ApplicationResult<()> {
        let page = self
            .operations
            .find_pending_page(self.cursor, self.page_size)
            .await?;
        if page.items.is_empty() {
            self.exhausted = true;
            return Ok(());
        }
        if let Some(last) = page.items.last().and_then(Operation::id) {
            self.cursor = Some(last);
        }
        self.exhausted = !page.has_next;
        self.pages_read += 1;
        tracing::debug!(
            items = page.items.len(),
            has_next = page.has_next,
            cursor = ?self.cursor,
            "page read"
        );
        self.buffer.extend(page.items);
        Ok(())
    }
}
