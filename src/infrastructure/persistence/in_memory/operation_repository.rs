//! # In-Memory Operation Repository
//!
//! [`OperationRepository`] over the [`InMemoryStore`]. Ids are assigned from
//! a counter, so id order is insertion order.

use crate::domain::entities::Operation;
use crate::domain::value_objects::{OperationId, OriginalId, UserId};
use crate::infrastructure::persistence::in_memory::store::InMemoryStore;
use crate::infrastructure::persistence::traits::{
    OperationRepository, Page, RepositoryError, RepositoryResult,
};
use async_trait::async_trait;
use std::ops::Bound;

fn same_source(op: &Operation, original_id: &OriginalId, user_id: UserId) -> bool {
    op.user_id() == user_id && op.original_id() == Some(original_id)
}

#[async_trait]
impl OperationRepository for InMemoryStore {
    async fn save(&self, operation: &Operation) -> RepositoryResult<Operation> {
        let mut state = self.state.lock().await;
        let mut stored = operation.clone();
        match operation.id() {
            Some(id) => {
                let slot = state
                    .operations
                    .get_mut(&id)
                    .ok_or_else(|| RepositoryError::not_found("Operation", id.to_string()))?;
                *slot = stored.clone();
            }
            None => {
                state.last_operation_id += 1;
                let id = OperationId::new(state.last_operation_id);
                stored.set_id(id);
                state.operations.insert(id, stored.clone());
            }
        }
        Ok(stored)
    }

    async fn insert_flagging_duplicate(
        &self,
        operation: &Operation,
    ) -> RepositoryResult<Operation> {
        if let Some(id) = operation.id() {
            return Err(RepositoryError::query(format!("operation {id} is already stored")));
        }
        let mut state = self.state.lock().await;
        let mut stored = operation.clone();
        if let Some(original_id) = operation.original_id() {
            let user_id = operation.user_id();
            let mut matches = state
                .operations
                .values()
                .filter(|op| same_source(op, original_id, user_id))
                .peekable();
            if matches.peek().is_some() {
                let original = matches.find(|op| !op.is_duplicate()).and_then(Operation::id);
                stored
                    .mark_duplicate(original)
                    .map_err(|e| RepositoryError::query(e.to_string()))?;
            }
        }
        state.last_operation_id += 1;
        let id = OperationId::new(state.last_operation_id);
        stored.set_id(id);
        state.operations.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: OperationId) -> RepositoryResult<Option<Operation>> {
        let state = self.state.lock().await;
        Ok(state.operations.get(&id).cloned())
    }

    async fn exists_by_original_id_and_user(
        &self,
        original_id: &OriginalId,
        user_id: UserId,
    ) -> RepositoryResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .operations
            .values()
            .any(|op| same_source(op, original_id, user_id)))
    }

    async fn find_by_original_id_and_user(
        &self,
        original_id: &OriginalId,
        user_id: UserId,
    ) -> RepositoryResult<Option<Operation>> {
        let state = self.state.lock().await;
        Ok(state
            .operations
            .values()
            .find(|op| !op.is_duplicate() && same_source(op, original_id, user_id))
            .cloned())
    }

    async fn find_pending_page(
        &self,
        after: Option<OperationId>,
        limit: usize,
    ) -> RepositoryResult<Page<Operation>> {
        if limit == 0 {
            return Ok(Page::empty());
        }
        let state = self.state.lock().await;
        let lower = after.map_or(Bound::Unbounded, Bound::Excluded);
        let mut items: Vec<Operation> = state
            .operations
            .range((lower, Bound::Unbounded))
            .map(|(_, op)| op)
            .filter(|op| op.is_pending())
            .take(limit + 1)
            .cloned()
            .collect();
        let has_next = items.len() > limit;
        items.truncate(limit);
        Ok(Page { items, has_next })
    }

    async fn count_by_user(&self, user_id: UserId) -> RepositoryResult<u64> {
        let state = self.state.lock().await;
        Ok(state
            .operations
            .values()
            .filter(|op| op.user_id() == user_id)
            .count() as u64)
    }
}
