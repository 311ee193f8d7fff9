//! Chunk writer of the consolidation step.

use crate::application::error::ApplicationResult;
use crate::application::services::consolidation::{AggregateConsolidator, ConsolidationPlan};
use crate::infrastructure::persistence::ConsolidationStore;
use std::sync::Arc;

/// Applies a whole chunk of plans in one unit of work.
///
/// Either every plan of the chunk is committed or none is.
#[derive(Debug, Clone)]
pub struct ChunkWriter {
    store: Arc<dyn ConsolidationStore>,
    consolidator: AggregateConsolidator,
}

impl ChunkWriter {
    /// Creates a writer.
    #[must_use]
    pub fn new(store: Arc<dyn ConsolidationStore>, consolidator: AggregateConsolidator) -> Self {
        Self {
            store,
            consolidator,
        }
    }

    /// Writes `chunk` and returns the number of consolidated operations.
    ///
    /// # Errors
    ///
    /// Returns the first failure; the unit is rolled back and nothing of the
    /// chunk is persisted.
    pub async fn write(&self, chunk: Vec<ConsolidationPlan>) -> ApplicationResult<usize> {
        if chunk.is_empty() {
            return Ok(0);
        }
        let size = chunk.len();
        let mut unit = self.store.begin().await?;
        for plan in chunk {
            self.consolidator.apply(unit.as_mut(), plan).await?;
        }
        unit.commit().await?;
        Ok(size)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::application::services::consolidation::PlanDecision;
    use crate::domain::entities::Operation;
    use crate::domain::entities::operation::tests::draft;
    use crate::domain::value_objects::UserId;
    use crate::infrastructure::persistence::in_memory::InMemoryStore;
    use crate::infrastructure::persistence::{OperationRepository, UserRepository};

    async fn plans(
        store: &InMemoryStore,
        consolidator: &AggregateConsolidator,
        n: usize,
    ) -> Vec<ConsolidationPlan> {
        let mut plans = Vec::new();
        for _ in 0..n {
            let op = Operation::from_draft(draft("Compra", 1, 100, 100)).unwrap();
            let op = store.save(&op).await.unwrap();
            if let PlanDecision::Apply(plan) = consolidator.plan(op).unwrap() {
                plans.push(*plan);
            }
        }
        plans
    }

    async fn setup() -> (InMemoryStore, AggregateConsolidator, ChunkWriter) {
        let store = InMemoryStore::new();
        store.register(UserId::new(1).unwrap()).await.unwrap();
        let shared = Arc::new(store.clone());
        let consolidator = AggregateConsolidator::new(shared.clone());
        let writer = ChunkWriter::new(shared, consolidator.clone());
        (store, consolidator, writer)
    }

    #[tokio::test]
    async fn commits_whole_chunk() {
        let (store, consolidator, writer) = setup().await;
        let chunk = plans(&store, &consolidator, 4).await;
        assert_eq!(writer.write(chunk).await.unwrap(), 4);
        assert_eq!(store.transaction_count().await, 4);
        assert_eq!(store.asset_count().await, 1);
        assert!(store.operations().await.iter().all(Operation::is_consolidated));
    }

    #[tokio::test]
    async fn failed_commit_persists_nothing() {
        let (store, consolidator, writer) = setup().await;
        let chunk = plans(&store, &consolidator, 3).await;
        store.fail_next_commit();
        assert!(writer.write(chunk).await.is_err());
        assert_eq!(store.transaction_count().await, 0);
        assert!(store.operations().await.iter().all(Operation::is_pending));
    }

    #[tokio::test]
    async fn empty_chunk_is_noop() {
        let (_, _, writer) = setup().await;
        assert_eq!(writer.write(Vec::new()).await.unwrap(), 0);
    }
}
