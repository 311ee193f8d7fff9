//! Per-item transform of the consolidation step.

use crate::application::error::{ApplicationError, ApplicationResult};
use crate::application::services::consolidation::{
    AggregateConsolidator, ConsolidationPlan, PlanDecision, SkipReason,
};
use crate::domain::entities::Operation;
use crate::infrastructure::persistence::UserRepository;
use std::sync::Arc;

/// What the processor made of one item.
#[derive(Debug)]
pub enum Processed {
    /// Ready for the writer.
    Plan(Box<ConsolidationPlan>),
    /// Nothing to write.
    Filtered(SkipReason),
}

/// Turns operations into consolidation plans.
///
/// Besides classification, the processor checks that the owner is
/// registered, so an unknown user fails its own item instead of the whole
/// chunk at write time.
#[derive(Debug, Clone)]
pub struct OperationProcessor {
    consolidator: AggregateConsolidator,
    users: Arc<dyn UserRepository>,
}

impl OperationProcessor {
    /// Creates a processor.
    #[must_use]
    pub fn new(consolidator: AggregateConsolidator, users: Arc<dyn UserRepository>) -> Self {
        Self {
            consolidator,
            users,
        }
    }

    /// Processes one operation.
    ///
    /// # Errors
    ///
    /// - `ApplicationError::Domain` if the operation cannot be classified
    /// - `ApplicationError::MissingOwner` if its user is not registered
    /// - `ApplicationError::Repository` if the user lookup fails
    pub async fn process(&self, operation: Operation) -> ApplicationResult<Processed> {
        let user_id = operation.user_id();
        match self.consolidator.plan(operation)? {
            PlanDecision::Skip(reason) => Ok(Processed::Filtered(reason)),
            PlanDecision::Apply(plan) => {
                if self.users.find_by_id(user_id).await?.is_none() {
                    return Err(ApplicationError::MissingOwner(user_id));
                }
                Ok(Processed::Plan(plan))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::entities::operation::tests::draft;
    use crate::domain::value_objects::UserId;
    use crate::infrastructure::persistence::OperationRepository;
    use crate::infrastructure::persistence::in_memory::InMemoryStore;

    fn processor(store: &InMemoryStore) -> OperationProcessor {
        let shared = Arc::new(store.clone());
        OperationProcessor::new(AggregateConsolidator::new(shared.clone()), shared)
    }

    async fn stored(store: &InMemoryStore, movement: &str) -> Operation {
        let op = Operation::from_draft(draft(movement, 1, 100, 100)).unwrap();
        store.save(&op).await.unwrap()
    }

    #[tokio::test]
    async fn plans_registered_owner() {
        let store = InMemoryStore::new();
        store.register(UserId::new(1).unwrap()).await.unwrap();
        let op = stored(&store, "Compra").await;
        let processed = processor(&store).process(op).await.unwrap();
        assert!(matches!(processed, Processed::Plan(_)));
    }

    #[tokio::test]
    async fn unknown_owner_fails_item() {
        let store = InMemoryStore::new();
        let op = stored(&store, "Compra").await;
        let err = processor(&store).process(op).await.unwrap_err();
        assert!(matches!(err, ApplicationError::MissingOwner(_)));
    }

    #[tokio::test]
    async fn consolidated_operation_is_filtered() {
        let store = InMemoryStore::new();
        let mut op = stored(&store, "Compra").await;
        op.mark_consolidated().unwrap();
        let processed = processor(&store).process(op).await.unwrap();
        assert!(matches!(
            processed,
            Processed::Filtered(SkipReason::AlreadyConsolidated)
        ));
    }

    #[tokio::test]
    async fn unclassifiable_movement_fails_item() {
        let store = InMemoryStore::new();
        store.register(UserId::new(1).unwrap()).await.unwrap();
        let op = stored(&store, "Sorteio").await;
        assert!(processor(&store).process(op).await.unwrap_err().is_row_level());
    }
}
