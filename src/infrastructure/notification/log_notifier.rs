use super::{NotifierError, OperatorNotifier};
use async_trait::async_trait;

/// Notifier that logs alerts at `error` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl OperatorNotifier for LogNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifierError> {
        tracing::error!(subject, body, "operator alert");
        Ok(())
    }
}
