use std::sync::{Arc, RwLock, RwLockWriteGuard};

use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};

use super::validation::ValidationResult;

pub type ValidationResults = Arc<[ValidationResult]>;

#[derive(Default)]
struct BroadcastState {
    latest: Option<ValidationResults>,
    subscribers: Vec<UnboundedSender<ValidationResults>>,
}

/// Fan-out of the failure list produced by every evaluation pass.
///
/// Subscribers that dropped their receiver are pruned on the next publish.
#[derive(Clone, Default)]
pub struct ResultBroadcast {
    state: Arc<RwLock<BroadcastState>>,
}

impl ResultBroadcast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> UnboundedReceiver<ValidationResults> {
        let (sender, receiver) = unbounded();
        self.write().subscribers.push(sender);
        receiver
    }

    pub fn publish(&self, results: ValidationResults) {
        let mut state = self.write();
        state
            .subscribers
            .retain(|subscriber| subscriber.unbounded_send(results.clone()).is_ok());
        state.latest = Some(results);
    }

    pub fn latest(&self) -> Option<ValidationResults> {
        match self.state.read() {
            Ok(guard) => guard.latest.clone(),
            Err(poisoned) => poisoned.into_inner().latest.clone(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.write().subscribers.len()
    }

    fn write(&self) -> RwLockWriteGuard<'_, BroadcastState> {
        match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
