use shared::domain::SessionId;
use tokio::sync::broadcast;

use crate::{context::FormRequest, controller::Outcome};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum StepEvent {
    /// The step finished: either a successful POST or a GET of a step with
    /// no fields and a next page. Sent with the outcome, before the caller
    /// turns it into a response.
    Complete {
        request: FormRequest,
        session_id: Option<SessionId>,
        outcome: Outcome,
    },
}

/// Publish/subscribe channel owned by one controller.
#[derive(Debug, Clone)]
pub struct StepEvents {
    sender: broadcast::Sender<StepEvent>,
}

impl StepEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StepEvent> {
        self.sender.subscribe()
    }

    pub(crate) fn emit(&self, event: StepEvent) {
        // No listeners is fine.
        let _ = self.sender.send(event);
    }
}

impl Default for StepEvents {
    fn default() -> Self {
        Self::new()
    }
}
