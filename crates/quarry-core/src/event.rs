use crate::types::SessionId;

/// Progress of a resolution session, as observed from outside.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveEvent {
    SessionStarted {
        session_id: SessionId,
        name: String,
    },
    FactoryStarted {
        session_id: SessionId,
        name: String,
    },
    FactoryFinished {
        session_id: SessionId,
        name: String,
        elapsed_ms: u64,
    },
    FactoryFailed {
        session_id: SessionId,
        name: String,
        error: String,
    },
    /// The edge's conditions were not met, so `child` was never resolved.
    DependencySkipped {
        session_id: SessionId,
        parent: String,
        child: String,
    },
    SessionFinished {
        session_id: SessionId,
        name: String,
        succeeded: bool,
    },
}

impl ResolveEvent {
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::SessionStarted { session_id, .. }
            | Self::FactoryStarted { session_id, .. }
            | Self::FactoryFinished { session_id, .. }
            | Self::FactoryFailed { session_id, .. }
            | Self::DependencySkipped { session_id, .. }
            | Self::SessionFinished { session_id, .. } => session_id,
        }
    }
}

/// Event bus using tokio broadcast channel.
/// All subscribers receive all events.
pub struct EventBus {
    tx: tokio::sync::broadcast::Sender<ResolveEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: ResolveEvent) {
        // Ignore error if no receivers
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ResolveEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
