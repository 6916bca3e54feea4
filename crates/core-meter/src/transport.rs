use shared_types::{TransportEvent, TransportState};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("invalid transport transition from {from:?} with {event:?}")]
    InvalidTransition {
        from: TransportState,
        event: TransportEvent,
    },
}

#[derive(Debug, Clone, Default)]
pub struct TransportMachine {
    state: TransportState,
}

impl TransportMachine {
    pub fn new() -> Self {
        Self {
            state: TransportState::Idle,
        }
    }

    pub fn current(&self) -> TransportState {
        self.state
    }

    /// State `event` would lead to, without moving the machine.
    pub fn next_state(&self, event: TransportEvent) -> Result<TransportState, TransportError> {
        use TransportEvent as E;
        use TransportState as S;

        let next = match (self.state, event) {
            (S::Idle | S::Scheduled, E::Schedule) => S::Scheduled,
            (S::Scheduled | S::Paused, E::Play) => S::Playing,
            (S::Playing, E::Pause) => S::Paused,
            (S::Scheduled | S::Playing | S::Paused | S::Seeking, E::Stop) => S::Idle,
            (S::Idle | S::Scheduled | S::Playing | S::Paused, E::BeginSeek) => S::Seeking,
            (S::Seeking, E::EndSeek { resume: true }) => S::Playing,
            (S::Seeking, E::EndSeek { resume: false }) => S::Scheduled,
            (S::Playing, E::Finish) => S::Idle,
            (_, E::Reset) => S::Idle,
            (from, event) => return Err(TransportError::InvalidTransition { from, event }),
        };
        Ok(next)
    }

    pub fn apply(&mut self, event: TransportEvent) -> Result<TransportState, TransportError> {
        self.state = self.next_state(event)?;
        Ok(self.state)
    }
}
