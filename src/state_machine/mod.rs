//! Agent state machine: `IdleListening -> ReceivingSpeech -> Thinking ->
//! WaitingForChannelClear -> Transmitting`. The half-duplex invariant
//! (transmit only from `Transmitting`) is enforced by construction: callers
//! outside this module never see a way to transmit without passing through
//! it.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    IdleListening,
    ReceivingSpeech,
    Thinking,
    WaitingForChannelClear,
    Transmitting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    SpeechStart,
    SpeechEndNoPending,
    SpeechEndPendingTx,
    /// Wake-word mode, phrase absent from the transcript: go straight back
    /// to listening instead of `Thinking` — there is nothing to respond to.
    SpeechEndWakeWordIdle,
    ResponseReady,
    ChannelClear,
    PlaybackComplete,
}

pub struct StateMachine {
    state: AgentState,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: AgentState::IdleListening,
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    /// Apply an event. Returns the new state; events not valid for the
    /// current state are ignored (state is left unchanged).
    pub fn apply(&mut self, event: StateEvent) -> AgentState {
        use AgentState::*;
        use StateEvent::*;

        self.state = match (self.state, event) {
            (IdleListening, SpeechStart) => ReceivingSpeech,
            (ReceivingSpeech, SpeechEndNoPending) => Thinking,
            (ReceivingSpeech, SpeechEndPendingTx) => WaitingForChannelClear,
            (ReceivingSpeech, SpeechEndWakeWordIdle) => IdleListening,
            (Thinking, ResponseReady) => Transmitting,
            (IdleListening, ResponseReady) => WaitingForChannelClear,
            (WaitingForChannelClear, SpeechStart) => ReceivingSpeech,
            (WaitingForChannelClear, ChannelClear) => Transmitting,
            (Transmitting, PlaybackComplete) => IdleListening,
            (Transmitting, SpeechStart) => ReceivingSpeech,
            (state, _) => state,
        };
        self.state
    }

    /// True only in the state that's allowed to push audio to the device.
    pub fn can_transmit(&self) -> bool {
        self.state == AgentState::Transmitting
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        let sm = StateMachine::new();
        assert_eq!(sm.state(), AgentState::IdleListening);
    }

    #[test]
    fn full_happy_path() {
        let mut sm = StateMachine::new();
        assert_eq!(
            sm.apply(StateEvent::SpeechStart),
            AgentState::ReceivingSpeech
        );
        assert_eq!(
            sm.apply(StateEvent::SpeechEndNoPending),
            AgentState::Thinking
        );
        assert_eq!(
            sm.apply(StateEvent::ResponseReady),
            AgentState::Transmitting
        );
        assert!(sm.can_transmit());
        assert_eq!(
            sm.apply(StateEvent::PlaybackComplete),
            AgentState::IdleListening
        );
    }

    #[test]
    fn waiting_for_channel_clear_discards_on_interrupt() {
        let mut sm = StateMachine::new();
        sm.apply(StateEvent::SpeechStart);
        sm.apply(StateEvent::SpeechEndPendingTx);
        assert_eq!(sm.state(), AgentState::WaitingForChannelClear);
        assert_eq!(
            sm.apply(StateEvent::SpeechStart),
            AgentState::ReceivingSpeech
        );
    }

    #[test]
    fn unrelated_event_is_ignored() {
        let mut sm = StateMachine::new();
        assert_eq!(
            sm.apply(StateEvent::ChannelClear),
            AgentState::IdleListening
        );
    }

    #[test]
    fn transmit_only_allowed_from_transmitting_state() {
        let mut sm = StateMachine::new();
        assert!(!sm.can_transmit());
        sm.apply(StateEvent::SpeechStart);
        assert!(!sm.can_transmit());
        sm.apply(StateEvent::SpeechEndNoPending);
        assert!(!sm.can_transmit());
        sm.apply(StateEvent::ResponseReady);
        assert!(sm.can_transmit());
    }
}
