/// Session lifecycle as seen by the start/stop controls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    CanStart,
    Starting,
    CanStop,
}

/// Everything that can move the session between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionInput {
    RequestStart,
    RequestStop,
    StartConfirmed,
    Failure,
    UnrecognizedMessage,
}

/// Enabled state of the start and stop controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub start: bool,
    pub stop: bool,
}

impl SessionState {
    /// Target state for `input`, or `None` when the input is not legal here.
    pub fn next(self, input: SessionInput) -> Option<SessionState> {
        use SessionInput::*;
        use SessionState::*;
        match (self, input) {
            (CanStart, RequestStart) => Some(Starting),
            (CanStop, RequestStop) => Some(CanStart),
            (Starting, StartConfirmed) => Some(CanStop),
            (Starting, Failure | UnrecognizedMessage) => Some(CanStart),
            _ => None,
        }
    }

    pub fn controls(self) -> Controls {
        match self {
            SessionState::CanStart => Controls {
                start: true,
                stop: false,
            },
            SessionState::Starting => Controls {
                start: false,
                stop: false,
            },
            SessionState::CanStop => Controls {
                start: false,
                stop: true,
            },
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionStateMachine {
    state: SessionState,
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Applies `input`; returns whether a transition happened. Illegal inputs
    /// leave the state untouched.
    pub fn apply(&mut self, input: SessionInput) -> bool {
        match self.state.next(input) {
            Some(next) => {
                tracing::debug!(from = ?self.state, to = ?next, ?input, "session transition");
                self.state = next;
                true
            }
            None => {
                tracing::debug!(state = ?self.state, ?input, "transition rejected");
                false
            }
        }
    }

    pub fn request_start(&mut self) -> bool {
        self.apply(SessionInput::RequestStart)
    }

    pub fn request_stop(&mut self) -> bool {
        self.apply(SessionInput::RequestStop)
    }

    pub fn on_start_confirmed(&mut self) -> bool {
        self.apply(SessionInput::StartConfirmed)
    }

    pub fn on_failure(&mut self) -> bool {
        self.apply(SessionInput::Failure)
    }

    pub fn on_unrecognized_message(&mut self) -> bool {
        self.apply(SessionInput::UnrecognizedMessage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_cycle() {
        let mut machine = SessionStateMachine::new();
        assert_eq!(machine.state(), SessionState::CanStart);
        assert!(machine.request_start());
        assert_eq!(machine.state(), SessionState::Starting);
        assert!(machine.on_start_confirmed());
        assert_eq!(machine.state(), SessionState::CanStop);
        assert!(machine.request_stop());
        assert_eq!(machine.state(), SessionState::CanStart);
    }

    #[test]
    fn illegal_inputs_are_no_ops() {
        let mut machine = SessionStateMachine::new();
        assert!(!machine.request_stop());
        assert!(!machine.on_start_confirmed());
        assert!(!machine.on_failure());
        assert_eq!(machine.state(), SessionState::CanStart);

        machine.request_start();
        assert!(!machine.request_start());
        assert!(!machine.request_stop());
        assert_eq!(machine.state(), SessionState::Starting);

        machine.on_start_confirmed();
        assert!(!machine.request_start());
        assert!(!machine.on_start_confirmed());
        assert!(!machine.on_failure());
        assert!(!machine.on_unrecognized_message());
        assert_eq!(machine.state(), SessionState::CanStop);
    }

    #[test]
    fn failures_revert_only_while_starting() {
        let mut machine = SessionStateMachine::new();
        machine.request_start();
        assert!(machine.on_failure());
        assert_eq!(machine.state(), SessionState::CanStart);

        machine.request_start();
        assert!(machine.on_unrecognized_message());
        assert_eq!(machine.state(), SessionState::CanStart);
    }

    #[test]
    fn random_request_sequences_track_last_legal_target() {
        // fixed-seed LCG
        let mut seed: u32 = 0x2545_f491;
        let mut machine = SessionStateMachine::new();
        let mut expected = SessionState::CanStart;
        for _ in 0..500 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let input = match (seed >> 16) % 3 {
                0 => SessionInput::RequestStart,
                1 => SessionInput::RequestStop,
                _ => SessionInput::StartConfirmed,
            };
            if let Some(next) = expected.next(input) {
                expected = next;
            }
            machine.apply(input);
            assert_eq!(machine.state(), expected);
        }
    }

    #[test]
    fn controls_follow_state() {
        assert_eq!(
            SessionState::CanStart.controls(),
            Controls {
                start: true,
                stop: false
            }
        );
        assert_eq!(
            SessionState::Starting.controls(),
            Controls {
                start: false,
                stop: false
            }
        );
        assert_eq!(
            SessionState::CanStop.controls(),
            Controls {
                start: false,
                stop: true
            }
        );
    }
}
