use std::fmt;

/// Lifecycle state of a scan job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScanState {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ScanState::Stopped => "Stopped",
            ScanState::Running => "Running",
            ScanState::Paused => "Paused",
        };
        f.write_str(label)
    }
}

/// Operator command addressed to one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanCommand {
    Run,
    Pause,
    Resume,
    Stop,
}

impl fmt::Display for ScanCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ScanCommand::Run => "run",
            ScanCommand::Pause => "pause",
            ScanCommand::Resume => "resume",
            ScanCommand::Stop => "stop",
        };
        f.write_str(label)
    }
}

/// Side effect the registry must carry out for an accepted transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Start a new worker for the job.
    SpawnWorker,
    /// Tell the live worker to skip capture cycles.
    SuspendWorker,
    /// Tell the live worker to capture again.
    ResumeWorker,
    /// Cancel the live worker and wait for it to exit.
    CancelWorker,
}

/// Result of applying a command to a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied {
        from: ScanState,
        to: ScanState,
        effect: Effect,
    },
    /// The command is not valid from `state`; nothing changes.
    Ignored { state: ScanState },
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied { .. })
    }

    /// State after the command, whether or not it was applied.
    pub fn resulting_state(&self) -> ScanState {
        match self {
            Transition::Applied { to, .. } => *to,
            Transition::Ignored { state } => *state,
        }
    }
}

/// Pure transition table of the job state machine.
///
/// | From    | Command | To      | Effect        |
/// |---------|---------|---------|---------------|
/// | Stopped | Run     | Running | SpawnWorker   |
/// | Running | Pause   | Paused  | SuspendWorker |
/// | Paused  | Resume  | Running | ResumeWorker  |
/// | Running | Stop    | Stopped | CancelWorker  |
/// | Paused  | Stop    | Stopped | CancelWorker  |
///
/// Every other pair is ignored.
pub fn transition(state: ScanState, command: ScanCommand) -> Transition {
    let applied = |to, effect| Transition::Applied {
        from: state,
        to,
        effect,
    };
    match (state, command) {
        (ScanState::Stopped, ScanCommand::Run) => applied(ScanState::Running, Effect::SpawnWorker),
        (ScanState::Running, ScanCommand::Pause) => {
            applied(ScanState::Paused, Effect::SuspendWorker)
        }
        (ScanState::Paused, ScanCommand::Resume) => {
            applied(ScanState::Running, Effect::ResumeWorker)
        }
        (ScanState::Running | ScanState::Paused, ScanCommand::Stop) => {
            applied(ScanState::Stopped, Effect::CancelWorker)
        }
        _ => Transition::Ignored { state },
    }
}
