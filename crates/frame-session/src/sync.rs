/// Who produced a host-side navigation change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// The controller pushed a value the frame reported.
    Frame,
    /// The user or outer state changed it; the frame must follow.
    Host,
}

/// Navigation reconciliation between host state and the frame.
///
/// `AwaitingInternalAck` is entered whenever the controller dispatches a URL or
/// timestamp the frame reported. The next update cycle that observes a
/// navigation change consumes it via [`NavSync::settle`] and must not command
/// the frame to load that value back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NavSync {
    #[default]
    Idle,
    AwaitingInternalAck,
}

impl NavSync {
    pub fn frame_originated(&mut self) {
        *self = NavSync::AwaitingInternalAck;
    }

    /// Classifies the pending change and returns to `Idle`.
    pub fn settle(&mut self) -> ChangeOrigin {
        let origin = match self {
            NavSync::AwaitingInternalAck => ChangeOrigin::Frame,
            NavSync::Idle => ChangeOrigin::Host,
        };
        *self = NavSync::Idle;
        origin
    }
}
