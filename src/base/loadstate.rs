/// Progress of a request chain.
/// A reduced form of net/base/load_states.h.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    /// Nothing has been sent yet.
    #[default]
    Idle,

    /// Handing the request to the socket transport.
    SendingRequest,

    /// Waiting for the server response (TTFB).
    WaitingForResponse,

    /// Buffering the response body.
    ReadingResponse,

    /// Terminal: a final response was produced or the chain failed.
    Settled,
}

impl LoadState {
    /// True while a round trip is in flight.
    pub fn is_executing(self) -> bool {
        matches!(
            self,
            LoadState::SendingRequest | LoadState::WaitingForResponse | LoadState::ReadingResponse
        )
    }
}
