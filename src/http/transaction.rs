use crate::base::loadstate::LoadState;
use crate::base::neterror::NetError;
use crate::http::response::ResponseEnvelope;
use crate::http::responsebody::ResponseAssembler;
use crate::http::streamfactory::{ResponseStart, SocketTransport};
use crate::urlrequest::spec::RequestSpec;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::watch;

/// Internal state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    SendRequest,
    ReadHeaders,
    ReadBody,
    Done,
}

impl State {
    /// Map internal state to public LoadState.
    fn to_load_state(self) -> LoadState {
        match self {
            State::Idle => LoadState::Idle,
            State::SendRequest => LoadState::SendingRequest,
            State::ReadHeaders => LoadState::WaitingForResponse,
            State::ReadBody => LoadState::ReadingResponse,
            State::Done => LoadState::Settled,
        }
    }
}

/// One round trip over a [`SocketTransport`]: write the body, end the
/// request, then buffer the response.
pub struct HttpNetworkTransaction {
    transport: Arc<dyn SocketTransport>,
    progress: Arc<watch::Sender<LoadState>>,
    state: State,
    pending: Option<BoxFuture<'static, Result<ResponseStart, NetError>>>,
    started: Option<ResponseStart>,
}

impl HttpNetworkTransaction {
    /// `progress` receives every in-flight state change.
    pub fn new(transport: Arc<dyn SocketTransport>, progress: Arc<watch::Sender<LoadState>>) -> Self {
        Self {
            transport,
            progress,
            state: State::Idle,
            pending: None,
            started: None,
        }
    }

    fn next_state(&mut self, state: State) {
        self.state = state;
        let load_state = state.to_load_state();
        // Idle and Settled belong to the chain, not to one round trip.
        if load_state.is_executing() {
            self.progress.send_replace(load_state);
        }
    }

    pub async fn start(&mut self, spec: &RequestSpec) -> Result<ResponseEnvelope, NetError> {
        self.next_state(State::SendRequest);
        let result = self.do_loop(spec).await;
        self.pending = None;
        self.started = None;
        self.next_state(State::Done);
        result
    }

    async fn do_loop(&mut self, spec: &RequestSpec) -> Result<ResponseEnvelope, NetError> {
        loop {
            match self.state {
                State::SendRequest => {
                    let mut stream = self.transport.open(spec)?;
                    if let Some(body) = spec.body().as_bytes() {
                        stream.write(body.clone())?;
                    }
                    self.pending = Some(stream.end());
                    self.next_state(State::ReadHeaders);
                }
                State::ReadHeaders => {
                    let pending = self.pending.take().ok_or(NetError::InvalidResponse)?;
                    let started = pending.await.map_err(|e| match e {
                        NetError::Transport(m) if m.is_empty() => NetError::generic_transport(),
                        other => other,
                    })?;
                    tracing::debug!(
                        status = started.head.status,
                        method = %started.head.method,
                        "response started"
                    );
                    self.started = Some(started);
                    self.next_state(State::ReadBody);
                }
                State::ReadBody => {
                    let ResponseStart { head, events } =
                        self.started.take().ok_or(NetError::InvalidResponse)?;
                    let response = ResponseAssembler::new(head).assemble(events).await?;
                    self.next_state(State::Done);
                    return Ok(response);
                }
                State::Idle | State::Done => return Err(NetError::InvalidResponse),
            }
        }
    }
}
