use crate::base::loadstate::LoadState;
use crate::base::neterror::NetError;
use crate::http::response::ResponseEnvelope;
use crate::http::streamfactory::SocketTransport;
use crate::http::transaction::HttpNetworkTransaction;
use crate::tls::credentials::CredentialFiles;
use crate::urlrequest::options::RequestOptions;
use crate::urlrequest::redirect::RedirectVisitTable;
use crate::urlrequest::spec::RequestSpec;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Executes a request chain: one round trip at a time, following
/// redirects until a final response or a revisited URL.
pub struct Transport {
    socket: Arc<dyn SocketTransport>,
    transaction: HttpNetworkTransaction,
    spec: RequestSpec,
    redirects: RedirectVisitTable,
    progress: Arc<watch::Sender<LoadState>>,
    response: Option<ResponseEnvelope>,
}

impl Transport {
    pub fn new(opts: &RequestOptions, socket: Arc<dyn SocketTransport>) -> Result<Self, NetError> {
        Ok(Self::from_spec(RequestSpec::new(opts)?, socket))
    }

    pub fn with_credentials(
        opts: &RequestOptions,
        credentials: &CredentialFiles,
        socket: Arc<dyn SocketTransport>,
    ) -> Result<Self, NetError> {
        Ok(Self::from_spec(
            RequestSpec::with_credentials(opts, credentials)?,
            socket,
        ))
    }

    pub fn from_spec(spec: RequestSpec, socket: Arc<dyn SocketTransport>) -> Self {
        let (progress, _) = watch::channel(LoadState::Idle);
        let progress = Arc::new(progress);
        Self {
            transaction: HttpNetworkTransaction::new(socket.clone(), progress.clone()),
            progress,
            redirects: RedirectVisitTable::new(spec.url()),
            socket,
            spec,
            response: None,
        }
    }

    /// Run the chain to completion.
    pub async fn send(&mut self) -> Result<ResponseEnvelope, NetError> {
        loop {
            self.progress.send_replace(LoadState::SendingRequest);
            tracing::debug!(
                method = %self.spec.method(),
                url = %self.spec.url(),
                "starting round trip"
            );

            let response = match self.transaction.start(&self.spec).await {
                Ok(r) => r,
                Err(e) => {
                    self.progress.send_replace(LoadState::Settled);
                    tracing::debug!(url = %self.spec.url(), error = %e, "request chain failed");
                    return Err(e);
                }
            };

            match self.next_hop(&response) {
                Some(next) => {
                    self.spec = next;
                    self.transaction =
                        HttpNetworkTransaction::new(self.socket.clone(), self.progress.clone());
                }
                None => {
                    self.progress.send_replace(LoadState::Settled);
                    self.response = Some(response.clone());
                    return Ok(response);
                }
            }
        }
    }

    /// Spec for the next round trip, or `None` to settle on `response`.
    fn next_hop(&mut self, response: &ResponseEnvelope) -> Option<RequestSpec> {
        if !response.is_redirect() {
            return None;
        }
        let location = response.location()?;

        let target = match self.spec.url().join(location) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!(%location, error = %e, "unresolvable redirect location");
                return None;
            }
        };

        if !self.redirects.should_follow(&target) {
            tracing::debug!(
                url = %target,
                visits = self.redirects.visits(&target),
                "redirect loop detected, settling"
            );
            return None;
        }

        tracing::debug!(
            status = response.status(),
            from = %self.spec.url(),
            to = %target,
            "following redirect"
        );
        match self.spec.redirect_to(target) {
            Ok(spec) => Some(spec),
            Err(e) => {
                tracing::debug!(error = %e, "redirect target not requestable");
                None
            }
        }
    }

    /// Get the current load state (for progress reporting).
    pub fn load_state(&self) -> LoadState {
        *self.progress.borrow()
    }

    /// Follow load state changes while [`send`](Self::send) runs elsewhere.
    pub fn watch_load_state(&self) -> watch::Receiver<LoadState> {
        self.progress.subscribe()
    }

    /// Spec of the current (or last) round trip.
    pub fn spec(&self) -> &RequestSpec {
        &self.spec
    }

    pub fn redirects(&self) -> &RedirectVisitTable {
        &self.redirects
    }

    /// Final response of the last completed chain.
    pub fn response(&self) -> Option<&ResponseEnvelope> {
        self.response.as_ref()
    }
}

impl Serialize for Transport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Transport", 2)?;
        s.serialize_field("request", &self.spec)?;
        s.serialize_field("response", &self.response)?;
        s.end()
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = serde_json::to_string_pretty(self).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}
