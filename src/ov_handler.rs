use std::sync::Arc;

use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::ov_files::FileSet;
use crate::ov_interface::{Address, EventSink, PeerEvent, PeerId, RoutingMode};
use crate::ov_protocol::{read_request_bytes, Request};
use crate::ov_routing::{forward, MissAction, RoutingStrategy};

/// Read-only node state shared by every session of one peer
pub struct PeerContext {
    pub peer_id: PeerId,
    pub files: FileSet,
    pub strategy: RoutingStrategy,
    pub sink: Arc<dyn EventSink>,
}

impl PeerContext {
    fn emit(&self, event: PeerEvent) {
        self.sink.log(&self.peer_id, event);
    }
}

// ============================================================================
// Session state machine
// ============================================================================

/// AwaitMessage -> Parsed -> {ServeLocal, Delegate} -> Closed
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    AwaitMessage,
    Parsed(Request),
    ServeLocal(Request),
    Delegate(Request),
    Closed(SessionOutcome),
}

/// How a session ended. The caller only ever receives bytes for `Served`.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Served { bytes: usize },
    NotFound,
    Forwarded { to: Address },
    ForwardFailed { to: Address },
    DroppedNoNeighbors,
    DroppedHopLimit,
    /// Malformed request, closed without a response
    Rejected,
    /// Transport failed mid-session (caller went away)
    Aborted,
}

/// One accepted connection, one exchange
pub struct Session<S> {
    stream: S,
    context: Arc<PeerContext>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, context: Arc<PeerContext>) -> Self {
        Self { stream, context }
    }

    pub async fn run(mut self) -> SessionOutcome {
        let mut state = SessionState::AwaitMessage;
        loop {
            state = match state {
                SessionState::AwaitMessage => self.await_message().await,
                SessionState::Parsed(request) => self.route(request),
                SessionState::ServeLocal(request) => self.serve_local(request).await,
                SessionState::Delegate(request) => self.delegate(request).await,
                SessionState::Closed(outcome) => {
                    // closing is the end-of-response signal
                    let _ = self.stream.shutdown().await;
                    debug!("{} session closed: {:?}", self.context.peer_id, outcome);
                    return outcome;
                }
            };
        }
    }

    async fn await_message(&mut self) -> SessionState {
        let data = match read_request_bytes(&mut self.stream).await {
            Ok(data) => data,
            Err(e) => {
                warn!("{} failed to read request: {}", self.context.peer_id, e);
                return SessionState::Closed(SessionOutcome::Aborted);
            }
        };

        match Request::parse(&data) {
            Ok(request) => SessionState::Parsed(request),
            Err(e) => {
                self.context.emit(PeerEvent::Rejected {
                    reason: e.to_string(),
                });
                SessionState::Closed(SessionOutcome::Rejected)
            }
        }
    }

    fn route(&self, request: Request) -> SessionState {
        match self.context.strategy.mode() {
            // FriendFirst always attempts to serve, a miss just ends the session
            RoutingMode::FriendFirst => SessionState::ServeLocal(request),
            RoutingMode::RandomWalk if self.context.files.contains(&request.filename) => {
                SessionState::ServeLocal(request)
            }
            RoutingMode::RandomWalk => SessionState::Delegate(request),
        }
    }

    async fn serve_local(&mut self, request: Request) -> SessionState {
        let content = match self.context.files.read(&request.filename).await {
            Ok(Some(content)) => content,
            Ok(None) => {
                self.context.emit(PeerEvent::NotFound {
                    filename: request.filename,
                });
                return SessionState::Closed(SessionOutcome::NotFound);
            }
            Err(e) => {
                warn!(
                    "{} failed to read {}: {}",
                    self.context.peer_id, request.filename, e
                );
                return SessionState::Closed(SessionOutcome::NotFound);
            }
        };

        if let Err(e) = self.stream.write_all(&content).await {
            warn!(
                "{} failed to send {}: {}",
                self.context.peer_id, request.filename, e
            );
            return SessionState::Closed(SessionOutcome::Aborted);
        }

        self.context.emit(PeerEvent::Served {
            filename: request.filename,
            bytes: content.len(),
        });
        SessionState::Closed(SessionOutcome::Served {
            bytes: content.len(),
        })
    }

    async fn delegate(&mut self, request: Request) -> SessionState {
        self.context.emit(PeerEvent::NotFound {
            filename: request.filename.clone(),
        });

        let action = self
            .context
            .strategy
            .on_miss(&request, &mut rand::thread_rng());

        let outcome = match action {
            MissAction::Forward { to, request: relay } => match forward(&to, &relay).await {
                Ok(()) => {
                    self.context.emit(PeerEvent::Forwarded {
                        filename: relay.filename.clone(),
                        to: to.clone(),
                        remaining_hops: relay.remaining_hops(),
                    });
                    SessionOutcome::Forwarded { to }
                }
                Err(e) => {
                    self.context.emit(PeerEvent::ForwardFailed {
                        filename: relay.filename.clone(),
                        to: to.clone(),
                        reason: e.to_string(),
                    });
                    SessionOutcome::ForwardFailed { to }
                }
            },
            MissAction::DropNoNeighbors => {
                self.context.emit(PeerEvent::DroppedNoNeighbors {
                    filename: request.filename,
                });
                SessionOutcome::DroppedNoNeighbors
            }
            MissAction::DropHopLimit => {
                self.context.emit(PeerEvent::DroppedHopLimit {
                    filename: request.filename,
                });
                SessionOutcome::DroppedHopLimit
            }
            MissAction::NotFound => SessionOutcome::NotFound,
        };

        // the relay's result is never passed back to this caller
        SessionState::Closed(outcome)
    }
}
