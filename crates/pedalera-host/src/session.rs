//! Host session state machine.
//!
//! One [`HostSession`] owns the transport and drives the connection through
//! `Disconnected → Connecting → Synchronizing → Ready`. Commands go out one
//! at a time in submission order; replies are matched by correlation id, and
//! anything below the stale watermark is discarded so a superseded
//! synchronization pass can never leak into the current one.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use pedalera_board::{GraphIntent, InstanceId};
use pedalera_catalog::PortSymbol;

use crate::command::{HandleMap, HostCommand, HostHandle};
use crate::transport::Transport;
use crate::wire::{self, HostEvent, Inbound, PROTOCOL_VERSION};
use crate::{HostError, Result};

/// Connection lifecycle of the host link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No live transport. Commands are refused.
    Disconnected,
    /// Transport is up, `hello` sent, waiting for version negotiation.
    Connecting,
    /// Negotiated; replaying board state into the host.
    Synchronizing,
    /// Host mirrors the board. Normal operation.
    Ready,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Synchronizing => "synchronizing",
            Self::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// The one request currently on the wire.
#[derive(Debug, Clone)]
pub struct OutstandingRequest {
    /// Correlation id the reply must carry.
    pub cid: u64,
    /// The command, kept for reply interpretation and logs.
    pub command: HostCommand,
    /// When it was sent; the timeout deadline counts from here.
    pub sent_at: Instant,
}

/// A host-originated update, resolved to board terms.
#[derive(Debug, Clone, PartialEq)]
pub enum HostUpdate {
    /// The host changed a control value on its own.
    ParamChanged {
        /// Affected instance.
        instance: InstanceId,
        /// The changed port.
        port: PortSymbol,
        /// New value as the host reports it.
        value: f32,
    },
    /// An instance failed inside the host.
    InstanceError {
        /// The failed instance.
        instance: InstanceId,
        /// Host's description of the failure.
        reason: String,
    },
}

/// What [`HostSession::pump`] reports upward.
#[derive(Debug)]
pub enum SessionNotice {
    /// A submitted command finished, successfully or not.
    Completed {
        /// Correlation id returned by [`HostSession::submit`].
        cid: u64,
        /// `Err` carries the host's rejection or an encode failure.
        result: Result<()>,
    },
    /// An unsolicited event, already resolved through the handle map.
    Event(HostUpdate),
    /// The outstanding request blew its deadline. Always followed by a
    /// transition to `Disconnected`.
    TimedOut {
        /// Correlation id of the request that timed out.
        cid: u64,
    },
    /// The session moved to a new state.
    StateChanged(SessionState),
}

#[derive(Debug)]
struct Pending {
    cid: u64,
    command: HostCommand,
}

/// Client session for one audio host connection.
///
/// All methods are non-blocking. Callers submit commands and then call
/// [`pump`](Self::pump) from their own loop; the session sends at most one
/// request at a time and works through the queue in order, which is what
/// makes handle resolution at encode time sound: an `add` is always
/// acknowledged (and its handle bound) before anything referencing that
/// instance is encoded.
pub struct HostSession {
    transport: Option<Box<dyn Transport>>,
    state: SessionState,
    next_cid: u64,
    stale_below: u64,
    handles: HandleMap,
    queue: VecDeque<Pending>,
    outstanding: Option<OutstandingRequest>,
    sync_fence: Option<u64>,
    command_timeout: Duration,
}

impl HostSession {
    /// Session with no transport, in `Disconnected`.
    ///
    /// `command_timeout` is how long a sent request may wait for its reply
    /// before the connection is declared dead.
    pub fn new(command_timeout: Duration) -> Self {
        Self {
            transport: None,
            state: SessionState::Disconnected,
            next_cid: 1,
            stale_below: 0,
            handles: HandleMap::new(),
            queue: VecDeque::new(),
            outstanding: None,
            sync_fence: None,
            command_timeout,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the host mirrors the board and commands flow normally.
    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// Commands waiting to be sent, plus the one on the wire.
    pub fn pending_commands(&self) -> usize {
        self.queue.len() + usize::from(self.outstanding.is_some())
    }

    /// The current instance/handle bindings.
    pub fn handles(&self) -> &HandleMap {
        &self.handles
    }

    /// The request currently on the wire, if any.
    pub fn outstanding(&self) -> Option<&OutstandingRequest> {
        self.outstanding.as_ref()
    }

    /// Adopt a fresh transport and start version negotiation.
    ///
    /// Supersedes whatever a previous connection left behind, sends `hello`,
    /// and enters `Connecting`. On send failure the session stays
    /// `Disconnected` and the transport is dropped.
    pub fn connect(&mut self, transport: Box<dyn Transport>, now: Instant) -> Result<()> {
        self.supersede();
        if let Some(mut old) = self.transport.take() {
            old.close();
        }
        self.state = SessionState::Disconnected;

        let cid = self.alloc_cid();
        let command = HostCommand::Hello {
            version: PROTOCOL_VERSION,
        };
        let line = wire::encode_request(cid, &command, &self.handles)?;

        let mut transport = transport;
        transport.send_line(&line)?;
        self.transport = Some(transport);
        self.outstanding = Some(OutstandingRequest {
            cid,
            command,
            sent_at: now,
        });
        self.state = SessionState::Connecting;
        tracing::info!("session: hello sent, connecting");
        Ok(())
    }

    /// Queue a command for ordered issue.
    ///
    /// Returns the correlation id that the eventual
    /// [`SessionNotice::Completed`] will carry. Refused while disconnected
    /// or still negotiating.
    pub fn submit(&mut self, command: HostCommand) -> Result<u64> {
        match self.state {
            SessionState::Ready | SessionState::Synchronizing => {
                let cid = self.alloc_cid();
                tracing::debug!("submit: cid {cid} {}", command.verb());
                self.queue.push_back(Pending { cid, command });
                Ok(cid)
            }
            SessionState::Disconnected | SessionState::Connecting => Err(HostError::NotConnected),
        }
    }

    /// Start a full-state replay into the host.
    ///
    /// Supersedes anything queued or in flight, clears the handle map, and
    /// queues `reset` followed by the plan. The session reaches `Ready`
    /// once the last plan command is answered; rejected plan entries are
    /// reported but do not stop the pass.
    pub fn begin_resync(&mut self, plan: Vec<GraphIntent>) -> Result<()> {
        match self.state {
            SessionState::Synchronizing | SessionState::Ready => {}
            SessionState::Disconnected | SessionState::Connecting => {
                return Err(HostError::NotConnected);
            }
        }
        self.supersede();
        self.state = SessionState::Synchronizing;

        let mut last = self.enqueue(HostCommand::Reset);
        for intent in plan {
            last = self.enqueue(HostCommand::from_intent(intent));
        }
        self.sync_fence = Some(last);
        tracing::info!("session: resync started, {} commands queued", self.queue.len());
        Ok(())
    }

    /// Abandon the current pass: queued commands are dropped and any reply
    /// to the in-flight request will be discarded as stale.
    ///
    /// Used when the active board is being replaced mid-synchronization.
    /// The connection itself stays up; a new [`begin_resync`](Self::begin_resync)
    /// follows.
    pub fn abandon_sync(&mut self) {
        tracing::debug!("session: sync abandoned, {} commands dropped", self.queue.len());
        self.supersede();
    }

    /// Drop the connection and everything queued on it.
    pub fn disconnect(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.supersede();
        if self.state != SessionState::Disconnected {
            tracing::info!("session: {} -> disconnected", self.state);
            self.state = SessionState::Disconnected;
        }
    }

    /// Drive the session: read replies and events, detect timeouts, send
    /// the next queued command when the wire is idle.
    ///
    /// Never blocks. Returns the notices produced by this call, in order.
    pub fn pump(&mut self, now: Instant) -> Vec<SessionNotice> {
        let mut notices = Vec::new();
        if self.state == SessionState::Disconnected {
            return notices;
        }

        // Inbound first, so a reply arriving just in time beats its timeout.
        loop {
            let polled = match self.transport.as_mut() {
                Some(transport) => transport.poll_line(),
                None => break,
            };
            match polled {
                Ok(Some(line)) => {
                    tracing::trace!("<- {line}");
                    match wire::parse_inbound(&line) {
                        Ok(Inbound::Ok { cid, data }) => {
                            self.on_reply(cid, Ok(data), &mut notices);
                        }
                        Ok(Inbound::Err { cid, reason }) => {
                            self.on_reply(cid, Err(reason), &mut notices);
                        }
                        Ok(Inbound::Event(event)) => self.on_event(event, &mut notices),
                        Err(err) => {
                            tracing::warn!("session: {err}, dropping connection");
                            self.fail_connection(&mut notices);
                            return notices;
                        }
                    }
                    if self.state == SessionState::Disconnected {
                        return notices;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!("session: transport failed: {err}");
                    self.fail_connection(&mut notices);
                    return notices;
                }
            }
        }

        // Deadline on the request currently on the wire.
        if let Some(outstanding) = &self.outstanding {
            if now.duration_since(outstanding.sent_at) >= self.command_timeout {
                let cid = outstanding.cid;
                tracing::warn!(
                    "session: cid {cid} {} timed out",
                    outstanding.command.verb()
                );
                notices.push(SessionNotice::TimedOut { cid });
                self.fail_connection(&mut notices);
                return notices;
            }
        }

        // Issue the next command when idle.
        let mut lost = false;
        while self.outstanding.is_none() && !lost {
            let Some(pending) = self.queue.pop_front() else {
                break;
            };
            match wire::encode_request(pending.cid, &pending.command, &self.handles) {
                Ok(line) => {
                    let Some(transport) = self.transport.as_mut() else {
                        break;
                    };
                    tracing::trace!("-> {line}");
                    if transport.send_line(&line).is_err() {
                        lost = true;
                    } else {
                        self.outstanding = Some(OutstandingRequest {
                            cid: pending.cid,
                            command: pending.command,
                            sent_at: now,
                        });
                    }
                }
                Err(err) => {
                    // Unresolvable command, typically after a rejected add.
                    tracing::warn!("session: cannot encode cid {}: {err}", pending.cid);
                    notices.push(SessionNotice::Completed {
                        cid: pending.cid,
                        result: Err(err),
                    });
                    self.note_fence(pending.cid, &mut notices);
                }
            }
        }
        if lost {
            tracing::warn!("session: send failed, dropping connection");
            self.fail_connection(&mut notices);
        }

        notices
    }

    // --- Internals ---

    fn alloc_cid(&mut self) -> u64 {
        let cid = self.next_cid;
        self.next_cid += 1;
        cid
    }

    fn enqueue(&mut self, command: HostCommand) -> u64 {
        let cid = self.alloc_cid();
        self.queue.push_back(Pending { cid, command });
        cid
    }

    /// Invalidate everything belonging to the current pass: queued and
    /// in-flight requests, handle bindings, the sync fence. Replies to
    /// anything sent before this call become stale.
    fn supersede(&mut self) {
        self.stale_below = self.next_cid;
        self.queue.clear();
        self.outstanding = None;
        self.sync_fence = None;
        self.handles.clear();
    }

    fn fail_connection(&mut self, notices: &mut Vec<SessionNotice>) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.supersede();
        if self.state != SessionState::Disconnected {
            tracing::info!("session: {} -> disconnected", self.state);
            self.state = SessionState::Disconnected;
            notices.push(SessionNotice::StateChanged(SessionState::Disconnected));
        }
    }

    fn on_reply(
        &mut self,
        cid: u64,
        result: std::result::Result<Option<String>, String>,
        notices: &mut Vec<SessionNotice>,
    ) {
        if cid < self.stale_below {
            tracing::debug!("session: stale reply for cid {cid}, discarded");
            return;
        }
        let Some(outstanding) = self.outstanding.take_if(|o| o.cid == cid) else {
            tracing::debug!("session: reply for unknown cid {cid}, discarded");
            return;
        };

        if let HostCommand::Hello { .. } = outstanding.command {
            self.on_hello_reply(cid, result, notices);
            return;
        }

        let completed = match (&outstanding.command, result) {
            (HostCommand::Add { instance, .. }, Ok(data)) => {
                match data.as_deref().and_then(|d| d.parse::<u32>().ok()) {
                    Some(raw) => {
                        self.handles.bind(*instance, HostHandle(raw));
                        tracing::debug!("session: instance {instance} bound to handle {raw}");
                        Ok(())
                    }
                    None => {
                        tracing::warn!("session: add reply carried no handle");
                        notices.push(SessionNotice::Completed {
                            cid,
                            result: Err(HostError::protocol("ok reply without handle")),
                        });
                        self.fail_connection(notices);
                        return;
                    }
                }
            }
            (HostCommand::Remove { instance }, Ok(_)) => {
                self.handles.unbind(*instance);
                Ok(())
            }
            (_, Ok(_)) => Ok(()),
            (command, Err(reason)) => {
                tracing::warn!(
                    "session: host rejected {} (cid {cid}): {reason}",
                    command.verb()
                );
                Err(HostError::rejected(reason))
            }
        };
        notices.push(SessionNotice::Completed {
            cid,
            result: completed,
        });
        self.note_fence(cid, notices);
    }

    /// Reaching the fence means every command of the current resync pass has
    /// been answered or abandoned as unencodable.
    fn note_fence(&mut self, cid: u64, notices: &mut Vec<SessionNotice>) {
        if self.sync_fence == Some(cid) {
            self.sync_fence = None;
            if self.state == SessionState::Synchronizing {
                self.state = SessionState::Ready;
                tracing::info!("session: resync complete, ready");
                notices.push(SessionNotice::StateChanged(SessionState::Ready));
            }
        }
    }

    fn on_hello_reply(
        &mut self,
        cid: u64,
        result: std::result::Result<Option<String>, String>,
        notices: &mut Vec<SessionNotice>,
    ) {
        match result {
            Ok(data) => match data.as_deref().and_then(|d| d.parse::<u32>().ok()) {
                Some(offered) if offered == PROTOCOL_VERSION => {
                    self.state = SessionState::Synchronizing;
                    tracing::info!("session: protocol {offered} negotiated, synchronizing");
                    notices.push(SessionNotice::StateChanged(SessionState::Synchronizing));
                }
                Some(offered) => {
                    notices.push(SessionNotice::Completed {
                        cid,
                        result: Err(HostError::UnsupportedProtocol {
                            requested: PROTOCOL_VERSION,
                            offered,
                        }),
                    });
                    self.fail_connection(notices);
                }
                None => {
                    notices.push(SessionNotice::Completed {
                        cid,
                        result: Err(HostError::protocol("hello reply without version")),
                    });
                    self.fail_connection(notices);
                }
            },
            Err(reason) => {
                notices.push(SessionNotice::Completed {
                    cid,
                    result: Err(HostError::rejected(reason)),
                });
                self.fail_connection(notices);
            }
        }
    }

    fn on_event(&mut self, event: HostEvent, notices: &mut Vec<SessionNotice>) {
        let update = match event {
            HostEvent::ParamChanged {
                handle,
                symbol,
                value,
            } => match self.handles.instance(handle) {
                Some(instance) => HostUpdate::ParamChanged {
                    instance,
                    port: symbol,
                    value,
                },
                None => {
                    tracing::debug!("session: event for unknown handle {handle}, discarded");
                    return;
                }
            },
            HostEvent::InstanceError { handle, reason } => match self.handles.instance(handle) {
                Some(instance) => HostUpdate::InstanceError { instance, reason },
                None => {
                    tracing::debug!("session: event for unknown handle {handle}, discarded");
                    return;
                }
            },
        };
        notices.push(SessionNotice::Event(update));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_disconnected() {
        let session = HostSession::new(Duration::from_secs(1));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.is_ready());
        assert_eq!(session.pending_commands(), 0);
    }

    #[test]
    fn test_submit_refused_while_disconnected() {
        let mut session = HostSession::new(Duration::from_secs(1));
        let err = session.submit(HostCommand::Reset).unwrap_err();
        assert!(matches!(err, HostError::NotConnected));
    }

    #[test]
    fn test_pump_while_disconnected_is_quiet() {
        let mut session = HostSession::new(Duration::from_secs(1));
        assert!(session.pump(Instant::now()).is_empty());
    }

    #[test]
    fn test_resync_refused_while_disconnected() {
        let mut session = HostSession::new(Duration::from_secs(1));
        let err = session.begin_resync(Vec::new()).unwrap_err();
        assert!(matches!(err, HostError::NotConnected));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Synchronizing.to_string(), "synchronizing");
        assert_eq!(SessionState::Ready.to_string(), "ready");
    }
}
