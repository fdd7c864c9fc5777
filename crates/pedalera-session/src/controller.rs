//! The session controller.
//!
//! [`SessionController`] is the one object a frontend talks to. It owns the
//! active [`Pedalboard`], the plugin [`Catalog`], the board [`Library`], and
//! the [`HostSession`] link to the audio process, and keeps them consistent:
//! board edits flow to the host while one is attached, host-side changes flow
//! back into the board, and a lost link is redialed and resynchronized
//! without the frontend lifting a finger.
//!
//! Drive it from a loop: call [`tick`](SessionController::tick) at a modest
//! rate and render the [`SessionEvent`]s it returns.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use pedalera_board::{
    AddressingEntry, AddressingTable, ControlId, GraphError, InstanceId, Pedalboard, PortRef,
    Position, RemovedInstance, ResolvedUpdate, Snapshot,
};
use pedalera_catalog::{Catalog, PluginUri, PortSymbol};
use pedalera_host::{
    HostCommand, HostError, HostSession, HostUpdate, SessionNotice, SessionState,
};
use pedalera_store::{BoardId, Library};

use crate::config::SessionConfig;
use crate::dialer::{HostDialer, TcpDialer};
use crate::error::SessionError;

/// What happened to one hardware control event.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEventOutcome {
    /// Resolved and applied to the board and host.
    Applied(ResolvedUpdate),
    /// Buffered until the host finishes synchronizing.
    Queued,
    /// Discarded. No host is attached, or buffering is disabled.
    Dropped,
}

/// One stored value's fate during snapshot recall.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamOutcome {
    /// The stored value was applied, after clamping.
    Applied {
        /// Instance the value landed on.
        instance: InstanceId,
        /// Port that received it.
        port: PortSymbol,
        /// Value actually stored.
        value: f32,
    },
    /// The stored value no longer has a target.
    Skipped {
        /// Instance the snapshot named.
        instance: InstanceId,
        /// Port the snapshot named.
        port: PortSymbol,
        /// Why it could not be applied.
        reason: String,
    },
}

/// Things worth telling the frontend about after a [`tick`].
///
/// [`tick`]: SessionController::tick
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The host link changed state.
    HostState(SessionState),
    /// The host pushed a change of its own.
    HostUpdate(HostUpdate),
    /// The host refused a command. Rejections are reported once and never
    /// retried.
    CommandRejected {
        /// Correlation id of the refused command.
        cid: u64,
        /// The failure, rendered for display.
        reason: String,
    },
    /// A command went unanswered and the link was dropped.
    TimedOut {
        /// Correlation id of the unanswered command.
        cid: u64,
    },
    /// Reconnection used up every configured attempt.
    HostUnavailable {
        /// Attempts made before giving up.
        attempts: u32,
    },
    /// Buffered control events were replayed after a resync. `dropped`
    /// counts events that no longer resolved against the board.
    ControlsReplayed {
        /// Events that applied.
        applied: usize,
        /// Events that no longer resolved.
        dropped: usize,
    },
}

/// A control event waiting for the host to come back.
#[derive(Debug, Clone)]
struct QueuedControl {
    control: ControlId,
    travel: f32,
}

/// Redial bookkeeping. Armed by `connect_host`, spent by `tick`.
#[derive(Debug, Clone, Copy)]
struct Reconnect {
    enabled: bool,
    attempts_left: u32,
}

/// Owns the rig: board, catalog, library, and host link.
///
/// All methods are synchronous and non-blocking except
/// [`pump_until_ready`](Self::pump_until_ready), which spins the loop for
/// callers that want to block on bring-up.
pub struct SessionController {
    catalog: Catalog,
    board: Pedalboard,
    active_id: Option<BoardId>,
    library: Library,
    host: HostSession,
    dialer: Box<dyn HostDialer>,
    config: SessionConfig,
    control_queue: VecDeque<QueuedControl>,
    reconnect: Reconnect,
}

impl SessionController {
    /// Controller that dials the host over TCP at `config.host_addr`.
    ///
    /// Starts with an empty, unsaved board named "Untitled" and no host
    /// attached; call [`connect_host`](Self::connect_host) to go live.
    pub fn new(catalog: Catalog, config: SessionConfig) -> Result<Self, SessionError> {
        let dialer = TcpDialer::new(config.host_addr.clone(), config.connect_timeout());
        Self::with_dialer(catalog, config, Box::new(dialer))
    }

    /// Controller with a caller-supplied dialer.
    pub fn with_dialer(
        catalog: Catalog,
        config: SessionConfig,
        dialer: Box<dyn HostDialer>,
    ) -> Result<Self, SessionError> {
        let library = match &config.boards_dir {
            Some(dir) => Library::open(dir.clone())?,
            None => Library::user()?,
        };
        Ok(Self {
            catalog,
            board: Pedalboard::new("Untitled"),
            active_id: None,
            library,
            host: HostSession::new(config.command_timeout()),
            dialer,
            config,
            control_queue: VecDeque::new(),
            reconnect: Reconnect {
                enabled: false,
                attempts_left: 0,
            },
        })
    }

    // --- Accessors ---

    /// The active board.
    pub fn board(&self) -> &Pedalboard {
        &self.board
    }

    /// The plugin catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The board library.
    pub fn library(&self) -> &Library {
        &self.library
    }

    /// The configuration this controller was built with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Library id of the active board, if it has ever been saved.
    pub fn active_board(&self) -> Option<&BoardId> {
        self.active_id.as_ref()
    }

    /// Current state of the host link.
    pub fn host_state(&self) -> SessionState {
        self.host.state()
    }

    /// Commands queued or awaiting a host reply.
    pub fn pending_host_commands(&self) -> usize {
        self.host.pending_commands()
    }

    /// The active board's addressings.
    pub fn addressings(&self) -> &AddressingTable {
        self.board.addressings()
    }

    // --- Board edits ---
    //
    // Each edit applies to the board first and then drains the board's
    // intent log to the host. With no host attached the log accumulates
    // until the next resync supersedes it.

    /// Place a plugin on the board.
    pub fn add_plugin(
        &mut self,
        uri: &PluginUri,
        position: Position,
    ) -> Result<InstanceId, SessionError> {
        let id = self.board.add_instance(&self.catalog, uri, position)?;
        self.flush_intents();
        Ok(id)
    }

    /// Remove an instance, returning what was pruned with it.
    pub fn remove_plugin(&mut self, id: InstanceId) -> Result<RemovedInstance, SessionError> {
        let removed = self.board.remove_instance(id)?;
        self.flush_intents();
        Ok(removed)
    }

    /// Add an audio edge. `Ok(false)` means it already existed.
    pub fn connect(&mut self, src: PortRef, dst: PortRef) -> Result<bool, SessionError> {
        let added = self.board.connect(src, dst)?;
        self.flush_intents();
        Ok(added)
    }

    /// Remove an audio edge. `Ok(false)` means there was none.
    pub fn disconnect(&mut self, src: PortRef, dst: PortRef) -> Result<bool, SessionError> {
        let removed = self.board.disconnect(src, dst)?;
        self.flush_intents();
        Ok(removed)
    }

    /// Set a control value, clamped to the port's range. Returns the value
    /// actually stored.
    pub fn set_param(
        &mut self,
        id: InstanceId,
        port: impl Into<PortSymbol>,
        value: f32,
    ) -> Result<f32, SessionError> {
        let applied = self.board.set_param(id, port, value)?;
        self.flush_intents();
        Ok(applied)
    }

    /// Bypass or engage an instance.
    pub fn set_bypass(&mut self, id: InstanceId, bypassed: bool) -> Result<(), SessionError> {
        self.board.set_bypass(id, bypassed)?;
        self.flush_intents();
        Ok(())
    }

    /// Move an instance on the canvas. Layout only; the host never hears
    /// about it.
    pub fn set_position(&mut self, id: InstanceId, position: Position) -> Result<(), SessionError> {
        self.board.set_position(id, position)?;
        Ok(())
    }

    /// Rename the active board.
    pub fn rename_board(&mut self, name: impl Into<String>) {
        self.board.set_name(name);
    }

    // --- Addressings ---

    /// Bind a hardware control to a port.
    pub fn address(&mut self, entry: AddressingEntry) -> Result<(), SessionError> {
        self.board.address(entry)?;
        Ok(())
    }

    /// Unbind a control, returning its entry if it was bound.
    pub fn unaddress(&mut self, control: &str) -> Option<AddressingEntry> {
        self.board.unaddress(control)
    }

    // --- Snapshots ---

    /// Capture the board's current values under `name`.
    pub fn save_snapshot(&mut self, name: impl Into<String>) {
        self.board.save_snapshot(name);
    }

    /// Rename a snapshot.
    pub fn rename_snapshot(
        &mut self,
        from: &str,
        to: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.board.rename_snapshot(from, to)?;
        Ok(())
    }

    /// Delete a snapshot, returning it.
    pub fn remove_snapshot(&mut self, name: &str) -> Result<Snapshot, SessionError> {
        Ok(self.board.remove_snapshot(name)?)
    }

    /// Names of the active board's snapshots, in capture order.
    pub fn snapshot_names(&self) -> Vec<&str> {
        self.board.snapshot_names()
    }

    /// Apply a snapshot's stored values to the board and host.
    ///
    /// Recall is lenient the same way loading a board is: every stored value
    /// either applies (clamped to the port's current range) or is reported
    /// as skipped with the reason, and the rest of the snapshot still
    /// applies. Stored documents may name ports a newer plugin build
    /// dropped; that must not wedge the whole recall.
    pub fn recall_snapshot(&mut self, name: &str) -> Result<Vec<ParamOutcome>, SessionError> {
        let snapshot = self
            .board
            .snapshot(name)
            .cloned()
            .ok_or_else(|| GraphError::UnknownSnapshot(name.to_string()))?;

        let mut outcomes = Vec::new();
        for (id, state) in &snapshot.instances {
            for (port, value) in &state.values {
                match self.board.set_param(*id, port.clone(), *value) {
                    Ok(applied) => outcomes.push(ParamOutcome::Applied {
                        instance: *id,
                        port: port.clone(),
                        value: applied,
                    }),
                    Err(err) => outcomes.push(ParamOutcome::Skipped {
                        instance: *id,
                        port: port.clone(),
                        reason: err.to_string(),
                    }),
                }
            }
            if let Err(err) = self.board.set_bypass(*id, state.bypassed) {
                tracing::debug!("recall '{name}': bypass on {id} skipped: {err}");
            }
        }
        tracing::debug!("recall '{name}': {} values", outcomes.len());
        self.flush_intents();
        Ok(outcomes)
    }

    // --- Library ---

    /// Replace the active board with a fresh, unsaved one.
    ///
    /// If a host is attached its state is wiped and rebuilt empty.
    pub fn new_board(&mut self, name: impl Into<String>) {
        self.board = Pedalboard::new(name);
        self.active_id = None;
        self.control_queue.clear();
        self.resync_if_attached();
    }

    /// Load a stored board and make it active.
    ///
    /// The document is validated in full before anything is touched; on any
    /// error the current board stays active. On success an attached host is
    /// resynchronized to the new board, superseding whatever was in flight,
    /// and buffered control events are discarded since their addressings
    /// belonged to the old board.
    pub fn switch_to(&mut self, id: &BoardId) -> Result<(), SessionError> {
        let board = self.library.load_board(id, &self.catalog)?;
        self.board = board;
        self.active_id = Some(id.clone());
        self.control_queue.clear();
        self.resync_if_attached();
        tracing::debug!("session: switched to board '{id}'");
        Ok(())
    }

    /// Save the active board under its existing library id.
    pub fn save_active(&mut self) -> Result<BoardId, SessionError> {
        let id = self.active_id.clone().ok_or(SessionError::NeverSaved)?;
        self.library.save_board(&id, &self.board)?;
        Ok(id)
    }

    /// Save the active board under `id` and adopt that id.
    pub fn save_active_as(&mut self, id: impl Into<BoardId>) -> Result<BoardId, SessionError> {
        let id = id.into();
        self.library.save_board(&id, &self.board)?;
        self.active_id = Some(id.clone());
        Ok(id)
    }

    // --- Host link ---

    /// Dial the host and start version negotiation.
    ///
    /// Arms automatic redialing: after this call, a dropped or unreachable
    /// link is retried from [`tick`] until `config.resync_attempts` dials
    /// in a row have failed. The first attempt happens here; its error is
    /// returned but retrying stays armed as long as attempts remain.
    ///
    /// Calling this on a live link forces a fresh connection.
    ///
    /// [`tick`]: Self::tick
    pub fn connect_host(&mut self, now: Instant) -> Result<(), SessionError> {
        self.reconnect = Reconnect {
            enabled: true,
            attempts_left: self.config.resync_attempts,
        };
        match self.try_dial(now) {
            Ok(()) => Ok(()),
            Err(err) => {
                if self.reconnect.attempts_left == 0 {
                    self.reconnect.enabled = false;
                }
                Err(err)
            }
        }
    }

    /// Drop the host link deliberately. No redialing afterwards.
    pub fn disconnect_host(&mut self) {
        self.reconnect.enabled = false;
        self.host.disconnect();
    }

    /// Advance the session: pump the host link, apply its updates, and
    /// redial if the link is down and attempts remain.
    pub fn tick(&mut self, now: Instant) -> Vec<SessionEvent> {
        let mut events = Vec::new();

        for notice in self.host.pump(now) {
            match notice {
                SessionNotice::StateChanged(state) => {
                    self.on_state_change(state, &mut events);
                }
                SessionNotice::Completed { cid, result } => {
                    if let Err(err) = result {
                        events.push(SessionEvent::CommandRejected {
                            cid,
                            reason: err.to_string(),
                        });
                    }
                }
                SessionNotice::TimedOut { cid } => {
                    events.push(SessionEvent::TimedOut { cid });
                }
                SessionNotice::Event(update) => {
                    self.on_host_update(&update);
                    events.push(SessionEvent::HostUpdate(update));
                }
            }
        }

        if self.host.state() == SessionState::Disconnected && self.reconnect.enabled {
            match self.try_dial(now) {
                Ok(()) => events.push(SessionEvent::HostState(SessionState::Connecting)),
                Err(err) => {
                    tracing::debug!("redial failed: {err}");
                    if self.reconnect.attempts_left == 0 {
                        self.reconnect.enabled = false;
                        events.push(SessionEvent::HostUnavailable {
                            attempts: self.config.resync_attempts,
                        });
                    }
                }
            }
        }

        events
    }

    /// Spin [`tick`](Self::tick) until the host link is ready.
    ///
    /// Collects every event seen along the way. Fails with
    /// [`SessionError::HostUnavailable`] when redialing gives up, or with a
    /// timeout once `deadline` has elapsed without reaching ready.
    pub fn pump_until_ready(
        &mut self,
        deadline: Duration,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        let started = Instant::now();
        let mut events = Vec::new();
        loop {
            let ticked = self.tick(Instant::now());
            let gave_up = ticked
                .iter()
                .any(|e| matches!(e, SessionEvent::HostUnavailable { .. }));
            events.extend(ticked);

            if self.host.is_ready() {
                return Ok(events);
            }
            if gave_up {
                return Err(SessionError::HostUnavailable {
                    attempts: self.config.resync_attempts,
                });
            }
            if started.elapsed() >= deadline {
                return Err(SessionError::Host(HostError::Timeout));
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    // --- Control events ---

    /// Feed one hardware control event into the session.
    ///
    /// With the host ready the event resolves through the board's
    /// addressings and applies immediately. While a connection or resync is
    /// underway it is buffered, newest `config.control_queue_depth` events
    /// kept, and replayed in order once the host is ready. With no host at
    /// all it is dropped.
    pub fn handle_control_event(
        &mut self,
        control: &str,
        travel: f32,
    ) -> Result<ControlEventOutcome, SessionError> {
        match self.host.state() {
            SessionState::Ready => {
                let mut update = self.board.resolve_control(control, travel)?;
                update.value =
                    self.board
                        .set_param(update.instance, update.port.clone(), update.value)?;
                self.flush_intents();
                Ok(ControlEventOutcome::Applied(update))
            }
            SessionState::Connecting | SessionState::Synchronizing => {
                if self.queue_control(control, travel) {
                    Ok(ControlEventOutcome::Queued)
                } else {
                    Ok(ControlEventOutcome::Dropped)
                }
            }
            SessionState::Disconnected => {
                tracing::debug!("control '{control}' dropped: no host");
                Ok(ControlEventOutcome::Dropped)
            }
        }
    }

    // --- Internals ---

    /// One dial attempt. Uses up one of the remaining attempts.
    fn try_dial(&mut self, now: Instant) -> Result<(), SessionError> {
        self.reconnect.attempts_left = self.reconnect.attempts_left.saturating_sub(1);
        let transport = self.dialer.dial()?;
        self.host.connect(transport, now)?;
        Ok(())
    }

    /// Wipe and rebuild an attached host from the active board.
    ///
    /// The board's pending intent log is discarded first: the replay plan
    /// covers the full board state, and sending both would apply the logged
    /// edits twice.
    fn resync_if_attached(&mut self) {
        match self.host.state() {
            SessionState::Synchronizing | SessionState::Ready => {
                let _ = self.board.take_intents();
                if let Err(err) = self.host.begin_resync(self.board.replay_plan()) {
                    tracing::warn!("resync refused: {err}");
                }
            }
            SessionState::Disconnected | SessionState::Connecting => {}
        }
    }

    fn on_state_change(&mut self, state: SessionState, events: &mut Vec<SessionEvent>) {
        match state {
            SessionState::Synchronizing => {
                self.resync_if_attached();
            }
            SessionState::Ready => {
                let (applied, dropped) = self.replay_controls();
                if applied > 0 || dropped > 0 {
                    events.push(SessionEvent::ControlsReplayed { applied, dropped });
                }
                self.reconnect.attempts_left = self.config.resync_attempts;
            }
            SessionState::Disconnected | SessionState::Connecting => {}
        }
        events.push(SessionEvent::HostState(state));
    }

    fn on_host_update(&mut self, update: &HostUpdate) {
        match update {
            HostUpdate::ParamChanged {
                instance,
                port,
                value,
            } => {
                // Stored without an intent so the change never echoes back.
                if let Err(err) = self.board.apply_host_param(*instance, port.clone(), *value) {
                    tracing::debug!("host param without a target dropped: {err}");
                }
            }
            HostUpdate::InstanceError { instance, reason } => {
                tracing::warn!("host reports instance {instance} unhealthy: {reason}");
            }
        }
    }

    /// Buffer a raw control event. Returns false when buffering is disabled.
    ///
    /// Deliberately raw: resolution happens at replay time, against
    /// whatever the board's addressings say then.
    fn queue_control(&mut self, control: &str, travel: f32) -> bool {
        let depth = self.config.control_queue_depth;
        if depth == 0 {
            tracing::debug!("control '{control}' dropped: buffering disabled");
            return false;
        }
        if self.control_queue.len() >= depth
            && let Some(oldest) = self.control_queue.pop_front()
        {
            tracing::debug!("control queue full, dropping '{}'", oldest.control);
        }
        self.control_queue.push_back(QueuedControl {
            control: ControlId::from(control),
            travel,
        });
        true
    }

    /// Replay buffered control events, then drain whatever they logged.
    fn replay_controls(&mut self) -> (usize, usize) {
        let queued = std::mem::take(&mut self.control_queue);
        let mut applied = 0;
        let mut dropped = 0;
        for event in queued {
            match self.board.resolve_control(event.control.as_str(), event.travel) {
                Ok(update) => {
                    match self
                        .board
                        .set_param(update.instance, update.port, update.value)
                    {
                        Ok(_) => applied += 1,
                        Err(err) => {
                            tracing::debug!(
                                "buffered control '{}' failed on replay: {err}",
                                event.control
                            );
                            dropped += 1;
                        }
                    }
                }
                Err(err) => {
                    tracing::debug!(
                        "buffered control '{}' no longer resolves: {err}",
                        event.control
                    );
                    dropped += 1;
                }
            }
        }
        self.flush_intents();
        (applied, dropped)
    }

    /// Drain the board's intent log to the host, if one is ready.
    ///
    /// While disconnected or synchronizing the log stays put; a later
    /// resync discards it in favor of the full replay plan.
    fn flush_intents(&mut self) {
        if self.host.state() != SessionState::Ready {
            return;
        }
        for intent in self.board.take_intents() {
            if let Err(err) = self.host.submit(HostCommand::from_intent(intent)) {
                tracing::warn!("host submit failed: {err}");
            }
        }
    }
}
