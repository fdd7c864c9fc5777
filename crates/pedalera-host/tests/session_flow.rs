//! Session state machine flows against a scripted in-memory transport.
//!
//! The transport records what the session sends and feeds back canned reply
//! lines, so every test controls the exact interleaving of replies, events,
//! and failures.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use pedalera_board::{GraphIntent, InstanceId, PortRef};
use pedalera_catalog::{PluginUri, PortSymbol};
use pedalera_host::{
    HostCommand, HostError, HostHandle, HostSession, HostUpdate, SessionNotice, SessionState,
    Transport,
};

// --- Scripted transport ---

#[derive(Default)]
struct Wire {
    sent: Vec<String>,
    inbound: VecDeque<String>,
    fail_send: bool,
    closed: bool,
}

/// Clonable handle to a shared wire: one clone goes to the session, the
/// test keeps the other to script replies and inspect traffic.
#[derive(Clone, Default)]
struct TestTransport {
    wire: Arc<Mutex<Wire>>,
}

impl TestTransport {
    fn push_line(&self, line: &str) {
        self.wire.lock().unwrap().inbound.push_back(line.to_string());
    }

    fn reply_ok(&self, cid: u64) {
        self.push_line(&format!("ok {cid}"));
    }

    fn reply_ok_data(&self, cid: u64, data: &str) {
        self.push_line(&format!("ok {cid} {data}"));
    }

    fn reply_err(&self, cid: u64, reason: &str) {
        self.push_line(&format!("err {cid} {reason}"));
    }

    fn sent(&self) -> Vec<String> {
        self.wire.lock().unwrap().sent.clone()
    }

    fn last_sent(&self) -> String {
        self.wire
            .lock()
            .unwrap()
            .sent
            .last()
            .cloned()
            .expect("nothing sent yet")
    }

    fn sent_count(&self) -> usize {
        self.wire.lock().unwrap().sent.len()
    }

    fn fail_next_send(&self) {
        self.wire.lock().unwrap().fail_send = true;
    }

    fn is_closed(&self) -> bool {
        self.wire.lock().unwrap().closed
    }
}

impl Transport for TestTransport {
    fn send_line(&mut self, line: &str) -> pedalera_host::Result<()> {
        let mut wire = self.wire.lock().unwrap();
        if wire.fail_send {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "scripted failure").into());
        }
        wire.sent.push(line.to_string());
        Ok(())
    }

    fn poll_line(&mut self) -> pedalera_host::Result<Option<String>> {
        Ok(self.wire.lock().unwrap().inbound.pop_front())
    }

    fn close(&mut self) {
        self.wire.lock().unwrap().closed = true;
    }
}

// --- Helpers ---

fn cid_of(line: &str) -> u64 {
    line.split_whitespace()
        .next()
        .expect("empty line")
        .parse()
        .expect("line should start with a cid")
}

/// Walks a fresh session through hello and an empty resync to `Ready`.
fn ready_session() -> (HostSession, TestTransport) {
    let transport = TestTransport::default();
    let mut session = HostSession::new(Duration::from_secs(1));
    let now = Instant::now();

    session
        .connect(Box::new(transport.clone()), now)
        .expect("connect should send hello");
    transport.reply_ok_data(cid_of(&transport.last_sent()), "1");
    session.pump(now);
    assert_eq!(session.state(), SessionState::Synchronizing);

    session
        .begin_resync(Vec::new())
        .expect("resync should start");
    session.pump(now);
    transport.reply_ok(cid_of(&transport.last_sent()));
    session.pump(now);
    assert!(session.is_ready(), "empty resync should reach ready");
    (session, transport)
}

// --- Connection and negotiation ---

/// Full ladder: hello, version ok, reset replayed, ready.
#[test]
fn test_connect_negotiates_and_syncs() {
    let transport = TestTransport::default();
    let mut session = HostSession::new(Duration::from_secs(1));
    let now = Instant::now();

    session
        .connect(Box::new(transport.clone()), now)
        .expect("connect should send hello");
    assert_eq!(session.state(), SessionState::Connecting);
    assert_eq!(transport.sent(), vec!["1 hello 1".to_string()]);

    transport.reply_ok_data(1, "1");
    let notices = session.pump(now);
    assert!(notices
        .iter()
        .any(|n| matches!(n, SessionNotice::StateChanged(SessionState::Synchronizing))));

    session
        .begin_resync(Vec::new())
        .expect("resync should start");
    session.pump(now);
    assert_eq!(transport.last_sent(), "2 reset");

    transport.reply_ok(2);
    let notices = session.pump(now);
    assert!(notices
        .iter()
        .any(|n| matches!(n, SessionNotice::StateChanged(SessionState::Ready))));
    assert!(session.is_ready());
}

/// A host speaking a different protocol version is refused.
#[test]
fn test_hello_version_mismatch_disconnects() {
    let transport = TestTransport::default();
    let mut session = HostSession::new(Duration::from_secs(1));
    let now = Instant::now();

    session
        .connect(Box::new(transport.clone()), now)
        .expect("connect should send hello");
    transport.reply_ok_data(1, "2");
    let notices = session.pump(now);

    assert!(notices.iter().any(|n| matches!(
        n,
        SessionNotice::Completed {
            result: Err(HostError::UnsupportedProtocol {
                requested: 1,
                offered: 2
            }),
            ..
        }
    )));
    assert!(notices
        .iter()
        .any(|n| matches!(n, SessionNotice::StateChanged(SessionState::Disconnected))));
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(transport.is_closed());
}

/// A host that rejects hello outright leaves the session disconnected.
#[test]
fn test_hello_rejected_disconnects() {
    let transport = TestTransport::default();
    let mut session = HostSession::new(Duration::from_secs(1));
    let now = Instant::now();

    session
        .connect(Box::new(transport.clone()), now)
        .expect("connect should send hello");
    transport.reply_err(1, "too many clients");
    let notices = session.pump(now);

    assert!(notices.iter().any(|n| matches!(
        n,
        SessionNotice::Completed {
            result: Err(HostError::Rejected { .. }),
            ..
        }
    )));
    assert_eq!(session.state(), SessionState::Disconnected);
}

/// Submitting before negotiation finishes is refused.
#[test]
fn test_submit_while_connecting_refused() {
    let transport = TestTransport::default();
    let mut session = HostSession::new(Duration::from_secs(1));
    session
        .connect(Box::new(transport.clone()), Instant::now())
        .expect("connect should send hello");

    let err = session
        .submit(HostCommand::Add {
            instance: InstanceId(0),
            uri: PluginUri::from("urn:pedalera:overdrive"),
        })
        .unwrap_err();
    assert!(matches!(err, HostError::NotConnected));
}

// --- Command flow ---

/// An acknowledged add binds the handle that later commands encode with.
#[test]
fn test_add_binds_handle_used_by_later_commands() {
    let (mut session, transport) = ready_session();
    let now = Instant::now();

    let add_cid = session
        .submit(HostCommand::Add {
            instance: InstanceId(0),
            uri: PluginUri::from("urn:pedalera:overdrive"),
        })
        .expect("submit should queue");
    session.pump(now);
    assert_eq!(
        transport.last_sent(),
        format!("{add_cid} add urn:pedalera:overdrive")
    );

    transport.reply_ok_data(add_cid, "17");
    let notices = session.pump(now);
    assert!(notices.iter().any(
        |n| matches!(n, SessionNotice::Completed { cid, result: Ok(()) } if *cid == add_cid)
    ));
    assert_eq!(
        session.handles().handle(InstanceId(0)),
        Some(HostHandle(17))
    );

    let set_cid = session
        .submit(HostCommand::ParamSet {
            instance: InstanceId(0),
            port: PortSymbol::from("drive"),
            value: 7.5,
        })
        .expect("submit should queue");
    session.pump(now);
    assert_eq!(transport.last_sent(), format!("{set_cid} param_set 17 drive 7.5"));

    transport.reply_ok(set_cid);
    session.pump(now);

    let bypass_cid = session
        .submit(HostCommand::Bypass {
            instance: InstanceId(0),
            bypassed: true,
        })
        .expect("submit should queue");
    session.pump(now);
    assert_eq!(transport.last_sent(), format!("{bypass_cid} bypass 17 1"));
}

/// Only one request rides the wire at a time; the queue drains in order.
#[test]
fn test_single_in_flight_ordering() {
    let (mut session, transport) = ready_session();
    let now = Instant::now();
    let base = transport.sent_count();

    let first = session
        .submit(HostCommand::Add {
            instance: InstanceId(0),
            uri: PluginUri::from("urn:pedalera:overdrive"),
        })
        .expect("submit should queue");
    let second = session
        .submit(HostCommand::Add {
            instance: InstanceId(1),
            uri: PluginUri::from("urn:pedalera:delay"),
        })
        .expect("submit should queue");

    session.pump(now);
    assert_eq!(transport.sent_count(), base + 1, "second must wait");
    assert_eq!(cid_of(&transport.last_sent()), first);
    assert_eq!(session.pending_commands(), 2);

    transport.reply_ok_data(first, "1");
    session.pump(now);
    assert_eq!(transport.sent_count(), base + 2);
    assert_eq!(cid_of(&transport.last_sent()), second);

    transport.reply_ok_data(second, "2");
    session.pump(now);
    assert_eq!(session.pending_commands(), 0);
}

// --- Failure handling ---

/// A reply that never arrives times the request out and drops the link.
#[test]
fn test_timeout_disconnects_and_flushes() {
    let (mut session, transport) = ready_session();
    let now = Instant::now();

    let cid = session
        .submit(HostCommand::Add {
            instance: InstanceId(0),
            uri: PluginUri::from("urn:pedalera:overdrive"),
        })
        .expect("submit should queue");
    session.pump(now);

    let notices = session.pump(now + Duration::from_secs(2));
    assert!(notices
        .iter()
        .any(|n| matches!(n, SessionNotice::TimedOut { cid: c } if *c == cid)));
    assert!(notices
        .iter()
        .any(|n| matches!(n, SessionNotice::StateChanged(SessionState::Disconnected))));
    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(session.pending_commands(), 0);
    assert!(transport.is_closed());
}

/// Replies landing after an abandoned pass are discarded, bindings included.
#[test]
fn test_abandoned_sync_discards_stale_replies() {
    let (mut session, transport) = ready_session();
    let now = Instant::now();

    let stale_cid = session
        .submit(HostCommand::Add {
            instance: InstanceId(0),
            uri: PluginUri::from("urn:pedalera:overdrive"),
        })
        .expect("submit should queue");
    session.pump(now);

    session.abandon_sync();
    transport.reply_ok_data(stale_cid, "8");
    let notices = session.pump(now);
    assert!(
        !notices
            .iter()
            .any(|n| matches!(n, SessionNotice::Completed { .. })),
        "stale reply must not complete"
    );
    assert!(session.handles().is_empty(), "stale handle must not bind");

    // The link is still usable for the pass that superseded it.
    session
        .begin_resync(Vec::new())
        .expect("resync should start");
    session.pump(now);
    transport.reply_ok(cid_of(&transport.last_sent()));
    session.pump(now);
    assert!(session.is_ready());
}

/// One rejected add does not stop the pass; commands that can no longer be
/// encoded complete with an error and the fence still lands.
#[test]
fn test_rejected_add_mid_sync_reports_and_continues() {
    let (mut session, transport) = ready_session();
    let now = Instant::now();

    let plan = vec![
        GraphIntent::AddInstance {
            id: InstanceId(0),
            uri: PluginUri::from("urn:nope"),
        },
        GraphIntent::AddInstance {
            id: InstanceId(1),
            uri: PluginUri::from("urn:pedalera:gain"),
        },
        GraphIntent::Connect {
            src: PortRef::new(InstanceId(0), "out"),
            dst: PortRef::new(InstanceId(1), "in"),
        },
    ];
    session.begin_resync(plan).expect("resync should start");

    session.pump(now); // reset
    transport.reply_ok(cid_of(&transport.last_sent()));
    session.pump(now); // add urn:nope
    let bad_add = cid_of(&transport.last_sent());
    transport.reply_err(bad_add, "no such plugin");

    let notices = session.pump(now); // rejection lands, next add goes out
    assert!(notices.iter().any(|n| matches!(
        n,
        SessionNotice::Completed { cid, result: Err(HostError::Rejected { .. }) } if *cid == bad_add
    )));
    let good_add = cid_of(&transport.last_sent());
    transport.reply_ok_data(good_add, "5");

    let notices = session.pump(now);
    assert!(notices.iter().any(|n| matches!(
        n,
        SessionNotice::Completed {
            result: Err(HostError::UnmappedInstance(InstanceId(0))),
            ..
        }
    )));
    assert!(notices
        .iter()
        .any(|n| matches!(n, SessionNotice::StateChanged(SessionState::Ready))));
    assert!(session.is_ready());
    assert_eq!(session.handles().handle(InstanceId(1)), Some(HostHandle(5)));
    assert_eq!(session.handles().handle(InstanceId(0)), None);
}

/// A line that does not parse is a protocol failure and drops the link.
#[test]
fn test_malformed_reply_is_fatal() {
    let (mut session, transport) = ready_session();

    transport.push_line("ok banana");
    let notices = session.pump(Instant::now());
    assert!(notices
        .iter()
        .any(|n| matches!(n, SessionNotice::StateChanged(SessionState::Disconnected))));
    assert!(transport.is_closed());
}

/// A send failure drops the link immediately.
#[test]
fn test_send_failure_disconnects() {
    let (mut session, transport) = ready_session();

    session
        .submit(HostCommand::Add {
            instance: InstanceId(0),
            uri: PluginUri::from("urn:pedalera:overdrive"),
        })
        .expect("submit should queue");
    transport.fail_next_send();
    let notices = session.pump(Instant::now());
    assert!(notices
        .iter()
        .any(|n| matches!(n, SessionNotice::StateChanged(SessionState::Disconnected))));
    assert_eq!(session.state(), SessionState::Disconnected);
}

// --- Host events ---

/// Parameter events resolve through the handle map to board instances.
#[test]
fn test_param_event_resolved() {
    let (mut session, transport) = ready_session();
    let now = Instant::now();

    let add_cid = session
        .submit(HostCommand::Add {
            instance: InstanceId(0),
            uri: PluginUri::from("urn:pedalera:overdrive"),
        })
        .expect("submit should queue");
    session.pump(now);
    transport.reply_ok_data(add_cid, "17");
    session.pump(now);

    transport.push_line("ev param_changed 17 drive 4.25");
    let notices = session.pump(now);
    let update = notices
        .iter()
        .find_map(|n| match n {
            SessionNotice::Event(update) => Some(update.clone()),
            _ => None,
        })
        .expect("event should surface");
    assert_eq!(
        update,
        HostUpdate::ParamChanged {
            instance: InstanceId(0),
            port: PortSymbol::from("drive"),
            value: 4.25,
        }
    );
}

/// Instance failures carry the host's reason verbatim.
#[test]
fn test_instance_error_event_resolved() {
    let (mut session, transport) = ready_session();
    let now = Instant::now();

    let add_cid = session
        .submit(HostCommand::Add {
            instance: InstanceId(0),
            uri: PluginUri::from("urn:pedalera:overdrive"),
        })
        .expect("submit should queue");
    session.pump(now);
    transport.reply_ok_data(add_cid, "3");
    session.pump(now);

    transport.push_line("ev instance_error 3 dsp dropped out");
    let notices = session.pump(now);
    assert!(notices.iter().any(|n| matches!(
        n,
        SessionNotice::Event(HostUpdate::InstanceError { instance, reason })
            if *instance == InstanceId(0) && reason == "dsp dropped out"
    )));
}

/// Events for handles nothing maps to are dropped, not fatal.
#[test]
fn test_event_unknown_handle_skipped() {
    let (mut session, transport) = ready_session();

    transport.push_line("ev param_changed 99 drive 1");
    let notices = session.pump(Instant::now());
    assert!(!notices
        .iter()
        .any(|n| matches!(n, SessionNotice::Event(_))));
    assert_ne!(session.state(), SessionState::Disconnected);
}
