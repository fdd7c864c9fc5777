//! Live session demo: build a rig, bring the host link up, and drive it.
//!
//! Spawns a stand-in audio host on a loopback socket so the demo is fully
//! self-contained, then walks the controller through a rehearsal: board
//! edits, bring-up, a knob turn, a host-side change, snapshots, and the
//! board library.
//!
//! Run with: cargo run -p pedalera-session --example session_demo

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::thread;
use std::time::{Duration, Instant};

use pedalera_board::{AddressingEntry, PortRef, Position};
use pedalera_catalog::Catalog;
use pedalera_session::{ControlEventOutcome, SessionConfig, SessionController, SessionEvent};
use tracing_subscriber::EnvFilter;

fn main() {
    // RUST_LOG=debug shows the wire traffic underneath the walkthrough.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // --- Stand-in host ---
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind stand-in host");
    let addr = listener.local_addr().expect("local addr");
    thread::spawn(move || serve_one(&listener));

    println!("=== Stand-in host ===\n");
    println!("listening on {addr}\n");

    // --- Session setup ---
    let boards_dir = tempfile::tempdir().expect("temp boards dir");
    let config = SessionConfig {
        host_addr: addr.to_string(),
        boards_dir: Some(boards_dir.path().to_path_buf()),
        ..SessionConfig::default()
    };
    let mut session = SessionController::new(Catalog::demo(), config).expect("controller");

    // --- Building the rig ---
    println!("=== Building the rig ===\n");

    let od = session
        .add_plugin(&"urn:pedalera:overdrive".into(), Position::new(80.0, 120.0))
        .expect("add overdrive");
    let dly = session
        .add_plugin(&"urn:pedalera:delay".into(), Position::new(320.0, 120.0))
        .expect("add delay");
    session
        .connect(PortRef::new(od, "out"), PortRef::new(dly, "in"))
        .expect("connect overdrive into delay");
    let drive = session.set_param(od, "drive", 6.5).expect("set drive");
    session
        .address(AddressingEntry::new("exp:1", od, "drive", 0.0, 10.0))
        .expect("address the expression pedal");

    println!("overdrive is instance {od}, delay is instance {dly}");
    println!("drive set to {drive}");
    println!("exp:1 addressed to the overdrive drive, range 0..10");

    // --- Going live ---
    println!("\n=== Going live ===\n");

    session.connect_host(Instant::now()).expect("dial the host");
    let events = session
        .pump_until_ready(Duration::from_secs(5))
        .expect("bring-up");
    for event in &events {
        describe(event);
    }
    println!("host link: {}", session.host_state());

    // --- Knob turn ---
    println!("\n=== Knob turn ===\n");

    let outcome = session
        .handle_control_event("exp:1", 0.8)
        .expect("control event");
    if let ControlEventOutcome::Applied(update) = outcome {
        println!(
            "exp:1 at 80% travel -> instance {} {} = {}",
            update.instance, update.port, update.value
        );
    }
    for event in drain(&mut session) {
        describe(&event);
    }

    // --- The host pushes back ---
    println!("\n=== The host pushes back ===\n");

    session.set_bypass(dly, true).expect("bypass the delay");
    println!("delay bypassed; the stand-in host answers with a change of its own");
    for event in drain(&mut session) {
        describe(&event);
    }
    let tone = session
        .board()
        .instance(od)
        .and_then(|inst| inst.values().get("tone").copied());
    println!("the board now shows overdrive tone = {tone:?}");

    // --- Snapshots ---
    println!("\n=== Snapshots ===\n");

    session.save_snapshot("warm");
    session.set_param(od, "drive", 10.0).expect("crank drive");
    println!("saved 'warm', then cranked drive to 10");
    let outcomes = session.recall_snapshot("warm").expect("recall");
    println!("recalled 'warm': {} values restored", outcomes.len());
    for event in drain(&mut session) {
        describe(&event);
    }
    let drive = session
        .board()
        .instance(od)
        .and_then(|inst| inst.values().get("drive").copied());
    println!("drive is back to {drive:?}");

    // --- The library ---
    println!("\n=== The library ===\n");

    let id = session.save_active_as("demo-rig").expect("save the board");
    println!("saved as '{id}'");
    let names: Vec<String> = session
        .library()
        .list()
        .iter()
        .map(ToString::to_string)
        .collect();
    println!("library now holds: {names:?}");

    session.disconnect_host();
    println!("\nSession demo complete.");
}

/// Tick the session until the host has answered everything in flight,
/// then one more time to pick up anything it pushed on its own.
fn drain(session: &mut SessionController) -> Vec<SessionEvent> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut events = Vec::new();
    while session.pending_host_commands() > 0 && Instant::now() < deadline {
        events.extend(session.tick(Instant::now()));
        thread::sleep(Duration::from_millis(2));
    }
    thread::sleep(Duration::from_millis(20));
    events.extend(session.tick(Instant::now()));
    events
}

fn describe(event: &SessionEvent) {
    match event {
        SessionEvent::HostState(state) => println!("  host link -> {state}"),
        SessionEvent::HostUpdate(update) => println!("  host update: {update:?}"),
        SessionEvent::CommandRejected { cid, reason } => {
            println!("  command {cid} rejected: {reason}");
        }
        SessionEvent::TimedOut { cid } => println!("  command {cid} timed out"),
        SessionEvent::HostUnavailable { attempts } => {
            println!("  gave up after {attempts} attempts");
        }
        SessionEvent::ControlsReplayed { applied, dropped } => {
            println!("  replayed {applied} buffered controls ({dropped} dropped)");
        }
    }
}

/// Accept one session and answer its requests. A `bypass` request also
/// triggers a parameter change of the host's own, the way a host with a
/// front panel would.
fn serve_one(listener: &TcpListener) {
    let (stream, _) = listener.accept().expect("accept");
    let mut writer = stream.try_clone().expect("clone stream");
    let reader = BufReader::new(stream);
    let mut next_handle = 10_u64;

    for line in reader.lines() {
        let Ok(line) = line else { break };
        let mut parts = line.split_whitespace();
        let Some(cid) = parts.next() else { continue };
        let verb = parts.next().unwrap_or("");
        let reply = match verb {
            "hello" => format!("ok {cid} 1"),
            "add" => {
                let handle = next_handle;
                next_handle += 1;
                format!("ok {cid} {handle}")
            }
            _ => format!("ok {cid}"),
        };
        if writeln!(writer, "{reply}").is_err() {
            break;
        }
        if verb == "bypass" {
            let _ = writeln!(writer, "ev param_changed 10 tone 4.2");
        }
    }
}
