//! Line codec for the host protocol.
//!
//! One frame per newline-terminated line, ASCII, space-separated fields.
//! Requests carry a correlation id so replies can be matched out of context:
//!
//! ```text
//! controller -> host   <cid> add urn:pedalera:delay
//! host -> controller   ok <cid> 7
//! host -> controller   ev param_changed 7 time 420
//! ```
//!
//! Handles are resolved against the [`HandleMap`] when a request is
//! encoded, not earlier; a command that names an instance the host never
//! acknowledged fails with [`HostError::UnmappedInstance`].

use pedalera_board::InstanceId;
use pedalera_catalog::PortSymbol;

use crate::command::{HandleMap, HostCommand, HostHandle};
use crate::{HostError, Result};

/// Protocol version this build speaks, negotiated at `hello`.
pub const PROTOCOL_VERSION: u32 = 1;

/// An unsolicited event pushed by the host.
///
/// Events carry host handles; the session translates them to instance ids
/// before anything above it sees them.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// The host changed a control value on its own (hardware knob on the
    /// host side, internal automation).
    ParamChanged {
        /// Handle of the affected instance.
        handle: HostHandle,
        /// Port symbol as the host reports it.
        symbol: PortSymbol,
        /// New value.
        value: f32,
    },
    /// An instance failed inside the host.
    InstanceError {
        /// Handle of the failed instance.
        handle: HostHandle,
        /// Host's description of the failure.
        reason: String,
    },
}

/// One parsed inbound line.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// `ok <cid> [data]` — the request succeeded.
    Ok {
        /// Correlation id of the request this answers.
        cid: u64,
        /// Optional payload (`add` returns the handle, `hello` the version).
        data: Option<String>,
    },
    /// `err <cid> <reason...>` — the host refused the request.
    Err {
        /// Correlation id of the request this answers.
        cid: u64,
        /// The host's reason, verbatim.
        reason: String,
    },
    /// `ev ...` — an unsolicited event.
    Event(HostEvent),
}

/// Encode a request line, resolving instance ids to host handles.
///
/// The returned string has no trailing newline; the transport adds framing.
pub fn encode_request(cid: u64, command: &HostCommand, handles: &HandleMap) -> Result<String> {
    let line = match command {
        HostCommand::Hello { version } => format!("{cid} hello {version}"),
        HostCommand::Reset => format!("{cid} reset"),
        HostCommand::Add { uri, .. } => format!("{cid} add {uri}"),
        HostCommand::Remove { instance } => {
            let handle = resolve(handles, *instance)?;
            format!("{cid} remove {handle}")
        }
        HostCommand::Connect { src, dst } => {
            let src_handle = resolve(handles, src.instance)?;
            let dst_handle = resolve(handles, dst.instance)?;
            format!(
                "{cid} connect {src_handle}:{} {dst_handle}:{}",
                src.port, dst.port
            )
        }
        HostCommand::Disconnect { src, dst } => {
            let src_handle = resolve(handles, src.instance)?;
            let dst_handle = resolve(handles, dst.instance)?;
            format!(
                "{cid} disconnect {src_handle}:{} {dst_handle}:{}",
                src.port, dst.port
            )
        }
        HostCommand::ParamSet {
            instance,
            port,
            value,
        } => {
            let handle = resolve(handles, *instance)?;
            format!("{cid} param_set {handle} {port} {value}")
        }
        HostCommand::Bypass { instance, bypassed } => {
            let handle = resolve(handles, *instance)?;
            format!("{cid} bypass {handle} {}", u8::from(*bypassed))
        }
    };
    Ok(line)
}

fn resolve(handles: &HandleMap, instance: InstanceId) -> Result<HostHandle> {
    handles
        .handle(instance)
        .ok_or(HostError::UnmappedInstance(instance))
}

/// Parse one inbound line into a reply or an event.
pub fn parse_inbound(line: &str) -> Result<Inbound> {
    let (head, rest) = split_word(line.trim_end());
    match head {
        "ok" => {
            let (cid, data) = split_word(rest);
            let cid = parse_cid(cid, line)?;
            let data = if data.is_empty() {
                None
            } else {
                Some(data.to_string())
            };
            Ok(Inbound::Ok { cid, data })
        }
        "err" => {
            let (cid, reason) = split_word(rest);
            let cid = parse_cid(cid, line)?;
            Ok(Inbound::Err {
                cid,
                reason: reason.to_string(),
            })
        }
        "ev" => parse_event(rest, line).map(Inbound::Event),
        _ => Err(HostError::protocol(line)),
    }
}

fn parse_event(rest: &str, line: &str) -> Result<HostEvent> {
    let (kind, rest) = split_word(rest);
    match kind {
        "param_changed" => {
            let mut fields = rest.split_whitespace();
            let handle = parse_handle(fields.next(), line)?;
            let symbol = fields.next().ok_or_else(|| HostError::protocol(line))?;
            let value = fields
                .next()
                .and_then(|v| v.parse::<f32>().ok())
                .ok_or_else(|| HostError::protocol(line))?;
            if fields.next().is_some() {
                return Err(HostError::protocol(line));
            }
            Ok(HostEvent::ParamChanged {
                handle,
                symbol: PortSymbol::new(symbol),
                value,
            })
        }
        "instance_error" => {
            let (handle, reason) = split_word(rest);
            let handle = parse_handle(Some(handle), line)?;
            Ok(HostEvent::InstanceError {
                handle,
                reason: reason.to_string(),
            })
        }
        _ => Err(HostError::protocol(line)),
    }
}

/// Split off the first space-separated word; the remainder keeps its own
/// internal spacing (error reasons may contain spaces).
fn split_word(s: &str) -> (&str, &str) {
    match s.split_once(' ') {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (s, ""),
    }
}

fn parse_cid(field: &str, line: &str) -> Result<u64> {
    field
        .parse::<u64>()
        .map_err(|_| HostError::protocol(line))
}

fn parse_handle(field: Option<&str>, line: &str) -> Result<HostHandle> {
    field
        .and_then(|f| f.parse::<u32>().ok())
        .map(HostHandle)
        .ok_or_else(|| HostError::protocol(line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pedalera_board::{InstanceId, PortRef};
    use pedalera_catalog::PluginUri;

    fn mapped() -> HandleMap {
        let mut handles = HandleMap::new();
        handles.bind(InstanceId(0), HostHandle(10));
        handles.bind(InstanceId(1), HostHandle(11));
        handles
    }

    #[test]
    fn test_encode_hello_and_reset() {
        let handles = HandleMap::new();
        let line = encode_request(
            1,
            &HostCommand::Hello {
                version: PROTOCOL_VERSION,
            },
            &handles,
        )
        .unwrap();
        assert_eq!(line, "1 hello 1");

        let line = encode_request(2, &HostCommand::Reset, &handles).unwrap();
        assert_eq!(line, "2 reset");
    }

    #[test]
    fn test_encode_add_needs_no_handle() {
        let handles = HandleMap::new();
        let line = encode_request(
            3,
            &HostCommand::Add {
                instance: InstanceId(4),
                uri: PluginUri::new("urn:pedalera:delay"),
            },
            &handles,
        )
        .unwrap();
        assert_eq!(line, "3 add urn:pedalera:delay");
    }

    #[test]
    fn test_encode_resolves_handles() {
        let handles = mapped();
        let line = encode_request(
            7,
            &HostCommand::Connect {
                src: PortRef::new(InstanceId(0), "out"),
                dst: PortRef::new(InstanceId(1), "in"),
            },
            &handles,
        )
        .unwrap();
        assert_eq!(line, "7 connect 10:out 11:in");

        let line = encode_request(
            8,
            &HostCommand::ParamSet {
                instance: InstanceId(1),
                port: PortSymbol::new("time"),
                value: 420.0,
            },
            &handles,
        )
        .unwrap();
        assert_eq!(line, "8 param_set 11 time 420");

        let line = encode_request(
            9,
            &HostCommand::Bypass {
                instance: InstanceId(0),
                bypassed: true,
            },
            &handles,
        )
        .unwrap();
        assert_eq!(line, "9 bypass 10 1");

        let line = encode_request(10, &HostCommand::Remove { instance: InstanceId(0) }, &handles)
            .unwrap();
        assert_eq!(line, "10 remove 10");
    }

    #[test]
    fn test_encode_unmapped_instance_fails() {
        let handles = HandleMap::new();
        let err = encode_request(
            5,
            &HostCommand::Remove {
                instance: InstanceId(9),
            },
            &handles,
        )
        .unwrap_err();
        assert!(matches!(err, HostError::UnmappedInstance(InstanceId(9))));
    }

    #[test]
    fn test_parse_ok_with_and_without_data() {
        assert_eq!(
            parse_inbound("ok 12 7").unwrap(),
            Inbound::Ok {
                cid: 12,
                data: Some("7".to_string())
            }
        );
        assert_eq!(parse_inbound("ok 13\n").unwrap(), Inbound::Ok { cid: 13, data: None });
    }

    #[test]
    fn test_parse_err_keeps_reason_verbatim() {
        assert_eq!(
            parse_inbound("err 4 no such plugin: urn:x").unwrap(),
            Inbound::Err {
                cid: 4,
                reason: "no such plugin: urn:x".to_string()
            }
        );
    }

    #[test]
    fn test_parse_param_changed_event() {
        let inbound = parse_inbound("ev param_changed 7 time 421.5").unwrap();
        assert_eq!(
            inbound,
            Inbound::Event(HostEvent::ParamChanged {
                handle: HostHandle(7),
                symbol: PortSymbol::new("time"),
                value: 421.5,
            })
        );
    }

    #[test]
    fn test_parse_instance_error_event() {
        let inbound = parse_inbound("ev instance_error 3 dsp overload in voice 2").unwrap();
        assert_eq!(
            inbound,
            Inbound::Event(HostEvent::InstanceError {
                handle: HostHandle(3),
                reason: "dsp overload in voice 2".to_string(),
            })
        );
    }

    #[test]
    fn test_malformed_lines_rejected() {
        for line in [
            "",
            "nope 1",
            "ok x",
            "err abc reason",
            "ev param_changed 7 time",
            "ev param_changed 7 time abc",
            "ev param_changed 7 time 1.0 extra",
            "ev instance_error notahandle gone",
            "ev unknown_kind 1",
        ] {
            let result = parse_inbound(line);
            assert!(
                matches!(result, Err(HostError::Protocol { .. })),
                "line {line:?} should be a protocol error, got {result:?}"
            );
        }
    }
}
