//! Board document format and conversion.

use std::collections::BTreeMap;

use pedalera_board::{
    AddressingEntry, InstanceId, InstanceState, Pedalboard, PortRef, Position, Snapshot,
};
use pedalera_catalog::{Catalog, PluginUri};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Document format version this build reads and writes.
pub const FORMAT_VERSION: u32 = 1;

fn format_version() -> u32 {
    FORMAT_VERSION
}

/// One plugin instance as persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceDoc {
    /// Instance id, preserved across save and load.
    pub id: u32,
    /// Plugin URI, resolved against the catalog at load time.
    pub uri: String,
    /// Canvas position.
    #[serde(default)]
    pub position: Position,
    /// Control input values keyed by port symbol.
    #[serde(default)]
    pub params: BTreeMap<String, f32>,
    /// Whether the instance is bypassed.
    #[serde(default)]
    pub bypassed: bool,
}

/// One audio connection as persisted. Endpoints are `"<id>:<symbol>"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionDoc {
    /// Source endpoint, an audio output.
    pub src: String,
    /// Destination endpoint, an audio input.
    pub dst: String,
}

/// Captured state of one instance inside a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotEntryDoc {
    /// Instance the capture belongs to.
    pub id: u32,
    /// Captured control values.
    #[serde(default)]
    pub values: BTreeMap<String, f32>,
    /// Captured bypass state.
    #[serde(default)]
    pub bypassed: bool,
}

/// A named snapshot as persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotDoc {
    /// Snapshot name, unique within the board.
    pub name: String,
    /// Captured per-instance state.
    #[serde(default)]
    pub instances: Vec<SnapshotEntryDoc>,
}

/// Serialized form of a complete pedalboard.
///
/// Everything a board carries survives the round trip: instances with their
/// ids, values, bypass flags and positions, connections, addressings with
/// their transforms, and snapshots. Ids are preserved so documents stay
/// diffable and snapshots keep pointing at the right instances.
///
/// # JSON Format
///
/// ```json
/// {
///   "version": 1,
///   "name": "Blues Rig",
///   "instances": [
///     { "id": 0, "uri": "urn:pedalera:overdrive",
///       "position": { "x": 120.0, "y": 40.0 },
///       "params": { "drive": 6.0, "tone": 5.0 }, "bypassed": false }
///   ],
///   "connections": [ { "src": "0:out", "dst": "1:in" } ],
///   "addressings": [
///     { "control": "knob:1", "instance": 0, "port": "drive",
///       "min": 0.0, "max": 10.0, "transform": { "type": "linear" } }
///   ],
///   "snapshots": [
///     { "name": "solo", "instances": [
///       { "id": 0, "values": { "drive": 8.0 }, "bypassed": false } ] }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoardDoc {
    /// Format version; documents from newer builds are refused.
    #[serde(default = "format_version")]
    pub version: u32,
    /// Board name.
    pub name: String,
    /// Plugin instances.
    #[serde(default)]
    pub instances: Vec<InstanceDoc>,
    /// Audio connections.
    #[serde(default)]
    pub connections: Vec<ConnectionDoc>,
    /// Hardware control addressings.
    #[serde(default)]
    pub addressings: Vec<AddressingEntry>,
    /// Named snapshots.
    #[serde(default)]
    pub snapshots: Vec<SnapshotDoc>,
}

impl BoardDoc {
    /// Capture a board into its serialized form.
    pub fn from_board(board: &Pedalboard) -> Self {
        let instances = board
            .instances()
            .map(|instance| InstanceDoc {
                id: instance.id().index(),
                uri: instance.uri().to_string(),
                position: instance.position(),
                params: instance
                    .values()
                    .iter()
                    .map(|(symbol, value)| (symbol.to_string(), *value))
                    .collect(),
                bypassed: instance.bypassed(),
            })
            .collect();
        let connections = board
            .connections()
            .iter()
            .map(|connection| ConnectionDoc {
                src: connection.src.to_string(),
                dst: connection.dst.to_string(),
            })
            .collect();
        let addressings = board.addressings().iter().cloned().collect();
        let snapshots = board
            .snapshots()
            .iter()
            .map(|snapshot| SnapshotDoc {
                name: snapshot.name.clone(),
                instances: snapshot
                    .instances
                    .iter()
                    .map(|(id, state)| SnapshotEntryDoc {
                        id: id.index(),
                        values: state
                            .values
                            .iter()
                            .map(|(symbol, value)| (symbol.to_string(), *value))
                            .collect(),
                        bypassed: state.bypassed,
                    })
                    .collect(),
            })
            .collect();

        Self {
            version: FORMAT_VERSION,
            name: board.name().to_string(),
            instances,
            connections,
            addressings,
            snapshots,
        }
    }

    /// Rebuild a live board, validating every reference against `catalog`.
    ///
    /// Instance ids are restored as stored and the id counter continues past
    /// the highest of them. Stored values outside a port's declared range
    /// clamp; values for ports the plugin no longer declares are dropped
    /// with a warning. Structural problems (unknown plugins, bad endpoints,
    /// invalid addressings, snapshots naming missing instances) fail the
    /// whole load, so a document either loads completely or not at all.
    ///
    /// The returned board carries no pending intents; loading is not a
    /// mutation.
    pub fn into_board(self, catalog: &Catalog) -> Result<Pedalboard, StoreError> {
        if self.version != FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found: self.version,
                expected: FORMAT_VERSION,
            });
        }
        let Self {
            version: _,
            name,
            instances,
            connections,
            addressings,
            snapshots,
        } = self;
        let mut board = Pedalboard::new(name);

        for doc in instances {
            let id = InstanceId(doc.id);
            let uri = PluginUri::from(doc.uri);
            let descriptor = catalog
                .resolve(&uri)
                .map_err(|err| StoreError::validation(format!("instance {}: {err}", doc.id)))?;
            board
                .restore_instance(id, descriptor, doc.position)
                .map_err(|err| StoreError::validation(err.to_string()))?;
            for (symbol, value) in doc.params {
                if let Err(err) = board.set_param(id, symbol.as_str(), value) {
                    tracing::warn!("load: dropping stored value '{symbol}' on instance {id}: {err}");
                }
            }
            if doc.bypassed {
                board
                    .set_bypass(id, true)
                    .map_err(|err| StoreError::validation(err.to_string()))?;
            }
        }

        for doc in &connections {
            let src = parse_endpoint(&doc.src)?;
            let dst = parse_endpoint(&doc.dst)?;
            board.connect(src, dst).map_err(|err| {
                StoreError::validation(format!("connection {} -> {}: {err}", doc.src, doc.dst))
            })?;
        }

        for entry in addressings {
            let control = entry.control.clone();
            board
                .address(entry)
                .map_err(|err| StoreError::validation(format!("addressing '{control}': {err}")))?;
        }

        for doc in snapshots {
            let mut snapshot = Snapshot::new(doc.name);
            for entry in doc.instances {
                let id = InstanceId(entry.id);
                if board.instance(id).is_none() {
                    return Err(StoreError::validation(format!(
                        "snapshot '{}' captures unknown instance {}",
                        snapshot.name, entry.id
                    )));
                }
                snapshot.instances.insert(
                    id,
                    InstanceState {
                        values: entry
                            .values
                            .into_iter()
                            .map(|(symbol, value)| (symbol.into(), value))
                            .collect(),
                        bypassed: entry.bypassed,
                    },
                );
            }
            board.insert_snapshot(snapshot);
        }

        // The rebuild is not a user edit; nothing here replays to a host.
        let _ = board.take_intents();
        Ok(board)
    }

    /// Parse a document from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn parse_endpoint(raw: &str) -> Result<PortRef, StoreError> {
    let (id, symbol) = raw
        .split_once(':')
        .ok_or_else(|| StoreError::validation(format!("endpoint '{raw}' is not <id>:<port>")))?;
    let id: u32 = id
        .parse()
        .map_err(|_| StoreError::validation(format!("endpoint '{raw}' has a non-numeric id")))?;
    if symbol.is_empty() {
        return Err(StoreError::validation(format!(
            "endpoint '{raw}' is missing a port"
        )));
    }
    Ok(PortRef::new(InstanceId(id), symbol))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pedalera_board::Transform;

    fn demo_board(catalog: &Catalog) -> Pedalboard {
        let mut board = Pedalboard::new("Blues Rig");
        let od = board
            .add_instance(
                catalog,
                &PluginUri::from("urn:pedalera:overdrive"),
                Position::new(100.0, 40.0),
            )
            .unwrap();
        let delay = board
            .add_instance(
                catalog,
                &PluginUri::from("urn:pedalera:delay"),
                Position::new(260.0, 40.0),
            )
            .unwrap();
        board
            .connect(PortRef::new(od, "out"), PortRef::new(delay, "in"))
            .unwrap();
        board.set_param(od, "drive", 6.5).unwrap();
        board.set_bypass(delay, true).unwrap();
        board
            .address(AddressingEntry::new("knob:1", od, "drive", 0.0, 10.0))
            .unwrap();
        board.save_snapshot("solo");
        board.take_intents();
        board
    }

    #[test]
    fn test_minimal_json_fills_defaults() {
        let doc = BoardDoc::from_json(r#"{ "name": "Empty" }"#).unwrap();
        assert_eq!(doc.version, FORMAT_VERSION);
        assert_eq!(doc.name, "Empty");
        assert!(doc.instances.is_empty());
        assert!(doc.connections.is_empty());
        assert!(doc.addressings.is_empty());
        assert!(doc.snapshots.is_empty());
    }

    #[test]
    fn test_unsupported_version_refused() {
        let catalog = Catalog::demo();
        let doc = BoardDoc::from_json(r#"{ "version": 9, "name": "Future" }"#).unwrap();
        let err = doc.into_board(&catalog).unwrap_err();
        assert!(matches!(
            err,
            StoreError::UnsupportedVersion {
                found: 9,
                expected: FORMAT_VERSION
            }
        ));
    }

    #[test]
    fn test_round_trip_preserves_graph() {
        let catalog = Catalog::demo();
        let board = demo_board(&catalog);

        let json = BoardDoc::from_board(&board).to_json().unwrap();
        let restored = BoardDoc::from_json(&json)
            .unwrap()
            .into_board(&catalog)
            .unwrap();

        assert_eq!(restored.name(), "Blues Rig");
        assert_eq!(restored.instance_count(), 2);
        let od = restored.instance(InstanceId(0)).unwrap();
        assert_eq!(od.uri().as_str(), "urn:pedalera:overdrive");
        assert_eq!(od.value("drive"), Some(6.5));
        assert_eq!(od.position(), Position::new(100.0, 40.0));
        assert!(restored.instance(InstanceId(1)).unwrap().bypassed());
        assert_eq!(restored.connections(), board.connections());
        assert_eq!(restored.addressings().len(), 1);
        assert_eq!(restored.snapshot_names(), vec!["solo"]);
        assert_eq!(
            restored.snapshot("solo").unwrap(),
            board.snapshot("solo").unwrap()
        );
    }

    #[test]
    fn test_round_trip_preserves_ids_and_counter() {
        let catalog = Catalog::demo();
        let mut board = demo_board(&catalog);
        // Free id 0 so a naive rebuild would renumber.
        board.remove_instance(InstanceId(0)).unwrap();

        let doc = BoardDoc::from_board(&board);
        let mut restored = doc.into_board(&catalog).unwrap();
        assert!(restored.instance(InstanceId(0)).is_none());
        assert!(restored.instance(InstanceId(1)).is_some());

        let next = restored
            .add_instance(
                &catalog,
                &PluginUri::from("urn:pedalera:gain"),
                Position::default(),
            )
            .unwrap();
        assert_eq!(next, InstanceId(2), "counter must continue past stored ids");
    }

    #[test]
    fn test_addressing_transform_survives() {
        let catalog = Catalog::demo();
        let mut board = Pedalboard::new("t");
        let delay = board
            .add_instance(
                &catalog,
                &PluginUri::from("urn:pedalera:delay"),
                Position::default(),
            )
            .unwrap();
        board
            .address(
                AddressingEntry::new("exp:0", delay, "time", 50.0, 1000.0)
                    .with_transform(Transform::Logarithmic)
                    .with_label("Time"),
            )
            .unwrap();

        let json = BoardDoc::from_board(&board).to_json().unwrap();
        let restored = BoardDoc::from_json(&json)
            .unwrap()
            .into_board(&catalog)
            .unwrap();
        let entry = restored.addressings().get("exp:0").unwrap();
        assert_eq!(entry.transform, Transform::Logarithmic);
        assert_eq!(entry.label, "Time");
        // Geometric midpoint, not arithmetic.
        let update = restored.resolve_control("exp:0", 0.5).unwrap();
        assert!((update.value - (50.0_f32 * 1000.0).sqrt()).abs() < 0.5);
    }

    #[test]
    fn test_unknown_plugin_fails_validation() {
        let catalog = Catalog::demo();
        let doc = BoardDoc::from_json(
            r#"{ "name": "Bad", "instances": [ { "id": 0, "uri": "urn:gone" } ] }"#,
        )
        .unwrap();
        let err = doc.into_board(&catalog).unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }), "got {err}");
    }

    #[test]
    fn test_bad_endpoint_fails_validation() {
        let catalog = Catalog::demo();
        let doc = BoardDoc::from_json(
            r#"{
                "name": "Bad",
                "instances": [ { "id": 0, "uri": "urn:pedalera:overdrive" } ],
                "connections": [ { "src": "nope", "dst": "0:in" } ]
            }"#,
        )
        .unwrap();
        let err = doc.into_board(&catalog).unwrap_err();
        assert!(err.to_string().contains("not <id>:<port>"), "got {err}");
    }

    #[test]
    fn test_stored_values_clamp_on_load() {
        let catalog = Catalog::demo();
        let doc = BoardDoc::from_json(
            r#"{
                "name": "Hot",
                "instances": [
                    { "id": 0, "uri": "urn:pedalera:overdrive",
                      "params": { "drive": 99.0 } }
                ]
            }"#,
        )
        .unwrap();
        let board = doc.into_board(&catalog).unwrap();
        assert_eq!(board.instance(InstanceId(0)).unwrap().value("drive"), Some(10.0));
    }

    #[test]
    fn test_values_for_missing_ports_dropped() {
        let catalog = Catalog::demo();
        let doc = BoardDoc::from_json(
            r#"{
                "name": "Stale",
                "instances": [
                    { "id": 0, "uri": "urn:pedalera:overdrive",
                      "params": { "warp": 1.0, "drive": 4.0 } }
                ]
            }"#,
        )
        .unwrap();
        let board = doc.into_board(&catalog).unwrap();
        let instance = board.instance(InstanceId(0)).unwrap();
        assert_eq!(instance.value("drive"), Some(4.0));
        assert_eq!(instance.value("warp"), None);
    }

    #[test]
    fn test_snapshot_for_unknown_instance_rejected() {
        let catalog = Catalog::demo();
        let doc = BoardDoc::from_json(
            r#"{
                "name": "Bad",
                "instances": [ { "id": 0, "uri": "urn:pedalera:overdrive" } ],
                "snapshots": [
                    { "name": "ghost", "instances": [ { "id": 7 } ] }
                ]
            }"#,
        )
        .unwrap();
        let err = doc.into_board(&catalog).unwrap_err();
        assert!(err.to_string().contains("unknown instance 7"), "got {err}");
    }

    #[test]
    fn test_rebuilt_board_has_no_intents() {
        let catalog = Catalog::demo();
        let board = demo_board(&catalog);
        let mut restored = BoardDoc::from_board(&board).into_board(&catalog).unwrap();
        assert!(restored.take_intents().is_empty());
    }

    #[test]
    fn test_duplicate_instance_id_rejected() {
        let catalog = Catalog::demo();
        let doc = BoardDoc::from_json(
            r#"{
                "name": "Dup",
                "instances": [
                    { "id": 0, "uri": "urn:pedalera:overdrive" },
                    { "id": 0, "uri": "urn:pedalera:gain" }
                ]
            }"#,
        )
        .unwrap();
        let err = doc.into_board(&catalog).unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }), "got {err}");
    }
}
