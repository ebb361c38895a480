//! Management protocol: the request/response types spoken over the control
//! socket, and the dispatcher that applies them to a forwarder.
//!
//! Face creation and destruction need the transport layer and are handled
//! by the daemon before requests reach [`dispatch`].

use crate::fw::Forwarder;
use rust_rnfd_common::{Error, FaceId, Name};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlRequest {
    pub noun: String,
    pub verb: String,
    #[serde(default)]
    pub args: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlResponse {
    pub fn success(body: Value) -> Self {
        Self {
            ok: true,
            body: Some(body),
            error: None,
        }
    }

    pub fn failure(error: impl ToString) -> Self {
        Self {
            ok: false,
            body: None,
            error: Some(error.to_string()),
        }
    }
}

fn required_str<'a>(
    args: &'a serde_json::Map<String, Value>,
    key: &str,
) -> Result<&'a str, Error> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Other(format!("missing argument '{}'", key)))
}

fn required_u64(args: &serde_json::Map<String, Value>, key: &str) -> Result<u64, Error> {
    args.get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::Other(format!("missing argument '{}'", key)))
}

/// Applies one management request. Unknown noun/verb pairs fail with
/// `NoSuchCommand`.
pub fn dispatch(fw: &mut Forwarder, request: &ControlRequest) -> ControlResponse {
    match handle(fw, request) {
        Ok(body) => ControlResponse::success(body),
        Err(e) => ControlResponse::failure(e),
    }
}

fn handle(fw: &mut Forwarder, request: &ControlRequest) -> Result<Value, Error> {
    let args = &request.args;
    match (request.noun.as_str(), request.verb.as_str()) {
        ("status", "show") => {
            let m = &fw.metrics;
            Ok(json!({
                "nInInterests": m.n_in_interests.value(),
                "nOutInterests": m.n_out_interests.value(),
                "nInData": m.n_in_data.value(),
                "nOutData": m.n_out_data.value(),
                "nInNacks": m.n_in_nacks.value(),
                "nOutNacks": m.n_out_nacks.value(),
                "nCsHits": m.n_cs_hits.value(),
                "nCsMisses": m.n_cs_misses.value(),
                "nSatisfiedInterests": m.n_satisfied_interests.value(),
                "nUnsatisfiedInterests": m.n_unsatisfied_interests.value(),
                "nUnsolicitedData": m.n_unsolicited_data.value(),
                "nPitEntries": m.pit_size.value(),
                "nCsEntries": m.cs_size.value(),
                "nFaces": fw.faces.len(),
            }))
        }

        ("face", "list") => {
            let faces: Vec<Value> = fw
                .faces
                .iter()
                .map(|face| {
                    json!({
                        "id": face.id().0,
                        "uri": face.uri(),
                        "scope": face.scope().to_string(),
                        "linkType": face.link_type().to_string(),
                        "nInPackets": face.counters.n_in_packets.value(),
                        "nOutPackets": face.counters.n_out_packets.value(),
                    })
                })
                .collect();
            Ok(json!({ "faces": faces }))
        }

        ("route", "list") => {
            let routes: Vec<Value> = fw
                .fib_entries()
                .into_iter()
                .map(|entry| {
                    json!({
                        "prefix": entry.prefix.to_string(),
                        "nexthops": entry.nexthops.iter().map(|hop| {
                            json!({ "face": hop.face.0, "cost": hop.cost })
                        }).collect::<Vec<_>>(),
                    })
                })
                .collect();
            Ok(json!({ "routes": routes }))
        }

        ("route", "add") => {
            let prefix = Name::from_uri(required_str(args, "prefix")?)?;
            let face = FaceId(required_u64(args, "face")?);
            let cost = args.get("cost").and_then(Value::as_u64).unwrap_or(10);
            if fw.faces.get(face).is_none() {
                return Err(Error::Other(format!("face {} not found", face.0)));
            }
            fw.register_route(&prefix, face, cost);
            Ok(json!({ "prefix": prefix.to_string(), "face": face.0, "cost": cost }))
        }

        ("route", "remove") => {
            let prefix = Name::from_uri(required_str(args, "prefix")?)?;
            let face = FaceId(required_u64(args, "face")?);
            let removed = fw.unregister_route(&prefix, face);
            Ok(json!({ "removed": removed }))
        }

        ("strategy", "list") => {
            let choices: Vec<Value> = fw
                .strategy_entries()
                .into_iter()
                .map(|(prefix, strategy)| {
                    json!({ "prefix": prefix.to_string(), "strategy": strategy.to_string() })
                })
                .collect();
            let available: Vec<String> = fw
                .registered_strategies()
                .into_iter()
                .map(|name| name.to_string())
                .collect();
            Ok(json!({ "choices": choices, "available": available }))
        }

        ("strategy", "set") => {
            let prefix = Name::from_uri(required_str(args, "prefix")?)?;
            let strategy = Name::from_uri(required_str(args, "strategy")?)?;
            fw.set_strategy(&prefix, &strategy)?;
            Ok(json!({ "prefix": prefix.to_string(), "strategy": strategy.to_string() }))
        }

        ("strategy", "unset") => {
            let prefix = Name::from_uri(required_str(args, "prefix")?)?;
            Ok(json!({ "unset": fw.unset_strategy(&prefix) }))
        }

        ("cs", "info") => Ok(json!({
            "capacity": fw.cs.capacity(),
            "nEntries": fw.cs.len(),
            "nUnsolicited": fw.cs.unsolicited_count(),
        })),

        ("cs", "erase") => {
            let prefix = Name::from_uri(required_str(args, "prefix")?)?;
            Ok(json!({ "erased": fw.cs.erase_prefix(&prefix) }))
        }

        (noun, verb) => Err(Error::NoSuchCommand(format!("{} {}", noun, verb))),
    }
}
