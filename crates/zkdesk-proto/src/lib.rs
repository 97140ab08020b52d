//! Message contract between the foreground session and the background
//! executor. Everything that crosses the request channel is defined here;
//! the types are plain data so both sides stay free of each other's
//! internals.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error message synthesized for requests that arrive before the proving
/// backend has finished loading.
pub const NOT_READY_MSG: &str = "Proving backend is not loaded yet.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Generate,
    Prove,
    Verify,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Generate => "generate",
            OperationKind::Prove => "prove",
            OperationKind::Verify => "verify",
        };
        f.write_str(name)
    }
}

/// Opaque key naming one workflow instance. Panels are fully independent:
/// state and in-flight requests of one panel never affect another.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PanelId(pub String);

impl PanelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PanelId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Circuit family tag carried by every request. `Tree` captures the depth at
/// issue time, so edits to a depth input never reach an in-flight request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "circuit", rename_all = "lowercase")]
pub enum Circuit {
    #[serde(rename = "dl")]
    DiscreteLog,
    Tree { depth: u32 },
}

impl Circuit {
    pub fn depth(&self) -> Option<u32> {
        match self {
            Circuit::DiscreteLog => None,
            Circuit::Tree { depth } => Some(*depth),
        }
    }
}

/// Circuit family without its parameters; what a panel is bound to for its
/// whole lifetime, while the depth may vary per request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CircuitFamily {
    #[serde(rename = "dl")]
    DiscreteLog,
    Tree,
}

impl CircuitFamily {
    /// Concrete circuit tag for a request issued now, with the depth input
    /// captured at issue time.
    pub fn at_depth(self, depth: u32) -> Circuit {
        match self {
            CircuitFamily::DiscreteLog => Circuit::DiscreteLog,
            CircuitFamily::Tree => Circuit::Tree { depth },
        }
    }
}

/// Opaque serialized parameter blob produced by Generate and consumed by
/// Prove and Verify. Uninterpreted by every layer except the proving
/// backend itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(pub String);

impl Params {
    pub fn new(blob: impl Into<String>) -> Self {
        Self(blob.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len_bytes(&self) -> usize {
        self.0.len()
    }

    /// Size in kilobytes, rounded to the nearest whole unit, for display.
    pub fn size_kb(&self) -> u64 {
        ((self.0.len() as u64) + 512) / 1024
    }
}

/// Request body, one variant per operation kind. Matching on this enum is
/// exhaustive, so adding an operation is a compile-time-checked change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Operation {
    Generate,
    Prove {
        params: Params,
        x: String,
    },
    Verify {
        params: Params,
        proof: String,
        h: String,
    },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Generate => OperationKind::Generate,
            Operation::Prove { .. } => OperationKind::Prove,
            Operation::Verify { .. } => OperationKind::Verify,
        }
    }
}

/// One foreground→executor message. Constructed fresh per user action and
/// destroyed within a single round trip.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub request_id: Uuid,
    pub panel: PanelId,
    #[serde(flatten)]
    pub circuit: Circuit,
    #[serde(flatten)]
    pub op: Operation,
}

impl Request {
    pub fn new(panel: PanelId, circuit: Circuit, op: Operation) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            panel,
            circuit,
            op,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.op.kind()
    }
}

/// Successful result payload. Elapsed time is carried here, so it exists
/// only on the success path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpResult {
    Proved { proof: String, h: String, millis: u64 },
    Generated { params: Params, millis: u64 },
    Verified { result: bool, millis: u64 },
}

impl OpResult {
    pub fn kind(&self) -> OperationKind {
        match self {
            OpResult::Generated { .. } => OperationKind::Generate,
            OpResult::Proved { .. } => OperationKind::Prove,
            OpResult::Verified { .. } => OperationKind::Verify,
        }
    }
}

/// Success-or-error wrapper; serializes as `{"result": …}` or
/// `{"error": …}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outcome {
    Ok { result: OpResult },
    Err { error: String },
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok { .. })
    }
}

/// One executor→foreground message, tagged so the session can route it to
/// the panel and operation that issued the request, regardless of arrival
/// order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub request_id: Uuid,
    pub panel: PanelId,
    pub kind: OperationKind,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl ResponseEnvelope {
    pub fn ok(request: &Request, result: OpResult) -> Self {
        Self {
            request_id: request.request_id,
            panel: request.panel.clone(),
            kind: request.kind(),
            outcome: Outcome::Ok { result },
        }
    }

    pub fn err(request: &Request, message: impl Into<String>) -> Self {
        Self {
            request_id: request.request_id,
            panel: request.panel.clone(),
            kind: request.kind(),
            outcome: Outcome::Err {
                error: message.into(),
            },
        }
    }
}

/// Reverse-channel message. `Ready` is broadcast exactly once when the
/// backend finishes loading and is not correlated to any panel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ExecutorMsg {
    Ready,
    Response(ResponseEnvelope),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(op: Operation) -> Request {
        Request::new(PanelId::from("dl"), Circuit::DiscreteLog, op)
    }

    #[test]
    fn prove_request_wire_shape() {
        let req = Request::new(
            PanelId::from("tree-3"),
            Circuit::Tree { depth: 3 },
            Operation::Prove {
                params: Params::new("AAA"),
                x: "5".into(),
            },
        );
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["kind"], "prove");
        assert_eq!(value["panel"], "tree-3");
        assert_eq!(value["circuit"], "tree");
        assert_eq!(value["depth"], 3);
        assert_eq!(value["params"], "AAA");
        assert_eq!(value["x"], "5");
    }

    #[test]
    fn generate_request_omits_payload_fields() {
        let req = request(Operation::Generate);
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["kind"], "generate");
        assert_eq!(value["circuit"], "dl");
        assert!(value.get("depth").is_none());
        assert!(value.get("params").is_none());
    }

    #[test]
    fn ok_envelope_carries_millis_inside_result() {
        let req = request(Operation::Generate);
        let env = ResponseEnvelope::ok(
            &req,
            OpResult::Generated {
                params: Params::new("AAA"),
                millis: 42,
            },
        );
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["kind"], "generate");
        assert_eq!(value["result"]["params"], "AAA");
        assert_eq!(value["result"]["millis"], 42);
        assert!(value.get("error").is_none());
    }

    #[test]
    fn err_envelope_is_a_plain_message() {
        let req = request(Operation::Generate);
        let env = ResponseEnvelope::err(&req, NOT_READY_MSG);
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["error"], NOT_READY_MSG);
        assert!(value.get("result").is_none());
    }

    #[test]
    fn envelope_round_trips_through_json() {
        let req = request(Operation::Verify {
            params: Params::new("AAA"),
            proof: "PPP".into(),
            h: "HHH".into(),
        });
        let env = ResponseEnvelope::ok(
            &req,
            OpResult::Verified {
                result: true,
                millis: 7,
            },
        );
        let text = serde_json::to_string(&env).unwrap();
        let back: ResponseEnvelope = serde_json::from_str(&text).unwrap();
        assert_eq!(back, env);
    }

    #[test]
    fn ready_signal_has_no_panel_tag() {
        let value = serde_json::to_value(ExecutorMsg::Ready).unwrap();
        assert_eq!(value["type"], "ready");
        assert!(value.get("panel").is_none());
    }

    #[test]
    fn params_size_rounds_to_kilobytes() {
        assert_eq!(Params::new("x".repeat(1024)).size_kb(), 1);
        assert_eq!(Params::new("x".repeat(1536)).size_kb(), 2);
        assert_eq!(Params::new("x".repeat(100)).size_kb(), 0);
    }
}
