//! # Request Router
//!
//! Maps proof kinds to enabled endpoints and checks request shape before
//! any backend work is scheduled. Only the envelope is inspected: the body
//! must be a JSON object carrying an `input` member that is itself an
//! object. Fields inside `input` belong to the backend and are not read.

use ewp_core::{KindRegistry, ProofKind};
use ewp_zkp::Witness;
use serde_json::Value;

use crate::service::ServiceError;

/// A validated proof request.
#[derive(Debug, Clone, PartialEq)]
pub struct ProofRequest {
    pub kind: ProofKind,
    pub witness: Witness,
}

/// Kind-to-endpoint mapping plus envelope validation.
#[derive(Debug, Clone, Default)]
pub struct RequestRouter {
    registry: KindRegistry,
}

impl RequestRouter {
    pub fn new(registry: KindRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &KindRegistry {
        &self.registry
    }

    /// Kinds that receive a route, in declaration order.
    pub fn enabled_kinds(&self) -> Vec<ProofKind> {
        self.registry.enabled()
    }

    pub fn is_enabled(&self, kind: ProofKind) -> bool {
        self.registry.is_enabled(kind)
    }

    /// Resolve a request path (`/prove/claim`) to an enabled kind.
    pub fn resolve(&self, path: &str) -> Option<ProofKind> {
        let name = path.strip_prefix("/prove/")?;
        let kind: ProofKind = name.parse().ok()?;
        self.is_enabled(kind).then_some(kind)
    }

    /// Check the request envelope and extract the witness.
    ///
    /// # Errors
    ///
    /// [`ServiceError::InvalidRequest`] when the body is not an object, has
    /// no `input` member, or `input` is not an object.
    pub fn validate(&self, kind: ProofKind, payload: Value) -> Result<ProofRequest, ServiceError> {
        let Value::Object(mut body) = payload else {
            return Err(ServiceError::InvalidRequest(
                "request body must be a JSON object".to_string(),
            ));
        };
        match body.remove("input") {
            Some(Value::Object(witness)) => Ok(ProofRequest { kind, witness }),
            Some(other) => Err(ServiceError::InvalidRequest(format!(
                "`input` must be a JSON object, got {}",
                json_type(&other)
            ))),
            None => Err(ServiceError::InvalidRequest(
                "missing required field `input`".to_string(),
            )),
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn router() -> RequestRouter {
        RequestRouter::new(KindRegistry::default())
    }

    #[test]
    fn validate_extracts_input() {
        let req = router()
            .validate(ProofKind::Claim, json!({"input": {"a": 1}}))
            .unwrap();
        assert_eq!(req.kind, ProofKind::Claim);
        assert_eq!(req.witness.get("a"), Some(&json!(1)));
    }

    #[test]
    fn extra_top_level_fields_are_ignored() {
        let req = router()
            .validate(ProofKind::Claim, json!({"input": {}, "trace": true}))
            .unwrap();
        assert!(req.witness.is_empty());
    }

    #[test]
    fn witness_contents_are_untouched() {
        let input = json!({"nested": {"deep": [1, 2, {"x": null}]}, "n": 1.5});
        let req = router()
            .validate(ProofKind::EmailSender, json!({"input": input.clone()}))
            .unwrap();
        assert_eq!(Value::Object(req.witness), input);
    }

    #[test]
    fn missing_input_rejected() {
        let err = router()
            .validate(ProofKind::Claim, json!({"witness": {}}))
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(ref m) if m.contains("input")));
    }

    #[test]
    fn non_object_input_rejected() {
        for input in [json!(null), json!(1), json!("x"), json!([1]), json!(true)] {
            let err = router()
                .validate(ProofKind::Claim, json!({ "input": input }))
                .unwrap_err();
            assert!(matches!(err, ServiceError::InvalidRequest(_)));
        }
    }

    #[test]
    fn non_object_body_rejected() {
        let err = router()
            .validate(ProofKind::Claim, json!([{"input": {}}]))
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(ref m) if m.contains("object")));
    }

    #[test]
    fn resolve_enabled_paths() {
        let r = router();
        assert_eq!(r.resolve("/prove/claim"), Some(ProofKind::Claim));
        assert_eq!(
            r.resolve("/prove/account_creation"),
            Some(ProofKind::AccountCreation)
        );
        assert_eq!(r.resolve("/prove/email_sender"), Some(ProofKind::EmailSender));
    }

    #[test]
    fn resolve_rejects_disabled_and_unknown() {
        let r = router();
        assert_eq!(r.resolve("/prove/account_init"), None);
        assert_eq!(r.resolve("/prove/account_transport"), None);
        assert_eq!(r.resolve("/prove/teleport"), None);
        assert_eq!(r.resolve("/prove/claim/extra"), None);
        assert_eq!(r.resolve("/claim"), None);
    }

    #[test]
    fn enabled_kinds_follow_registry() {
        let r = RequestRouter::new(KindRegistry::with_enabled([ProofKind::AccountInit]));
        assert_eq!(r.enabled_kinds(), vec![ProofKind::AccountInit]);
        assert!(!r.is_enabled(ProofKind::Claim));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn non_object() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| serde_json::json!(n)),
            ".{0,16}".prop_map(Value::String),
            prop::collection::vec(any::<i32>(), 0..4).prop_map(|v| serde_json::json!(v)),
        ]
    }

    proptest! {
        /// Any `input` that is not an object is refused.
        #[test]
        fn non_object_input_always_rejected(input in non_object()) {
            let router = RequestRouter::default();
            let result = router.validate(ProofKind::Claim, serde_json::json!({ "input": input }));
            prop_assert!(matches!(result, Err(ServiceError::InvalidRequest(_))));
        }

        /// Any object `input` is accepted and passed through unchanged.
        #[test]
        fn object_input_passes_through(
            fields in prop::collection::btree_map("[a-z]{1,6}", any::<i64>(), 0..6)
        ) {
            let input: Witness = fields
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::json!(v)))
                .collect();
            let router = RequestRouter::default();
            let req = router
                .validate(ProofKind::Claim, serde_json::json!({ "input": input.clone() }))
                .unwrap();
            prop_assert_eq!(req.witness, input);
        }
    }
}
