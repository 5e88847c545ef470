//! Request building, dispatch and response unwrapping for the VK API.
//!
//! # Design
//! `VkClient` holds immutable config and a `Transport`; nothing mutates
//! between calls, so one client can be shared across threads when its
//! transport allows it. Each call is split into `build_request` (pure, given
//! the random token and timestamp) and `parse_response` (pure, given the
//! response), with `Transport::post` as the only I/O in between.
//!
//! A body normally holds one envelope but may hold several. `Reply` keeps
//! every classified document; `Reply::into_value` returns the last success,
//! or the last remote error when nothing succeeded.

use std::time::Duration;

use rand::Rng;
use serde_json::Value;
use tracing::{debug, warn};
use url::form_urlencoded;

use crate::config::ClientConfig;
use crate::error::{Error, TransportError};
use crate::http::{HttpRequest, HttpResponse, Transport, UreqTransport};
use crate::method::{Args, CallSpec, Family, MethodPath};
use crate::sign::signature;
use crate::stream::documents;
use crate::types::{unwrap_envelope, RemoteError};

/// Upper bound (inclusive) of the per-call `random` field.
pub const MAX_RANDOM: u32 = 1 << 30;

const RESPONSE_FORMAT: &str = "JSON";

/// Request fields in wire form, `sig` last when present.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignedParams {
    pairs: Vec<(String, String)>,
}

impl SignedParams {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `application/x-www-form-urlencoded` body.
    pub fn to_form(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish()
    }

    fn set(&mut self, key: &str, value: String) {
        match self.pairs.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.pairs.push((key.to_string(), value)),
        }
    }
}

/// Every document found in one response body, classified.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub documents: Vec<Result<Value, RemoteError>>,
}

impl Reply {
    /// Collapse to a single result.
    ///
    /// The last successful document wins; failing that, the last error.
    pub fn into_value(self) -> Result<Value, Error> {
        let mut last_error = None;
        let mut last_value = None;
        for document in self.documents {
            match document {
                Ok(value) => last_value = Some(value),
                Err(err) => last_error = Some(err),
            }
        }
        match (last_value, last_error) {
            (Some(value), _) => Ok(value),
            (None, Some(err)) => Err(Error::Remote(err)),
            (None, None) => Err(Error::MalformedResponse {
                reason: "no documents".into(),
                fragment: String::new(),
                range: None,
            }),
        }
    }
}

/// Client for the signed `api.php` endpoint.
#[derive(Debug, Clone)]
pub struct VkClient<T = UreqTransport> {
    config: ClientConfig,
    transport: T,
}

impl VkClient<UreqTransport> {
    /// Client configured from `VK_API_*` environment variables.
    pub fn from_env() -> Result<Self, Error> {
        Self::new(ClientConfig::from_env()?, UreqTransport)
    }
}

impl<T: Transport> VkClient<T> {
    pub fn new(config: ClientConfig, transport: T) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self { config, transport })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Flat or dotted method, e.g. `getServerTime` or `friends.get`.
    pub fn method(&self, name: &str) -> MethodCall<'_, T> {
        MethodCall::new(self, MethodPath::parse(name))
    }

    /// Entry point for a multi-segment family.
    pub fn namespace(&self, family: Family) -> Namespace<'_, T> {
        Namespace { client: self, family }
    }

    /// Call `method` with an explicit timeout.
    pub fn call(&self, method: &str, timeout: Duration, args: Args) -> Result<Value, Error> {
        let spec = CallSpec::new(MethodPath::parse(method)?, args).with_timeout(timeout);
        self.execute(&spec)
    }

    /// Like `call`, but keeps every document the body contained.
    pub fn call_all(&self, method: &str, timeout: Duration, args: Args) -> Result<Reply, Error> {
        let spec = CallSpec::new(MethodPath::parse(method)?, args).with_timeout(timeout);
        self.execute_all(&spec)
    }

    pub fn execute(&self, spec: &CallSpec) -> Result<Value, Error> {
        self.execute_all(spec)?.into_value()
    }

    pub fn execute_all(&self, spec: &CallSpec) -> Result<Reply, Error> {
        let random = rand::rng().random_range(0..=MAX_RANDOM);
        let timestamp = chrono::Utc::now().timestamp();
        let request = self.build_request(spec, random, timestamp);

        debug!(
            method = %spec.method,
            timeout_ms = u64::try_from(request.timeout.as_millis()).unwrap_or(u64::MAX),
            "calling VK API"
        );
        let response = self.transport.post(&request)?;
        self.parse_response(response)
    }

    /// Wire fields for `spec`, signed when a secret is configured.
    ///
    /// Caller arguments may override injected fields such as `v`; `sig` is
    /// always computed last over everything else.
    pub fn build_params(&self, spec: &CallSpec, random: u32, timestamp: i64) -> SignedParams {
        let mut params = SignedParams::default();
        params.set("api_id", self.config.credentials.app_id.clone());
        params.set("method", spec.method.wire_name());
        params.set("format", RESPONSE_FORMAT.to_string());
        params.set("v", self.config.api_version.clone());
        params.set("random", random.to_string());
        params.set("timestamp", timestamp.to_string());
        for (key, value) in spec.args.to_wire() {
            if key == "sig" {
                continue;
            }
            params.set(&key, value);
        }

        if let Some(secret) = &self.config.credentials.app_secret {
            let sig = signature(secret, params.iter());
            params.set("sig", sig);
        }
        params
    }

    pub fn build_request(&self, spec: &CallSpec, random: u32, timestamp: i64) -> HttpRequest {
        let params = self.build_params(spec, random, timestamp);
        HttpRequest {
            url: self.config.api_url.clone(),
            headers: vec![
                ("Accept".to_string(), "application/json".to_string()),
                (
                    "Content-Type".to_string(),
                    "application/x-www-form-urlencoded".to_string(),
                ),
            ],
            body: params.to_form(),
            timeout: spec.timeout.unwrap_or(self.config.timeout),
        }
    }

    /// Check the status, split the body into documents and classify each.
    ///
    /// Byte ranges in `MalformedResponse` refer to the body after lossy UTF-8
    /// decoding, which matches the raw bytes whenever the body is valid UTF-8.
    pub fn parse_response(&self, response: HttpResponse) -> Result<Reply, Error> {
        let text = String::from_utf8_lossy(&response.body);
        if !response.is_success() {
            return Err(TransportError::Status {
                status: response.status,
                body: text.into_owned(),
            }
            .into());
        }

        let mut classified = Vec::new();
        for document in documents(&text) {
            let document = document.map_err(|e| {
                warn!(start = e.range.start, end = e.range.end, "invalid JSON document in response");
                Error::MalformedResponse {
                    reason: e.message,
                    fragment: e.fragment,
                    range: Some(e.range),
                }
            })?;
            classified.push(unwrap_envelope(document.value));
        }

        if classified.is_empty() {
            return Err(Error::MalformedResponse {
                reason: "no complete JSON document in response".into(),
                fragment: text.trim().to_string(),
                range: None,
            });
        }
        if classified.len() > 1 {
            warn!(
                documents = classified.len(),
                errors = classified.iter().filter(|d| d.is_err()).count(),
                "response body held several JSON documents"
            );
        }
        Ok(Reply {
            documents: classified,
        })
    }
}

/// A multi-segment family bound to a client, e.g. `client.friends()`.
#[derive(Debug)]
pub struct Namespace<'a, T> {
    client: &'a VkClient<T>,
    family: Family,
}

impl<'a, T: Transport> Namespace<'a, T> {
    pub fn family(&self) -> Family {
        self.family
    }

    pub fn method(&self, name: &str) -> MethodCall<'a, T> {
        MethodCall::new(self.client, MethodPath::namespaced(self.family, name))
    }

    /// Shorthand for `method(name).args(args).send()`.
    pub fn call(&self, name: &str, args: Args) -> Result<Value, Error> {
        self.method(name).args(args).send()
    }
}

/// A pending call; nothing is sent until `send`.
#[derive(Debug)]
pub struct MethodCall<'a, T> {
    client: &'a VkClient<T>,
    method: Result<MethodPath, Error>,
    args: Args,
    timeout: Option<Duration>,
}

impl<'a, T: Transport> MethodCall<'a, T> {
    fn new(client: &'a VkClient<T>, method: Result<MethodPath, Error>) -> Self {
        Self {
            client,
            method,
            args: Args::new(),
            timeout: None,
        }
    }

    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key, value);
        self
    }

    /// Merge `args` into the call; later keys replace earlier ones.
    pub fn args(mut self, args: Args) -> Self {
        for (key, value) in args.iter() {
            self.args.insert(key, value.clone());
        }
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn into_spec(self) -> Result<CallSpec, Error> {
        Ok(CallSpec {
            method: self.method?,
            args: self.args,
            timeout: self.timeout,
        })
    }

    pub fn send(self) -> Result<Value, Error> {
        let client = self.client;
        client.execute(&self.into_spec()?)
    }

    pub fn send_all(self) -> Result<Reply, Error> {
        let client = self.client;
        client.execute_all(&self.into_spec()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Unreachable;

    impl Transport for Unreachable {
        fn post(&self, _request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            Err(TransportError::Connection("offline".into()))
        }
    }

    fn client() -> VkClient<Unreachable> {
        VkClient::new(ClientConfig::new("api_id", Some("api_secret".into())), Unreachable).unwrap()
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn empty_app_id_is_rejected() {
        let err = VkClient::new(ClientConfig::new("", None), Unreachable).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn params_carry_injected_fields_and_signature() {
        let spec = CallSpec::new(MethodPath::parse("getProfiles").unwrap(), Args::new().arg("uids", "1,2"));
        let params = client().build_params(&spec, 7, 1_355_095_295);

        assert_eq!(params.get("api_id"), Some("api_id"));
        assert_eq!(params.get("method"), Some("getProfiles"));
        assert_eq!(params.get("format"), Some("JSON"));
        assert_eq!(params.get("v"), Some("3.0"));
        assert_eq!(params.get("random"), Some("7"));
        assert_eq!(params.get("timestamp"), Some("1355095295"));
        assert_eq!(params.get("uids"), Some("1,2"));

        let unsigned: Vec<(&str, &str)> = params.iter().filter(|(k, _)| *k != "sig").collect();
        assert_eq!(params.get("sig"), Some(signature("api_secret", unsigned).as_str()));
        assert_eq!(params.iter().last().map(|(k, _)| k), Some("sig"));
    }

    #[test]
    fn caller_supplied_sig_is_ignored() {
        let spec = CallSpec::new(MethodPath::parse("getServerTime").unwrap(), Args::new().arg("sig", "forged"));
        let params = client().build_params(&spec, 1, 1);
        assert_ne!(params.get("sig"), Some("forged"));
        assert_eq!(params.iter().filter(|(k, _)| *k == "sig").count(), 1);
    }

    #[test]
    fn secretless_client_omits_sig() {
        let client = VkClient::new(ClientConfig::new("api_id", None), Unreachable).unwrap();
        let spec = CallSpec::new(MethodPath::parse("getServerTime").unwrap(), Args::new());
        let params = client.build_params(&spec, 1, 1);
        assert_eq!(params.get("sig"), None);
        assert_eq!(params.get("api_id"), Some("api_id"));
    }

    #[test]
    fn request_uses_form_encoding_and_default_timeout() {
        let spec = CallSpec::new(MethodPath::parse("search").unwrap(), Args::new().arg("q", "клен сад"));
        let req = client().build_request(&spec, 1, 1);

        assert_eq!(req.url, crate::config::DEFAULT_API_URL);
        assert_eq!(req.timeout, Duration::from_secs(1));
        assert!(req
            .headers
            .contains(&("Content-Type".to_string(), "application/x-www-form-urlencoded".to_string())));
        assert!(req.body.contains("q=%D0%BA%D0%BB%D0%B5%D0%BD+%D1%81%D0%B0%D0%B4"), "{}", req.body);
    }

    #[test]
    fn per_call_timeout_overrides_default() {
        let spec = CallSpec::new(MethodPath::parse("getServerTime").unwrap(), Args::new())
            .with_timeout(Duration::from_secs(5));
        assert_eq!(client().build_request(&spec, 1, 1).timeout, Duration::from_secs(5));
    }

    #[test]
    fn parse_unwraps_response() {
        let reply = client().parse_response(response(200, r#"{"response":123}"#)).unwrap();
        assert_eq!(reply.into_value().unwrap(), json!(123));
    }

    #[test]
    fn parse_non_2xx_is_transport_error() {
        let err = client().parse_response(response(503, "busy")).unwrap_err();
        match err {
            Error::Transport(TransportError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "busy");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parse_empty_body_is_malformed() {
        let err = client().parse_response(response(200, "  ")).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }));
    }

    #[test]
    fn parse_invalid_document_is_malformed_with_fragment() {
        let err = client().parse_response(response(200, r#"{"response":}"#)).unwrap_err();
        match err {
            Error::MalformedResponse { fragment, .. } => assert_eq!(fragment, r#"{"response":}"#),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn malformed_range_points_into_the_received_body() {
        let body = "\n  {\"response\":1}  {\"response\":}\n";
        let err = client().parse_response(response(200, body)).unwrap_err();
        match err {
            Error::MalformedResponse { fragment, range, .. } => {
                let range = range.expect("fragment range");
                assert_eq!(&body[range], fragment);
                assert_eq!(fragment, r#"{"response":}"#);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn last_success_wins_over_earlier_errors() {
        let body = r#"{"error":{"error_code":8,"error_msg":"a"}}{"response":1}{"error":{"error_code":9,"error_msg":"b"}}"#;
        let reply = client().parse_response(response(200, body)).unwrap();
        assert_eq!(reply.documents.len(), 3);
        assert_eq!(reply.into_value().unwrap(), json!(1));
    }

    #[test]
    fn last_error_wins_when_nothing_succeeds() {
        let body = r#"{"error":{"error_code":8,"error_msg":"a"}}{"error":{"error_code":9,"error_msg":"b"}}"#;
        let err = client().parse_response(response(200, body)).unwrap().into_value().unwrap_err();
        match err {
            Error::Remote(remote) => assert_eq!(remote.error_code, 9),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn transport_failure_propagates() {
        let err = client().method("getServerTime").send().unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Connection(_))));
    }

    #[test]
    fn invalid_method_surfaces_on_send() {
        let err = client().method("friends").send().unwrap_err();
        assert!(matches!(err, Error::InvalidMethod(_)));
    }

    #[test]
    fn chained_and_explicit_specs_match() {
        let c = client();
        let chained = c.friends().method("get").arg("uid", 642177).into_spec().unwrap();
        let explicit = CallSpec::new(MethodPath::parse("friends.get").unwrap(), Args::new().arg("uid", 642177));
        assert_eq!(chained, explicit);
        assert_eq!(c.namespace(Family::Friends).family(), Family::Friends);
    }
}
