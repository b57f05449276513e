//! Declarative endpoint definitions and the request pipeline that runs them.
//!
//! # Design
//! A `Blueprint` is an immutable description of one API call: verb, URL,
//! stored headers/params/body, and how to turn the response into objects
//! (target type, parser, builder, key replacements, after-build hook).
//! Deriving a variant goes through `to_builder`, which yields a new value.
//!
//! `Blueprint::run` walks the pipeline in order:
//! optional pre-send validation, request, status classification, parsing,
//! building, post-processing. The network round trip goes through the
//! runner's `Transport`, so the blueprint itself never performs I/O.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::builder::{with_reported_errors, BuildInput, Builder, ModelBuilder};
use crate::error::{Error, ResponseError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::key_replacer::Replacements;
use crate::model::{construction_errors, FieldErrors, Target};
use crate::outcome::Outcome;
use crate::parser::{JsonParser, Parser, Payload};
use crate::runner::Runner;

/// Ordered key → value mapping used for headers, params and bodies.
pub type Fields = Map<String, Value>;

/// Hook run on the built value: `(runner, built) → final`.
pub type AfterBuild = Arc<dyn Fn(&Runner, Outcome) -> Result<Outcome, Error> + Send + Sync>;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";
const USER_AGENT: &str = concat!("blueprint-core/", env!("CARGO_PKG_VERSION"));

/// Per-call overrides layered on a blueprint's stored options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOptions {
    pub headers: Fields,
    pub params: Fields,
    pub body: Fields,
    /// Build from `body` and stop early if the result is invalid.
    pub validate: bool,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn body_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.body.insert(name.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: Fields) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }
}

/// The fully merged options of one request. Also the input of cache
/// fingerprinting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestOptions {
    pub http_method: HttpMethod,
    pub url: String,
    pub headers: Fields,
    pub params: Fields,
    pub body: Fields,
}

/// Immutable specification of one API call plus build instructions.
#[derive(Clone)]
pub struct Blueprint {
    http_method: HttpMethod,
    url: String,
    headers: Fields,
    params: Fields,
    body: Fields,
    target: Option<Arc<dyn Target>>,
    parser: Arc<dyn Parser>,
    builder: Arc<dyn Builder>,
    replacements: Replacements,
    after_build: Option<AfterBuild>,
    log_responses: bool,
    timeout: Duration,
}

impl Blueprint {
    /// Start a `GET` blueprint for `url`.
    pub fn builder(url: impl Into<String>) -> BlueprintBuilder {
        BlueprintBuilder::new(url)
    }

    /// A builder prefilled with this blueprint, for deriving variants.
    pub fn to_builder(&self) -> BlueprintBuilder {
        BlueprintBuilder { inner: self.clone() }
    }

    pub fn http_method(&self) -> HttpMethod {
        self.http_method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &Fields {
        &self.headers
    }

    pub fn params(&self) -> &Fields {
        &self.params
    }

    pub fn body(&self) -> &Fields {
        &self.body
    }

    pub fn target(&self) -> Option<&dyn Target> {
        self.target.as_deref()
    }

    pub fn replacements(&self) -> &Replacements {
        &self.replacements
    }

    pub fn has_after_build(&self) -> bool {
        self.after_build.is_some()
    }

    pub fn log_responses(&self) -> bool {
        self.log_responses
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Stored options merged with `options`; per-call keys win.
    pub fn request_options(&self, options: &CallOptions) -> RequestOptions {
        RequestOptions {
            http_method: self.http_method,
            url: self.url.clone(),
            headers: merge(&self.headers, &options.headers),
            params: merge(&self.params, &options.params),
            body: merge(&self.body, &options.body),
        }
    }

    /// Execute the blueprint through `runner`'s transport.
    pub fn run(&self, options: CallOptions, runner: &Runner) -> Result<Outcome, Error> {
        if options.validate {
            let candidate = match self.build(Payload::Structured(Value::Object(options.body.clone())), &[], None) {
                Ok(candidate) => candidate,
                Err(Error::Construct { message, .. }) => {
                    let errors = construction_errors(&message);
                    tracing::debug!(url = %self.url, %message, "body cannot be constructed, request not sent");
                    return Ok(Outcome::Invalid(errors));
                }
                Err(err) => return Err(err),
            };
            if let Some(errors) = invalid(&candidate) {
                tracing::debug!(url = %self.url, fields = errors.len(), "validation failed, request not sent");
                return Ok(Outcome::Invalid(errors.clone()));
            }
        }

        let request = self.http_request(&self.request_options(&options))?;
        tracing::debug!(method = %request.method, url = %request.url, "sending request");
        let response = runner.transport().send(&request)?;
        tracing::debug!(status = response.status, url = %request.url, "received response");

        if runner.response_logging().allows(self.log_responses) {
            tracing::info!(
                target: "api_blueprint::response",
                status = response.status,
                headers = ?response.headers,
                body = %response.body,
                "{} {}",
                request.method,
                request.url
            );
        }

        classify(&response)?;

        let created = if self.target.is_some() {
            self.build(Payload::Text(response.body.clone()), &response.headers, Some(response.status))?
        } else {
            Outcome::Response(response)
        };

        match &self.after_build {
            Some(after_build) => after_build(runner, created),
            None => Ok(created),
        }
    }

    fn build(&self, payload: Payload, headers: &[(String, String)], status: Option<u16>) -> Result<Outcome, Error> {
        let body = self.parser.parse(payload);
        if !body.get("errors").is_some_and(Value::is_object) {
            return self.builder.build(self.build_input(body, headers, status));
        }
        let built = self.builder.build(self.build_input(body.clone(), headers, status));
        with_reported_errors(built, &self.build_input(body, headers, status))
    }

    fn build_input<'a>(&'a self, body: Value, headers: &'a [(String, String)], status: Option<u16>) -> BuildInput<'a> {
        BuildInput {
            body,
            headers,
            status,
            replacements: &self.replacements,
            target: self.target.as_deref(),
        }
    }

    fn http_request(&self, options: &RequestOptions) -> Result<HttpRequest, Error> {
        let mut headers = vec![
            ("Content-Type".to_string(), DEFAULT_CONTENT_TYPE.to_string()),
            ("User-Agent".to_string(), USER_AGENT.to_string()),
        ];
        for (name, value) in &options.headers {
            let Some(value) = scalar_text(value) else {
                continue;
            };
            headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
            headers.push((name.clone(), value));
        }

        let body = if options.body.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&options.body).map_err(|err| Error::Serialization(err.to_string()))?)
        };

        Ok(HttpRequest {
            method: options.http_method,
            url: options.url.clone(),
            headers,
            params: flatten_params(&options.params),
            body,
            timeout: self.timeout,
        })
    }
}

impl fmt::Debug for Blueprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blueprint")
            .field("http_method", &self.http_method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("params", &self.params)
            .field("body", &self.body)
            .field("target", &self.target.as_ref().map(|target| target.name()))
            .field("replacements", &self.replacements)
            .field("after_build", &self.after_build.is_some())
            .field("log_responses", &self.log_responses)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Builder for `Blueprint`.
#[derive(Clone, Debug)]
pub struct BlueprintBuilder {
    inner: Blueprint,
}

impl BlueprintBuilder {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            inner: Blueprint {
                http_method: HttpMethod::Get,
                url: url.into(),
                headers: Fields::new(),
                params: Fields::new(),
                body: Fields::new(),
                target: None,
                parser: Arc::new(JsonParser),
                builder: Arc::new(ModelBuilder),
                replacements: Replacements::new(),
                after_build: None,
                log_responses: false,
                timeout: DEFAULT_TIMEOUT,
            },
        }
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.inner.http_method = method;
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.inner.url = url.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inner.headers.insert(name.into(), value.into());
        self
    }

    pub fn headers(mut self, headers: Fields) -> Self {
        self.inner.headers.extend(headers);
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inner.params.insert(name.into(), value.into());
        self
    }

    pub fn body_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inner.body.insert(name.into(), value.into());
        self
    }

    pub fn target(mut self, target: Arc<dyn Target>) -> Self {
        self.inner.target = Some(target);
        self
    }

    pub fn parser(mut self, parser: Arc<dyn Parser>) -> Self {
        self.inner.parser = parser;
        self
    }

    pub fn builder(mut self, builder: Arc<dyn Builder>) -> Self {
        self.inner.builder = builder;
        self
    }

    pub fn replacements(mut self, replacements: Replacements) -> Self {
        self.inner.replacements = replacements;
        self
    }

    pub fn after_build<F>(mut self, after_build: F) -> Self
    where
        F: Fn(&Runner, Outcome) -> Result<Outcome, Error> + Send + Sync + 'static,
    {
        self.inner.after_build = Some(Arc::new(after_build));
        self
    }

    pub fn log_responses(mut self, log_responses: bool) -> Self {
        self.inner.log_responses = log_responses;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.inner.timeout = timeout;
        self
    }

    pub fn build(self) -> Blueprint {
        self.inner
    }
}

impl From<BlueprintBuilder> for Blueprint {
    fn from(builder: BlueprintBuilder) -> Self {
        builder.build()
    }
}

/// Map error statuses to their error kinds.
///
/// 401 and 404 get dedicated kinds, the rest of 402..=499 is a client error,
/// 500..=599 a server error. Everything else, 400 included, is handed to the
/// builder so API-side field errors reach the caller.
pub fn classify(response: &HttpResponse) -> Result<(), Error> {
    let rejected = || ResponseError {
        status: response.status,
        headers: response.headers.clone(),
        body: response.body.clone(),
    };
    match response.status {
        401 => Err(Error::Unauthenticated(rejected())),
        404 => Err(Error::NotFound(rejected())),
        402..=499 => Err(Error::Client(rejected())),
        500..=599 => Err(Error::Server(rejected())),
        _ => Ok(()),
    }
}

fn merge(stored: &Fields, overrides: &Fields) -> Fields {
    let mut merged = stored.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

fn invalid(outcome: &Outcome) -> Option<&FieldErrors> {
    match outcome {
        Outcome::One(resource) if !resource.is_valid() => Some(resource.errors()),
        Outcome::Many(resources) => resources
            .iter()
            .find(|resource| !resource.is_valid())
            .map(|resource| resource.errors()),
        _ => None,
    }
}

/// Text form of a header or param value. `null` means "omit".
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// Flat-encode params: an array value becomes one pair per element.
fn flatten_params(params: &Fields) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(params.len());
    for (key, value) in params {
        match value {
            Value::Array(items) => {
                pairs.extend(items.iter().filter_map(scalar_text).map(|item| (key.clone(), item)));
            }
            value => {
                if let Some(text) = scalar_text(value) {
                    pairs.push((key.clone(), text));
                }
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::TransportError;
    use crate::model::{target, Model};
    use crate::testing::StubTransport;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize)]
    struct Car {
        #[serde(default)]
        name: String,
        #[serde(default)]
        color: String,
    }

    impl Model for Car {
        const NAME: &'static str = "Car";

        fn validate(&self, errors: &mut FieldErrors) {
            if self.name.is_empty() {
                errors.add("name", "can't be blank");
            }
        }
    }

    /// A model whose attributes are all required.
    #[derive(Debug, Serialize, Deserialize)]
    struct Truck {
        name: String,
        color: String,
    }

    impl Model for Truck {
        const NAME: &'static str = "Truck";
    }

    fn runner(stub: &Arc<StubTransport>) -> Runner {
        Runner::new(stub.clone())
    }

    fn options_blueprint() -> Blueprint {
        Blueprint::builder("/foo")
            .method(HttpMethod::Post)
            .header("someHeader", "header")
            .param("someParam", "param")
            .body_field("someBody", "body")
            .build()
    }

    #[test]
    fn defaults() {
        let blueprint = Blueprint::builder("/foo").build();
        assert_eq!(blueprint.http_method(), HttpMethod::Get);
        assert_eq!(blueprint.url(), "/foo");
        assert!(blueprint.headers().is_empty());
        assert!(blueprint.params().is_empty());
        assert!(blueprint.body().is_empty());
        assert!(blueprint.target().is_none());
        assert!(blueprint.replacements().is_empty());
        assert!(!blueprint.has_after_build());
        assert!(!blueprint.log_responses());
        assert_eq!(blueprint.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn request_options_include_stored_values() {
        let options = options_blueprint().request_options(&CallOptions::new());
        assert_eq!(options.http_method, HttpMethod::Post);
        assert_eq!(options.url, "/foo");
        assert_eq!(Value::Object(options.headers), json!({ "someHeader": "header" }));
        assert_eq!(Value::Object(options.params), json!({ "someParam": "param" }));
        assert_eq!(Value::Object(options.body), json!({ "someBody": "body" }));
    }

    #[test]
    fn request_options_merge_overrides() {
        let call = CallOptions::new()
            .header("aNewHeader", "hi")
            .param("aNewParam", "hi")
            .body_field("aNewBody", "hi");
        let options = options_blueprint().request_options(&call);
        assert_eq!(
            Value::Object(options.headers),
            json!({ "someHeader": "header", "aNewHeader": "hi" })
        );
        assert_eq!(Value::Object(options.params), json!({ "someParam": "param", "aNewParam": "hi" }));
        assert_eq!(Value::Object(options.body), json!({ "someBody": "body", "aNewBody": "hi" }));
    }

    #[test]
    fn per_call_values_win_on_conflict() {
        let blueprint = Blueprint::builder("http://foo").header("hello", "ksdjksjdj").build();
        let options = blueprint.request_options(&CallOptions::new().header("hello", "world"));
        assert_eq!(options.headers["hello"], "world");
    }

    #[test]
    fn sends_the_composed_request() {
        let stub = Arc::new(StubTransport::new());
        let blueprint = Blueprint::builder("http://web/foo")
            .method(HttpMethod::Post)
            .header("foo", "bar")
            .param("hello", "world")
            .param("ids", json!([1, 2]))
            .body_field("name", "Ford")
            .timeout(Duration::from_secs(9))
            .build();

        blueprint.run(CallOptions::new().param("foo", "bar"), &runner(&stub)).unwrap();

        let request = stub.last_request().unwrap();
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.url, "http://web/foo");
        assert_eq!(request.header("foo"), Some("bar"));
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(
            request.params,
            vec![
                ("hello".to_string(), "world".to_string()),
                ("ids".to_string(), "1".to_string()),
                ("ids".to_string(), "2".to_string()),
                ("foo".to_string(), "bar".to_string()),
            ]
        );
        assert_eq!(request.body.as_deref(), Some(r#"{"name":"Ford"}"#));
        assert_eq!(request.timeout, Duration::from_secs(9));
    }

    #[test]
    fn content_type_can_be_overridden() {
        let stub = Arc::new(StubTransport::new());
        let blueprint = Blueprint::builder("http://web/foo").build();
        blueprint
            .run(CallOptions::new().header("content-type", "text/plain"), &runner(&stub))
            .unwrap();
        let request = stub.last_request().unwrap();
        assert_eq!(request.header("Content-Type"), Some("text/plain"));
        assert_eq!(
            request.headers.iter().filter(|(name, _)| name.eq_ignore_ascii_case("content-type")).count(),
            1
        );
    }

    #[test]
    fn empty_body_is_not_sent() {
        let stub = Arc::new(StubTransport::new());
        Blueprint::builder("http://web/foo").build().run(CallOptions::new(), &runner(&stub)).unwrap();
        assert!(stub.last_request().unwrap().body.is_none());
    }

    #[test]
    fn returns_the_response_without_a_target() {
        let stub = Arc::new(StubTransport::new());
        stub.respond(200, r#"{"name":"Ford"}"#);
        let outcome = Blueprint::builder("http://car").build().run(CallOptions::new(), &runner(&stub)).unwrap();
        let response = outcome.as_response().unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, r#"{"name":"Ford"}"#);
    }

    #[test]
    fn builds_the_target() {
        let stub = Arc::new(StubTransport::new());
        stub.respond_with(
            200,
            vec![("Some-Header".to_string(), "is-included!".to_string())],
            r#"{"name":"Ford","color":"red"}"#,
        );
        let outcome = Blueprint::builder("http://car")
            .target(target::<Car>())
            .build()
            .run(CallOptions::new(), &runner(&stub))
            .unwrap();
        let car = outcome.as_one().unwrap();
        assert_eq!(car.get("name"), Some(&json!("Ford")));
        assert_eq!(car.response_status(), Some(200));
        assert_eq!(
            car.response_headers().unwrap(),
            &[("Some-Header".to_string(), "is-included!".to_string())]
        );
    }

    #[test]
    fn malformed_body_degrades_gracefully() {
        let stub = Arc::new(StubTransport::new());
        stub.respond(200, "");
        let outcome = Blueprint::builder("http://cities")
            .target(target::<Car>())
            .build()
            .run(CallOptions::new(), &runner(&stub))
            .unwrap();
        assert_eq!(outcome.as_one().unwrap().get("name"), Some(&json!("")));
    }

    #[test]
    fn classifies_error_statuses() {
        let cases: [(u16, fn(&Error) -> bool); 6] = [
            (401, |err| matches!(err, Error::Unauthenticated(_))),
            (403, |err| matches!(err, Error::Client(_))),
            (404, |err| matches!(err, Error::NotFound(_))),
            (422, |err| matches!(err, Error::Client(_))),
            (500, |err| matches!(err, Error::Server(_))),
            (503, |err| matches!(err, Error::Server(_))),
        ];
        for (status, expected) in cases {
            let stub = Arc::new(StubTransport::new());
            stub.respond(status, "oops");
            let err = Blueprint::builder("http://cities")
                .target(target::<Car>())
                .build()
                .run(CallOptions::new(), &runner(&stub))
                .unwrap_err();
            assert!(expected(&err), "{status} classified as {err:?}");
            assert_eq!(err.response().unwrap().body, "oops");
        }
    }

    #[test]
    fn success_statuses_never_raise() {
        for status in [200, 201, 204, 299] {
            let stub = Arc::new(StubTransport::new());
            stub.respond(status, "{}");
            let outcome = Blueprint::builder("http://anything").build().run(CallOptions::new(), &runner(&stub));
            assert!(outcome.is_ok(), "{status} should not raise");
        }
    }

    #[test]
    fn bad_request_surfaces_field_errors() {
        let stub = Arc::new(StubTransport::new());
        stub.respond(400, r#"{"name":"London City","errors":{"name":["some error","another error"]}}"#);
        let outcome = Blueprint::builder("http://cities")
            .target(target::<Car>())
            .build()
            .run(CallOptions::new(), &runner(&stub))
            .unwrap();
        let city = outcome.as_one().unwrap();
        assert_eq!(city.get("name"), Some(&json!("London City")));
        assert!(city.errors().get("name").contains(&"some error".to_string()));
        assert!(city.errors().get("name").contains(&"another error".to_string()));
        assert!(!city.is_success());
    }

    #[test]
    fn transport_failures_become_named_errors() {
        let stub = Arc::new(StubTransport::new());
        stub.fail(TransportError::Timeout);
        let err = Blueprint::builder("http://slow").build().run(CallOptions::new(), &runner(&stub)).unwrap_err();
        assert!(matches!(err, Error::Timeout));

        stub.fail(TransportError::ConnectionFailed("refused".to_string()));
        let err = Blueprint::builder("http://down").build().run(CallOptions::new(), &runner(&stub)).unwrap_err();
        assert!(matches!(err, Error::ConnectionFailed(_)));
    }

    #[test]
    fn validation_short_circuits_before_sending() {
        let stub = Arc::new(StubTransport::new());
        let outcome = Blueprint::builder("http://cars")
            .method(HttpMethod::Post)
            .target(target::<Car>())
            .build()
            .run(CallOptions::new().validate(true).body_field("color", "red"), &runner(&stub))
            .unwrap();
        let errors = outcome.as_invalid().unwrap();
        assert_eq!(errors.get("name"), &["can't be blank".to_string()]);
        assert!(stub.requests().is_empty());
    }

    #[test]
    fn missing_required_attributes_short_circuit_before_sending() {
        let stub = Arc::new(StubTransport::new());
        let outcome = Blueprint::builder("http://trucks")
            .method(HttpMethod::Post)
            .target(target::<Truck>())
            .build()
            .run(CallOptions::new().validate(true).body_field("color", "red"), &runner(&stub))
            .unwrap();
        let errors = outcome.as_invalid().unwrap();
        assert_eq!(errors.get("name"), &["can't be blank".to_string()]);
        assert!(stub.requests().is_empty());
    }

    #[test]
    fn mistyped_attributes_short_circuit_before_sending() {
        let stub = Arc::new(StubTransport::new());
        let outcome = Blueprint::builder("http://trucks")
            .method(HttpMethod::Post)
            .target(target::<Truck>())
            .build()
            .run(
                CallOptions::new().validate(true).body_field("name", 7).body_field("color", "red"),
                &runner(&stub),
            )
            .unwrap();
        assert!(outcome.as_invalid().unwrap().contains(crate::model::BASE_FIELD));
        assert!(stub.requests().is_empty());
    }

    #[test]
    fn reported_errors_reach_models_with_required_attributes() {
        let stub = Arc::new(StubTransport::new());
        stub.respond(400, r#"{"name":"Ford","color":null,"errors":{"color":["can't be blank"]}}"#);
        let outcome = Blueprint::builder("http://trucks")
            .method(HttpMethod::Post)
            .target(target::<Truck>())
            .build()
            .run(CallOptions::new(), &runner(&stub))
            .unwrap();
        let truck = outcome.as_one().unwrap();
        assert_eq!(truck.response_status(), Some(400));
        assert_eq!(truck.get("name"), Some(&json!("Ford")));
        assert_eq!(truck.errors().get("color"), &["can't be blank".to_string()]);
        assert!(!truck.is_success());
    }

    #[test]
    fn reported_errors_apply_after_custom_builders() {
        struct Plain;
        impl Builder for Plain {
            fn build(&self, input: BuildInput<'_>) -> Result<Outcome, Error> {
                let Value::Object(attributes) = input.body else {
                    return Err(Error::Builder("expected a mapping".to_string()));
                };
                Ok(Outcome::One(crate::model::Resource::new("Plain", attributes)))
            }
        }

        let stub = Arc::new(StubTransport::new());
        stub.respond(400, r#"{"name":"Ford","errors":{"name":"is taken"}}"#);
        let outcome = Blueprint::builder("http://plain")
            .target(target::<Car>())
            .build()
            .to_builder()
            .builder(Arc::new(Plain))
            .build()
            .run(CallOptions::new(), &runner(&stub))
            .unwrap();
        let plain = outcome.as_one().unwrap();
        assert_eq!(plain.type_name(), "Plain");
        assert_eq!(plain.errors().get("name"), &["is taken".to_string()]);
    }

    #[test]
    fn valid_input_is_sent() {
        let stub = Arc::new(StubTransport::new());
        stub.respond(201, r#"{"name":"Ford","color":"red"}"#);
        let outcome = Blueprint::builder("http://cars")
            .method(HttpMethod::Post)
            .target(target::<Car>())
            .build()
            .run(CallOptions::new().validate(true).body_field("name", "Ford"), &runner(&stub))
            .unwrap();
        assert!(outcome.as_one().is_some());
        assert_eq!(stub.requests().len(), 1);
    }

    #[test]
    fn after_build_replaces_the_result() {
        let stub = Arc::new(StubTransport::new());
        stub.respond(200, r#"{"name":"Ford"}"#);
        let outcome = Blueprint::builder("http://car")
            .target(target::<Car>())
            .after_build(|_, built| {
                let name = built.as_one().and_then(|car| car.get("name")).cloned();
                Ok(Outcome::Value(json!({ "wrapped": name })))
            })
            .build()
            .run(CallOptions::new(), &runner(&stub))
            .unwrap();
        assert_eq!(outcome, Outcome::Value(json!({ "wrapped": "Ford" })));
    }

    #[test]
    fn custom_parser_is_used() {
        struct Upper;
        impl Parser for Upper {
            fn parse(&self, payload: Payload) -> Value {
                match payload {
                    Payload::Text(text) => JsonParser.parse(Payload::Text(text.to_uppercase())),
                    Payload::Structured(value) => value,
                }
            }
        }

        let stub = Arc::new(StubTransport::new());
        stub.respond(200, r#"{"name":"ford"}"#);
        let outcome = Blueprint::builder("http://parser")
            .target(target::<Car>())
            .parser(Arc::new(Upper))
            .replacements(Replacements::new().rename("NAME", "name"))
            .build()
            .run(CallOptions::new(), &runner(&stub))
            .unwrap();
        assert_eq!(outcome.as_one().unwrap().get("name"), Some(&json!("FORD")));
    }

    #[test]
    fn derived_blueprint_uses_custom_builder() {
        struct Fixed;
        impl Builder for Fixed {
            fn build(&self, _input: BuildInput<'_>) -> Result<Outcome, Error> {
                Ok(Outcome::Value(json!("fixed")))
            }
        }

        let stub = Arc::new(StubTransport::new());
        let original = Blueprint::builder("http://car").target(target::<Car>()).build();
        let derived = original.to_builder().builder(Arc::new(Fixed)).build();

        assert_eq!(derived.run(CallOptions::new(), &runner(&stub)).unwrap(), Outcome::Value(json!("fixed")));
        assert!(original.run(CallOptions::new(), &runner(&stub)).unwrap().as_one().is_some());
    }
}
