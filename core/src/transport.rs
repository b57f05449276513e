//! Blocking `Transport` backed by ureq.
//!
//! Status codes come back as data: ureq is configured not to turn 4xx/5xx
//! into errors, so classification stays in the blueprint pipeline. Only
//! timeouts and connection-level failures are reported as
//! `TransportError`.

use std::io;

use ureq::Agent;

use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError};

/// Sends requests with a fresh ureq agent configured for each request's
/// timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct UreqTransport;

impl UreqTransport {
    pub fn new() -> Self {
        Self
    }

    fn agent(request: &HttpRequest) -> Agent {
        Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(request.timeout))
            .build()
            .new_agent()
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let agent = Self::agent(request);
        let url = url_with_params(&request.url, &request.params)?;
        let body = request.body.as_deref();

        macro_rules! with_headers {
            ($builder:expr) => {{
                let mut builder = $builder;
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder
            }};
        }

        let result = match request.method {
            HttpMethod::Get => with_headers!(agent.get(&url)).call(),
            HttpMethod::Head => with_headers!(agent.head(&url)).call(),
            HttpMethod::Delete => with_headers!(agent.delete(&url)).call(),
            HttpMethod::Options => with_headers!(agent.options(&url)).call(),
            HttpMethod::Trace => with_headers!(agent.trace(&url)).call(),
            HttpMethod::Post => send_body(with_headers!(agent.post(&url)), body),
            HttpMethod::Put => send_body(with_headers!(agent.put(&url)), body),
            HttpMethod::Patch => send_body(with_headers!(agent.patch(&url)), body),
        };

        let mut response = result.map_err(transport_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.body_mut().read_to_string().map_err(transport_error)?;

        Ok(HttpResponse { status, headers, body })
    }
}

fn send_body(
    builder: ureq::RequestBuilder<ureq::typestate::WithBody>,
    body: Option<&str>,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    match body {
        Some(body) => builder.send(body.as_bytes()),
        None => builder.send_empty(),
    }
}

fn url_with_params(base: &str, params: &[(String, String)]) -> Result<String, TransportError> {
    if params.is_empty() {
        return Ok(base.to_string());
    }
    let mut url = url::Url::parse(base).map_err(|err| TransportError::Other(format!("invalid url `{base}`: {err}")))?;
    url.query_pairs_mut()
        .extend_pairs(params.iter().map(|(key, value)| (key.as_str(), value.as_str())));
    Ok(url.to_string())
}

fn transport_error(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Timeout(_) => TransportError::Timeout,
        ureq::Error::HostNotFound | ureq::Error::ConnectionFailed => {
            TransportError::ConnectionFailed(err.to_string())
        }
        ureq::Error::Io(io_err) => match io_err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportError::Timeout,
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::BrokenPipe => TransportError::ConnectionFailed(io_err.to_string()),
            _ => TransportError::Other(io_err.to_string()),
        },
        other => TransportError::Other(other.to_string()),
    }
}
