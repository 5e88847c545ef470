//! HTTP transport boundary.
//!
//! # Design
//! `HttpRequest` and `HttpResponse` describe the POST round-trip as plain
//! data. `VkClient::build_request` and `VkClient::parse_response` never touch
//! the network; the `Transport` trait is the single seam where I/O happens.
//! `UreqTransport` is the stock blocking implementation, and tests plug in
//! their own recorders behind the same trait.

use std::time::Duration;

use crate::error::TransportError;

/// A POST request described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// `application/x-www-form-urlencoded` body.
    pub body: String,
    /// Hard upper bound for the whole round-trip.
    pub timeout: Duration,
}

/// A response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }
}

/// Executes one POST round-trip.
///
/// Implementations must report non-2xx statuses as `Ok` responses; the
/// client maps them to `TransportError::Status` itself. Connection failures
/// and timeouts must come back as the matching `TransportError` variant.
pub trait Transport {
    fn post(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn post(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).post(request)
    }
}

/// Blocking transport backed by `ureq`.
///
/// A fresh agent is built per call so each request gets its own timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct UreqTransport;

impl Transport for UreqTransport {
    fn post(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(request.timeout))
            .build()
            .new_agent();

        let mut builder = agent.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let mut response = builder.send(request.body.as_bytes()).map_err(map_ureq_error)?;
        let status = response.status().as_u16();
        let body = response.body_mut().read_to_vec().map_err(map_ureq_error)?;

        Ok(HttpResponse { status, body })
    }
}

fn map_ureq_error(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Timeout(_) => TransportError::Timeout,
        ureq::Error::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => TransportError::Timeout,
        other => TransportError::Connection(other.to_string()),
    }
}
