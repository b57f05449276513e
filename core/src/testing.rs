//! In-crate test doubles.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::http::{HttpRequest, HttpResponse, Transport, TransportError};

/// Records every request and replays queued replies in order. Once the
/// queue is empty it answers `200 {}`.
#[derive(Default)]
pub struct StubTransport {
    requests: Mutex<Vec<HttpRequest>>,
    replies: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, status: u16, body: &str) {
        self.respond_with(status, Vec::new(), body);
    }

    pub fn respond_with(&self, status: u16, headers: Vec<(String, String)>, body: &str) {
        self.push(Ok(HttpResponse {
            status,
            headers,
            body: body.to_string(),
        }));
    }

    pub fn fail(&self, error: TransportError) {
        self.push(Err(error));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests().pop()
    }

    fn push(&self, reply: Result<HttpResponse, TransportError>) {
        self.replies.lock().unwrap_or_else(PoisonError::into_inner).push_back(reply);
    }
}

impl Transport for StubTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).push(request.clone());
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| {
                Ok(HttpResponse {
                    status: 200,
                    headers: Vec::new(),
                    body: "{}".to_string(),
                })
            })
    }
}
