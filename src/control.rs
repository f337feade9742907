//! HTTP control interface.
//!
//! `POST /setFrequency` with `{"frequency": <Hz>}` retunes the oscillator,
//! `GET /frequency` reports the current setting and `/` serves the control
//! page. Routing is a plain function over method, path and body so it can be
//! exercised without a socket.

use std::fmt;
use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use slog::Logger;
use tiny_http::{Header, Method, Request, Response, Server};

use crate::error::{Error, Result};
use crate::oscillator::Oscillator;

const EMBEDDED_PAGE: &str = include_str!("../static/index.html");

/// Larger request bodies are truncated before parsing.
const MAX_BODY: u64 = 64 * 1024;

#[derive(Deserialize)]
struct FrequencyRequest {
    frequency: f64,
}

#[derive(Serialize)]
struct FrequencyStatus {
    frequency: f64,
    sample_rate: u32,
}

#[derive(Debug)]
pub enum ControlError {
    InvalidJson(String),
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ControlError::InvalidJson(message) => write!(f, "invalid request: {}", message),
        }
    }
}

/// Extract the `frequency` field. Missing, non-numeric or non-JSON input is rejected.
pub fn parse_frequency(body: &[u8]) -> std::result::Result<f64, ControlError> {
    serde_json::from_slice::<FrequencyRequest>(body)
        .map(|request| request.frequency)
        .map_err(|e| ControlError::InvalidJson(e.to_string()))
}

pub enum IndexPage {
    Embedded,
    /// Read from disk on every request.
    File(PathBuf),
}

impl IndexPage {
    pub fn from_config(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) => IndexPage::File(path),
            None => IndexPage::Embedded,
        }
    }

    fn load(&self) -> Option<Vec<u8>> {
        match self {
            IndexPage::Embedded => Some(EMBEDDED_PAGE.as_bytes().to_vec()),
            IndexPage::File(path) => std::fs::read(path).ok(),
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub content_type: Option<&'static str>,
    pub body: Vec<u8>,
}

impl Reply {
    fn empty(status: u16) -> Self {
        Reply {
            status,
            content_type: None,
            body: Vec::new(),
        }
    }

    fn text(status: u16, text: String) -> Self {
        Reply {
            status,
            content_type: Some("text/plain; charset=utf-8"),
            body: text.into_bytes(),
        }
    }
}

/// Map one request onto the oscillator.
pub fn route(
    method: &Method,
    url: &str,
    body: &[u8],
    oscillator: &Oscillator,
    page: &IndexPage,
    logger: &Logger,
) -> Reply {
    let path = url.split('?').next().unwrap_or(url);
    match (method, path) {
        (_, "/setFrequency") => match parse_frequency(body) {
            Ok(frequency) => {
                oscillator.set_frequency(frequency);
                info!(logger, "frequency changed"; "frequency" => frequency);
                Reply::empty(200)
            }
            Err(e) => {
                warn!(logger, "rejected frequency change"; "error" => %e);
                Reply::text(400, e.to_string())
            }
        },
        (Method::Get, "/frequency") => {
            let status = FrequencyStatus {
                frequency: oscillator.frequency(),
                sample_rate: oscillator.sample_rate(),
            };
            match serde_json::to_vec(&status) {
                Ok(body) => Reply {
                    status: 200,
                    content_type: Some("application/json"),
                    body,
                },
                Err(e) => Reply::text(500, e.to_string()),
            }
        }
        (Method::Get, "/") | (Method::Get, "/index.html") => match page.load() {
            Some(body) => Reply {
                status: 200,
                content_type: Some("text/html; charset=utf-8"),
                body,
            },
            None => Reply::text(404, "index page not found".to_string()),
        },
        _ => Reply::text(404, "not found".to_string()),
    }
}

pub struct ControlServer {
    server: Server,
    oscillator: Arc<Oscillator>,
    page: IndexPage,
    logger: Logger,
}

impl ControlServer {
    pub fn bind(address: &str, oscillator: Arc<Oscillator>, page: IndexPage) -> Result<Self> {
        let server = Server::http(address).map_err(|e| Error::BindError(e.to_string()))?;
        let logger = slog_scope::logger().new(o!("component" => "control"));
        info!(logger, "control server listening"; "address" => address);
        Ok(ControlServer {
            server,
            oscillator,
            page,
            logger,
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Wait up to `timeout` for one request and answer it. Returns whether a
    /// request was handled.
    pub fn serve_once(&self, timeout: Duration) -> Result<bool> {
        match self.server.recv_timeout(timeout)? {
            Some(request) => {
                self.handle(request);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Serve requests for as long as `keep_running` holds, checking it at
    /// least every `poll` interval.
    pub fn run_while<F>(&self, poll: Duration, keep_running: F) -> Result<()>
    where
        F: Fn() -> bool,
    {
        while keep_running() {
            self.serve_once(poll)?;
        }
        Ok(())
    }

    fn handle(&self, mut request: Request) {
        let mut body = Vec::new();
        if let Err(e) = request
            .as_reader()
            .take(MAX_BODY)
            .read_to_end(&mut body)
        {
            warn!(self.logger, "failed to read request body"; "error" => %e);
            self.respond(request, Reply::text(400, e.to_string()));
            return;
        }

        debug!(self.logger, "request";
            "method" => ?request.method(),
            "url" => request.url());

        let reply = route(
            request.method(),
            request.url(),
            &body,
            &self.oscillator,
            &self.page,
            &self.logger,
        );
        self.respond(request, reply);
    }

    fn respond(&self, request: Request, reply: Reply) {
        let mut response = Response::from_data(reply.body).with_status_code(reply.status);
        if let Some(content_type) = reply.content_type {
            if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()) {
                response = response.with_header(header);
            }
        }
        if let Err(e) = request.respond(response) {
            warn!(self.logger, "failed to send response"; "error" => %e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logger() -> Logger {
        slog_scope::logger()
    }

    #[test]
    fn test_parse_frequency_accepts_numbers() {
        assert_eq!(parse_frequency(br#"{"frequency": 220}"#).unwrap(), 220.0);
        assert_eq!(parse_frequency(br#"{"frequency": -12.5}"#).unwrap(), -12.5);
        assert_eq!(
            parse_frequency(br#"{"frequency": 0, "note": "a"}"#).unwrap(),
            0.0
        );
    }

    #[test]
    fn test_parse_frequency_rejects_malformed_input() {
        assert!(parse_frequency(br#"{"frequency": "high"}"#).is_err());
        assert!(parse_frequency(br#"{"pitch": 440}"#).is_err());
        assert!(parse_frequency(br#"{"frequency": null}"#).is_err());
        assert!(parse_frequency(b"frequency=440").is_err());
        assert!(parse_frequency(b"").is_err());
    }

    #[test]
    fn test_set_frequency_route_updates_oscillator() {
        let osc = Oscillator::new(440.0, 44100);
        let reply = route(
            &Method::Post,
            "/setFrequency",
            br#"{"frequency": 880}"#,
            &osc,
            &IndexPage::Embedded,
            &logger(),
        );
        assert_eq!(reply, Reply::empty(200));
        assert_eq!(osc.frequency(), 880.0);
    }

    #[test]
    fn test_malformed_request_leaves_frequency_unchanged() {
        let osc = Oscillator::new(440.0, 44100);
        let reply = route(
            &Method::Post,
            "/setFrequency",
            br#"{"frequency": "loud"}"#,
            &osc,
            &IndexPage::Embedded,
            &logger(),
        );
        assert_eq!(reply.status, 400);
        assert_eq!(osc.frequency(), 440.0);
    }

    #[test]
    fn test_frequency_status_route() {
        let osc = Oscillator::new(-110.0, 22050);
        let reply = route(
            &Method::Get,
            "/frequency?fresh=1",
            b"",
            &osc,
            &IndexPage::Embedded,
            &logger(),
        );
        assert_eq!(reply.status, 200);
        assert_eq!(reply.content_type, Some("application/json"));
        let value: serde_json::Value = serde_json::from_slice(&reply.body).unwrap();
        assert_eq!(value["frequency"], -110.0);
        assert_eq!(value["sample_rate"], 22050);
    }

    #[test]
    fn test_index_page_routes() {
        let osc = Oscillator::new(440.0, 44100);
        let reply = route(&Method::Get, "/", b"", &osc, &IndexPage::Embedded, &logger());
        assert_eq!(reply.status, 200);
        assert!(String::from_utf8(reply.body).unwrap().contains("/setFrequency"));

        let missing = IndexPage::File(PathBuf::from("/nonexistent/tonewave/index.html"));
        let reply = route(&Method::Get, "/", b"", &osc, &missing, &logger());
        assert_eq!(reply.status, 404);
    }

    #[test]
    fn test_unknown_route_is_not_found() {
        let osc = Oscillator::new(440.0, 44100);
        let reply = route(&Method::Get, "/volume", b"", &osc, &IndexPage::Embedded, &logger());
        assert_eq!(reply.status, 404);
        let reply = route(&Method::Post, "/frequency", b"", &osc, &IndexPage::Embedded, &logger());
        assert_eq!(reply.status, 404);
    }
}
