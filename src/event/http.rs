//! HTTP environment carried by HTTP-bearing events.
//!
//! The runtime itself never speaks HTTP; boundary actors fill this structure
//! from a request and read it back when answering. The only rule enforced here
//! is that the response status is a code from [`status_reason`].

use crate::error::{FlowError, FlowResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_STATUS_CODE: u16 = 200;

/// Reason phrase for every status code an event may carry.
pub fn status_reason(code: u16) -> Option<&'static str> {
    let reason = match code {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        415 => "Unsupported Media Type",
        422 => "Unprocessable Entity",
        423 => "Locked",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        508 => "Loop Detected",
        _ => return None,
    };
    Some(reason)
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpEnvironment {
    pub request: HttpRequest,
    pub response: HttpResponse,
    pub remote: RemoteInfo,
    pub server: ServerInfo,
    pub accepted_methods: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpRequest {
    pub headers: BTreeMap<String, String>,
    pub method: Option<String>,
    pub url: RequestUrl,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestUrl {
    pub scheme: Option<String>,
    pub domain: Option<String>,
    pub query: Option<String>,
    pub path: Option<String>,
    pub path_args: BTreeMap<String, String>,
    pub query_args: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpResponse {
    pub headers: BTreeMap<String, String>,
    status: u16,
}

impl HttpResponse {
    pub fn status(&self) -> u16 {
        self.status
    }
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self {
            headers: BTreeMap::new(),
            status: DEFAULT_STATUS_CODE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteInfo {
    pub address: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerInfo {
    pub name: Option<String>,
    pub port: Option<u16>,
    pub protocol: Option<String>,
}

impl HttpEnvironment {
    pub fn status(&self) -> u16 {
        self.response.status
    }

    /// Sets the response status; `None` resets it to 200.
    pub fn set_status(&mut self, status: Option<u16>) -> FlowResult<()> {
        let status = status.unwrap_or(DEFAULT_STATUS_CODE);
        if status_reason(status).is_none() {
            return Err(FlowError::InvalidEventModification(format!(
                "Unrecognized status code {status}"
            )));
        }
        self.response.status = status;
        Ok(())
    }

    pub fn update_headers<I, K, V>(&mut self, headers: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.response
            .headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
    }

    /// The `queue` path argument, used as the service of events that were not given one.
    pub fn routed_service(&self) -> Option<&str> {
        self.request.url.path_args.get("queue").map(String::as_str)
    }
}
