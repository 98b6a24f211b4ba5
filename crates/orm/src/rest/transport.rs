//! HTTP transport seam of the REST session

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::OrmResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for RestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RestMethod::Get => "GET",
            RestMethod::Post => "POST",
            RestMethod::Put => "PUT",
            RestMethod::Delete => "DELETE",
        })
    }
}

/// One request handed to the transport
#[derive(Debug, Clone, PartialEq)]
pub struct RestRequest {
    pub method: RestMethod,
    pub url: Url,
    pub connection_timeout: Duration,
    pub response_timeout: Duration,
    /// Media type of `body`, and the type the caller accepts back
    pub content_type: &'static str,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestResponse {
    pub status: u16,
    pub body: String,
}

impl RestResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

/// Sends requests to the REST datastore. Implementations own connection
/// handling and must honour the request timeouts.
pub trait RestTransport: Send + Sync {
    fn send(&self, request: RestRequest) -> OrmResult<RestResponse>;
}
