// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Kopula library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

use crate::shape::CastError;
use crate::status::reason_phrase;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use snafu::{IntoError, Snafu};
use std::convert::{Infallible, TryFrom};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use tide::StatusCode;

/// Message used when a request fails and the server did not say why.
pub const GENERIC_FAILURE: &str = "Something went wrong.";

/// Errors which can be serialized in a response body.
///
/// When an endpoint fails, the body of the response contains a serialization of the error that
/// caused the failure and the status of the response is taken from [Error::status]. Errors which
/// are not instances of the API's error type (such as errors generated by the [tide] framework
/// itself) are converted using [Error::catch_all], keeping their status and their [Display] text.
pub trait Error: std::error::Error + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn catch_all(status: StatusCode, msg: String) -> Self;
    fn status(&self) -> StatusCode;

    /// Convert from a generic HTTP error to a specific error type.
    ///
    /// If `source` can be downcast to `Self`, it is simply downcasted. Otherwise, its status and
    /// its message are handed to [catch_all](Error::catch_all).
    fn from_client_error(source: surf::Error) -> Self {
        match source.downcast::<Self>() {
            Ok(err) => err,
            Err(err) => Self::catch_all(err.status(), err.to_string()),
        }
    }
}

/// Convert a concrete error type into a server error.
///
/// The error is first converted into an `E` using the [From] instance. That error is then
/// upcasted into an anyhow error to be embedded in the [tide::Error], using the status code
/// indicated by [Error::status]. The `add_error_body` middleware turns it back into a response
/// body.
pub fn server_error<E: Error>(error: impl Into<E>) -> tide::Error {
    let error = error.into();
    tide::Error::new(error.status(), error)
}

/// Failure of an endpoint, carrying the HTTP status it maps to.
///
/// On the wire only the reason travels, as `{"error": "<reason>"}`; the status is the status of
/// the response.
///
/// An endpoint error can be built from a `"<status> <reason>"` message. The leading
/// whitespace-delimited token is read as a decimal status code. If it is not a number, or not a status
/// code tide can respond with, the status is 500 and the whole message becomes the reason.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointError {
    #[serde(skip, default = "internal_server_error")]
    status: StatusCode,
    #[serde(rename = "error")]
    reason: String,
}

fn internal_server_error() -> StatusCode {
    StatusCode::InternalServerError
}

impl EndpointError {
    pub fn new(status: StatusCode, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::new(StatusCode::NotFound, reason)
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::new(StatusCode::Conflict, reason)
    }

    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::new(StatusCode::BadRequest, reason)
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::new(StatusCode::InternalServerError, reason)
    }

    /// The response of a verb an endpoint does not support.
    pub fn not_implemented() -> Self {
        Self::new(StatusCode::NotImplemented, "")
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn reason_phrase(&self) -> &'static str {
        reason_phrase(self.status as u16).unwrap_or("Unknown")
    }
}

impl Display for EndpointError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "{}", self.status as u16)
        } else {
            write!(f, "{} {}", self.status as u16, self.reason)
        }
    }
}

impl std::error::Error for EndpointError {}

impl Error for EndpointError {
    fn catch_all(status: StatusCode, msg: String) -> Self {
        Self::new(status, msg)
    }

    fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<&str> for EndpointError {
    fn from(message: &str) -> Self {
        let (code, reason) = message
            .split_once(char::is_whitespace)
            .unwrap_or((message, ""));
        let status = code
            .parse::<u16>()
            .ok()
            .and_then(|code| StatusCode::try_from(code).ok());
        match status {
            Some(status) => Self::new(status, reason),
            None => Self::internal(message),
        }
    }
}

impl From<String> for EndpointError {
    fn from(message: String) -> Self {
        Self::from(message.as_str())
    }
}

impl FromStr for EndpointError {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

/// Failures of a resource client call.
#[derive(Debug, Snafu)]
pub enum ResourceError {
    #[snafu(display("invalid resource url `{}`: {}", url, source))]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    /// The request did not complete, so there is no response to interpret.
    #[snafu(display("transport failure ({}): {}", status, message))]
    Transport { status: StatusCode, message: String },

    /// The server answered with a non-success status.
    #[snafu(display("{}", message))]
    Rejected { status: StatusCode, message: String },

    #[snafu(display("response body is not valid JSON: {}", source))]
    Decode { source: serde_json::Error },

    #[snafu(display("request body could not be serialized: {}", source))]
    Encode { source: serde_json::Error },

    #[snafu(display("{}", source))]
    Cast { source: CastError },
}

impl ResourceError {
    /// The HTTP status associated with this failure, if there is one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Transport { status, .. } | Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<CastError> for ResourceError {
    fn from(source: CastError) -> Self {
        Self::Cast { source }
    }
}

/// Context for embedding network errors into [ResourceError].
///
/// This type implements the [IntoError] trait from SNAFU, so it can be used with
/// [ResultExt::context](snafu::ResultExt::context) just like automatically generated SNAFU
/// contexts. Calling `some_result.context(ClientError)` converts a [surf::Error] (which is the
/// same type as [tide::Error]) into [ResourceError::Transport], keeping its status.
pub struct ClientError;

impl IntoError<ResourceError> for ClientError {
    type Source = surf::Error;

    fn into_error(self, source: Self::Source) -> ResourceError {
        ResourceError::Transport {
            status: source.status(),
            message: source.to_string(),
        }
    }
}
