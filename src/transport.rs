// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Kopula library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! The fetch-like seam between resource clients and the network.
//!
//! A [Transport] takes a fully built [TransportRequest] and produces a [TransportResponse]. Two
//! implementations are provided: [surf::Client], which talks to a real server, and
//! [tide::Server], which answers the request in process without opening a socket.

use crate::error::{ClientError, EndpointError, ResourceError};
use futures::future::BoxFuture;
use serde_json::Value;
use snafu::ResultExt;
use std::sync::Arc;
use surf::http::{mime, Method};
use surf::{Body, StatusCode};
use url::Url;

/// An HTTP request described as plain data.
#[derive(Clone, Debug)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    /// Serialized JSON body.
    pub body: Option<String>,
}

impl TransportRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// The outcome of a completed round-trip.
#[derive(Clone, Debug)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: String,
    /// The server's own explanation of a failure, if it sent one.
    pub error: Option<String>,
}

impl TransportResponse {
    /// Build a response, picking up the `{"error": ...}` envelope of unsuccessful responses.
    pub fn new(status: StatusCode, body: String) -> Self {
        let error = if status.is_success() {
            None
        } else {
            serde_json::from_str::<EndpointError>(&body)
                .ok()
                .map(|err| err.reason().to_string())
        };
        Self {
            status,
            body,
            error,
        }
    }

    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    /// Decode the body. An empty body decodes as `null`.
    pub fn json(&self) -> Result<Value, ResourceError> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&self.body).map_err(|source| ResourceError::Decode { source })
    }
}

/// Caller-supplied additions to a request.
///
/// Headers the client sets itself (`Content-Type` and `Accept`) cannot be overridden here.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

pub trait Transport: Send + Sync {
    fn send(&self, request: TransportRequest)
        -> BoxFuture<'_, Result<TransportResponse, ResourceError>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(
        &self,
        request: TransportRequest,
    ) -> BoxFuture<'_, Result<TransportResponse, ResourceError>> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(
        &self,
        request: TransportRequest,
    ) -> BoxFuture<'_, Result<TransportResponse, ResourceError>> {
        (**self).send(request)
    }
}

fn json_body(body: String) -> Body {
    let mut body = Body::from_string(body);
    body.set_mime(mime::JSON);
    body
}

impl Transport for surf::Client {
    fn send(
        &self,
        request: TransportRequest,
    ) -> BoxFuture<'_, Result<TransportResponse, ResourceError>> {
        Box::pin(async move {
            let mut builder = surf::RequestBuilder::new(request.method, request.url);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = request.body {
                builder = builder.body(json_body(body));
            }
            let mut res = surf::Client::send(self, builder.build())
                .await
                .context(ClientError)?;
            let body = res.body_string().await.context(ClientError)?;
            Ok(TransportResponse::new(res.status(), body))
        })
    }
}

impl<S: Clone + Send + Sync + 'static> Transport for tide::Server<S> {
    fn send(
        &self,
        request: TransportRequest,
    ) -> BoxFuture<'_, Result<TransportResponse, ResourceError>> {
        Box::pin(async move {
            let mut req = tide::http::Request::new(request.method, request.url);
            for (name, value) in &request.headers {
                req.insert_header(name.as_str(), value.as_str());
            }
            if let Some(body) = request.body {
                req.set_body(json_body(body));
            }
            let mut res: tide::http::Response = self.respond(req).await.context(ClientError)?;
            let body = res.body_string().await.context(ClientError)?;
            Ok(TransportResponse::new(res.status(), body))
        })
    }
}
