// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Kopula library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

use crate::client::Params;
use crate::error::{server_error, EndpointError, Error};
use futures::future::{self, BoxFuture};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tide::http::{mime, Headers, Method, Url};
use tide::{Body, Next, Request, Response, StatusCode};
use tracing::{event, Level};

/// Deserialize the body of a request.
///
/// An empty body is `null`. Anything else must be declared as `application/json` and parse as
/// JSON; otherwise the request is rejected with 400.
pub async fn request_body<S>(req: &mut Request<S>) -> Result<Value, EndpointError> {
    let bytes = req
        .body_bytes()
        .await
        .map_err(|err| EndpointError::catch_all(err.status(), err.to_string()))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    match req.content_type() {
        Some(content_type) if content_type.essence() == mime::JSON.essence() => {
            serde_json::from_slice(&bytes).map_err(|err| {
                EndpointError::bad_request(format!("unable to deserialize request body: {}", err))
            })
        }
        Some(content_type) => Err(EndpointError::bad_request(format!(
            "unsupported content type {}",
            content_type
        ))),
        None => Err(EndpointError::bad_request("unspecified content type")),
    }
}

fn respond_with<T: Serialize>(status: StatusCode, body: &T) -> Result<Response, tide::Error> {
    Ok(Response::builder(status)
        .body(Body::from_json(body)?)
        .content_type(mime::JSON)
        .build())
}

/// Serialize the body of a successful response as JSON.
///
/// This function combined with the [add_error_body] middleware defines the server-side protocol:
/// 200 with the handler's value, or the error's status with `{"error": reason}`.
pub fn response<T: Serialize>(body: T) -> Result<Response, tide::Error> {
    respond_with(StatusCode::Ok, &body)
}

/// Server middleware which automatically populates the body of error responses.
///
/// If the response contains an error, the error is encoded into the [Error] type (either by
/// downcasting if the server has generated an instance of [Error], or by keeping its status and
/// [Display](std::fmt::Display) text if it can not be downcasted). The resulting [Error] is then
/// serialized and used as the body of the response.
///
/// If the response does not contain an error, it is passed through unchanged.
///
/// This middleware is the inverse of the client-side `response_to_result`, which turns error
/// responses back into [Err] variants, assuming the responses follow the convention implemented
/// by this middleware.
pub fn add_error_body<'a, T: Clone + Send + Sync + 'static, E: Error>(
    req: Request<T>,
    next: Next<'a, T>,
) -> BoxFuture<'a, tide::Result> {
    Box::pin(async move {
        let mut res = next.run(req).await;
        if let Some(error) = res.take_error() {
            let error = E::from_client_error(error);
            event!(Level::WARN, "responding with error: {}", error);
            respond_with(error.status(), &error)
        } else {
            Ok(res)
        }
    })
}

/// Server middleware which logs requests and responses.
pub fn trace<'a, T: Clone + Send + Sync + 'static>(
    req: tide::Request<T>,
    next: tide::Next<'a, T>,
) -> BoxFuture<'a, tide::Result> {
    Box::pin(async move {
        event!(
            Level::INFO,
            "<-- received request {{method: {}, url: {}, content-type: {:?}}}",
            req.method(),
            req.url(),
            req.content_type(),
        );
        let res = next.run(req).await;
        event!(
            Level::INFO,
            "--> responding with {{status: {}, content-type: {:?}, error: {:?}}}",
            res.status(),
            res.content_type(),
            res.error(),
        );
        Ok(res)
    })
}

/// What a verb handler gets to see of a request.
#[derive(Clone, Debug)]
pub struct Invocation {
    pub method: Method,
    pub url: Url,
    /// Headers of the incoming request, including any the caller added through its request
    /// options.
    pub headers: Headers,
    /// Path parameters merged with query parameters. A query parameter never replaces a path
    /// parameter of the same name.
    pub params: Params,
    /// The JSON body, `null` if the request had none.
    pub body: Value,
}

impl Invocation {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }

    /// The last value of request header `name`, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(|values| values.last().as_str())
    }
}

/// The outcome of a verb handler.
pub type Outcome<'a> = BoxFuture<'a, Result<Value, EndpointError>>;

fn not_implemented<'a>() -> Outcome<'a> {
    Box::pin(future::ready(Err(EndpointError::not_implemented())))
}

/// A resource served at one path.
///
/// Every verb defaults to failing with 501 Not Implemented; implementors override the ones they
/// support. A handler's `Ok` value becomes a 200 JSON response and its [EndpointError] becomes
/// a response with the error's status and `{"error": reason}` as body.
pub trait Endpoint: Send + Sync + 'static {
    fn get(&self, _call: Invocation) -> Outcome<'_> {
        not_implemented()
    }

    fn post(&self, _call: Invocation) -> Outcome<'_> {
        not_implemented()
    }

    fn put(&self, _call: Invocation) -> Outcome<'_> {
        not_implemented()
    }

    fn delete(&self, _call: Invocation) -> Outcome<'_> {
        not_implemented()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

impl Verb {
    pub const ALL: [Verb; 4] = [Verb::Get, Verb::Post, Verb::Put, Verb::Delete];

    pub fn method(self) -> Method {
        match self {
            Verb::Get => Method::Get,
            Verb::Post => Method::Post,
            Verb::Put => Method::Put,
            Verb::Delete => Method::Delete,
        }
    }

    fn invoke<E: Endpoint + ?Sized>(self, endpoint: &E, call: Invocation) -> Outcome<'_> {
        match self {
            Verb::Get => endpoint.get(call),
            Verb::Post => endpoint.post(call),
            Verb::Put => endpoint.put(call),
            Verb::Delete => endpoint.delete(call),
        }
    }
}

/// Names of the `:name` and `*name` segments of a tide route.
pub fn path_param_names(path: &str) -> Vec<String> {
    path.split('/')
        .filter_map(|segment| {
            segment
                .strip_prefix(':')
                .or_else(|| segment.strip_prefix('*'))
        })
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}

fn merged_params<S>(req: &Request<S>, path_params: &[String]) -> Params {
    let mut params = Params::new();
    for name in path_params {
        if let Ok(value) = req.param(name) {
            params.insert(name.clone(), Value::String(value.to_string()));
        }
    }
    for (key, value) in req.url().query_pairs() {
        if path_params.iter().any(|name| *name == key) {
            event!(
                Level::WARN,
                "ignoring query parameter `{}`, it collides with a path parameter",
                key
            );
            continue;
        }
        params.insert(key.into_owned(), Value::String(value.into_owned()));
    }
    params
}

fn reject(err: EndpointError) -> tide::Error {
    event!(
        Level::WARN,
        "endpoint failed with {} {}: {}",
        err.status() as u16,
        err.reason_phrase(),
        err.reason()
    );
    server_error::<EndpointError>(err)
}

async fn dispatch<S, E>(
    mut req: Request<S>,
    endpoint: &E,
    verb: Verb,
    path_params: &[String],
) -> tide::Result<Response>
where
    S: Clone + Send + Sync + 'static,
    E: Endpoint + ?Sized,
{
    let params = merged_params(&req, path_params);
    let body = request_body(&mut req).await.map_err(reject)?;
    let headers: &Headers = req.as_ref();
    let call = Invocation {
        method: req.method(),
        url: req.url().clone(),
        headers: headers.clone(),
        params,
        body,
    };
    match verb.invoke(endpoint, call).await {
        Ok(value) => response(value),
        Err(err) => Err(reject(err)),
    }
}

/// Bind all four verbs of `endpoint` at `path`.
///
/// Errors raised on the route are rendered by [add_error_body], so the route answers with the
/// `{"error": reason}` envelope even if the server has no error middleware of its own.
pub fn register<S, E>(app: &mut tide::Server<S>, path: &str, endpoint: E)
where
    S: Clone + Send + Sync + 'static,
    E: Endpoint,
{
    let endpoint = Arc::new(endpoint);
    let path_params = Arc::new(path_param_names(path));
    let mut route = app.at(path);
    route.with(add_error_body::<S, EndpointError>);
    for verb in Verb::ALL.iter().copied() {
        let endpoint = endpoint.clone();
        let path_params = path_params.clone();
        route.method(verb.method(), move |req: Request<S>| {
            let endpoint = endpoint.clone();
            let path_params = path_params.clone();
            async move { dispatch(req, &*endpoint, verb, &path_params).await }
        });
    }
    event!(Level::DEBUG, "registered endpoint at {}", path);
}
