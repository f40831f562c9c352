//! Shape-casting resource client.
//!
//! A [ResourceClient] performs the four verbs against one URL and casts every successful response
//! through the resource's [Shape]. Calls do not mutate the client; each one returns a [Record]
//! holding the casted values and the identity to use for the next call on the same entity, so
//! callers decide explicitly how to chain requests.

use crate::error::{ResourceError, GENERIC_FAILURE};
use crate::shape::Shape;
use crate::transport::{RequestOptions, Transport, TransportRequest, TransportResponse};
use serde_json::{Map, Value};
use surf::http::Method;
use tracing::{event, Level};
use url::Url;

/// Query/identity parameters and JSON object bodies.
pub type Params = Map<String, Value>;

/// Headers owned by the client. Caller options cannot replace them.
const JSON_HEADERS: [(&str, &str); 2] = [
    ("Content-Type", "application/json"),
    ("Accept", "application/json"),
];

/// The result of one resource call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    /// The response body cast into the resource's shape.
    pub values: Params,
    /// The identity of the entity the call addressed.
    ///
    /// This is the params mapping the call was made with, except that `post` and `put` with an
    /// empty params mapping adopt the body they sent, so the created or updated entity becomes
    /// the identity for follow-up calls.
    pub params: Params,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }
}

/// Serialize `params` as `key1=value1&key2=value2` with percent-encoded keys and values.
///
/// String values are used as they are; other values are written as JSON text.
pub fn query_string(params: &Params) -> String {
    params
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => urlencoding::encode(s).into_owned(),
                other => urlencoding::encode(&other.to_string()).into_owned(),
            };
            format!("{}={}", urlencoding::encode(key), value)
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// `url` with `params` appended to its query. Empty params leave the url untouched.
pub fn with_query(url: &Url, params: &Params) -> Url {
    let mut url = url.clone();
    if !params.is_empty() {
        let query = match url.query() {
            Some(existing) if !existing.is_empty() => {
                format!("{}&{}", existing, query_string(params))
            }
            _ => query_string(params),
        };
        url.set_query(Some(&query));
    }
    url
}

pub(crate) fn parse_url(url: &str) -> Result<Url, ResourceError> {
    Url::parse(url).map_err(|source| ResourceError::InvalidUrl {
        url: url.to_string(),
        source,
    })
}

/// Turn an unsuccessful response into [ResourceError::Rejected].
///
/// The server's structured `error` string becomes the message when there is one.
pub fn response_to_result(res: TransportResponse) -> Result<TransportResponse, ResourceError> {
    if res.ok() {
        return Ok(res);
    }
    let message = res
        .error
        .clone()
        .unwrap_or_else(|| GENERIC_FAILURE.to_string());
    event!(
        Level::WARN,
        "request rejected with {}: {}",
        res.status,
        message
    );
    Err(ResourceError::Rejected {
        status: res.status,
        message,
    })
}

#[derive(Clone, Debug)]
pub struct ResourceClient<T> {
    url: Url,
    shape: Shape,
    transport: T,
}

impl<T: Transport> ResourceClient<T> {
    pub fn new(url: &str, shape: Shape, transport: T) -> Result<Self, ResourceError> {
        Ok(Self::from_parts(parse_url(url)?, shape, transport))
    }

    pub(crate) fn from_parts(url: Url, shape: Shape, transport: T) -> Self {
        Self {
            url,
            shape,
            transport,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Build the request for one call without sending it.
    pub fn request(
        &self,
        method: Method,
        params: &Params,
        body: Option<&Params>,
        options: &RequestOptions,
    ) -> Result<TransportRequest, ResourceError> {
        let mut headers: Vec<(String, String)> = JSON_HEADERS
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        for (name, value) in &options.headers {
            if JSON_HEADERS
                .iter()
                .any(|(own, _)| own.eq_ignore_ascii_case(name))
            {
                event!(Level::DEBUG, "ignoring caller header {}", name);
                continue;
            }
            headers.push((name.clone(), value.clone()));
        }

        let body = body
            .map(serde_json::to_string)
            .transpose()
            .map_err(|source| ResourceError::Encode { source })?;

        Ok(TransportRequest {
            method,
            url: with_query(&self.url, params),
            headers,
            body,
        })
    }

    async fn fetch(
        &self,
        method: Method,
        params: &Params,
        body: Option<&Params>,
        options: &RequestOptions,
    ) -> Result<Params, ResourceError> {
        let request = self.request(method, params, body, options)?;
        event!(Level::DEBUG, "--> {} {}", request.method, request.url);
        let res = response_to_result(self.transport.send(request).await?)?;
        let json = res.json()?;
        Ok(self.shape.cast(&json)?)
    }

    pub async fn get(
        &self,
        params: &Params,
        options: &RequestOptions,
    ) -> Result<Record, ResourceError> {
        let values = self.fetch(Method::Get, params, None, options).await?;
        Ok(Record {
            values,
            params: params.clone(),
        })
    }

    /// Create an entity. The shape-declared fields of `body` are cast before sending.
    pub async fn post(
        &self,
        params: &Params,
        mut body: Params,
        options: &RequestOptions,
    ) -> Result<Record, ResourceError> {
        self.shape.normalize(&mut body)?;
        let values = self.fetch(Method::Post, params, Some(&body), options).await?;
        Ok(Record {
            values,
            params: identity(params, body),
        })
    }

    pub async fn put(
        &self,
        params: &Params,
        body: Params,
        options: &RequestOptions,
    ) -> Result<Record, ResourceError> {
        let values = self.fetch(Method::Put, params, Some(&body), options).await?;
        Ok(Record {
            values,
            params: identity(params, body),
        })
    }

    pub async fn delete(
        &self,
        params: &Params,
        options: &RequestOptions,
    ) -> Result<Record, ResourceError> {
        let values = self.fetch(Method::Delete, params, None, options).await?;
        Ok(Record {
            values,
            params: params.clone(),
        })
    }
}

fn identity(params: &Params, body: Params) -> Params {
    if params.is_empty() {
        body
    } else {
        params.clone()
    }
}
