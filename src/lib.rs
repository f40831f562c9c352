// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Kopula library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! # Shape-cast resources for JSON web APIs.
//!
//! A [Shape](shape::Shape) declares the fields a payload is expected to have and how each raw
//! JSON value is cast into its typed form, with defaults for missing or falsy values. The same
//! shape serves both ends of an API.
//!
//! On the client side, a [ResourceClient](client::ResourceClient) issues `get`, `post`, `put`
//! and `delete` requests against one URL through any [Transport](transport::Transport), and
//! casts each successful response into the shape. Unsuccessful responses become
//! [ResourceError]s carrying the server's own `error` message.
//!
//! On the server side, an [Endpoint](server::Endpoint) implements whichever verbs it supports and
//! is bound to a `tide` route with [register](server::register). Handlers return plain JSON
//! values or an [EndpointError], whose status becomes the status of the response and whose
//! reason is sent as `{"error": reason}`. Verbs an endpoint does not implement answer with 501.
//!
//! This crate also provides middleware to encourage interfacing with `tide` and `surf` in a
//! consistent, idiomatic way: [add_error_body](server::add_error_body) renders any error
//! raised on a route in the same envelope, and [trace](server::trace) logs requests and
//! responses through `tracing`.

pub mod client;
pub mod error;
pub mod resource;
pub mod server;
pub mod shape;
pub mod status;
pub mod transport;

pub use client::{Params, Record, ResourceClient};
pub use error::*;
pub use resource::Resource;
pub use server::{register, Endpoint, Invocation, Outcome};
pub use shape::{CastError, CastRule, CastType, Shape};
pub use transport::{RequestOptions, Transport, TransportRequest, TransportResponse};
