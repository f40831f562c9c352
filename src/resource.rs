// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Kopula library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

use crate::client::{parse_url, Params, Record, ResourceClient};
use crate::error::ResourceError;
use crate::shape::Shape;
use crate::transport::{RequestOptions, Transport};
use url::Url;

/// A remote resource: where it lives and what its payloads look like.
///
/// Each verb issued through a `Resource` uses a fresh [ResourceClient], so independent calls
/// never share anything but the (immutable) url and shape.
#[derive(Clone, Debug)]
pub struct Resource {
    url: Url,
    shape: Shape,
}

impl Resource {
    pub fn new(url: &str, shape: Shape) -> Result<Self, ResourceError> {
        Ok(Self {
            url: parse_url(url)?,
            shape,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn client<T: Transport>(&self, transport: T) -> ResourceClient<T> {
        ResourceClient::from_parts(self.url.clone(), self.shape.clone(), transport)
    }

    pub async fn get<T: Transport>(
        &self,
        transport: T,
        params: &Params,
        options: &RequestOptions,
    ) -> Result<Record, ResourceError> {
        self.client(transport).get(params, options).await
    }

    pub async fn post<T: Transport>(
        &self,
        transport: T,
        params: &Params,
        body: Params,
        options: &RequestOptions,
    ) -> Result<Record, ResourceError> {
        self.client(transport).post(params, body, options).await
    }

    pub async fn put<T: Transport>(
        &self,
        transport: T,
        params: &Params,
        body: Params,
        options: &RequestOptions,
    ) -> Result<Record, ResourceError> {
        self.client(transport).put(params, body, options).await
    }

    pub async fn delete<T: Transport>(
        &self,
        transport: T,
        params: &Params,
        options: &RequestOptions,
    ) -> Result<Record, ResourceError> {
        self.client(transport).delete(params, options).await
    }
}
