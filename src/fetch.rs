// Copyright 2022 Spanfile
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use reqwest::{blocking::Client, StatusCode};
use std::{io::Read, time::Duration};
use thiserror::Error;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Why a URL's content could not be retrieved.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered {0}")]
    Status(StatusCode),
    #[error("failed to read response body: {0}")]
    Body(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

/// A trait used to retrieve the content behind a URL.
pub trait Fetcher {
    /// Open a byte stream for the URL. The stream is dropped once the caller is done with it.
    fn fetch(&self, url: &str) -> Result<Box<dyn Read>, FetchError>;
}

/// Blocking HTTP [`Fetcher`] with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().user_agent(USER_AGENT).timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Box<dyn Read>, FetchError> {
        let response = self.client.get(url).send()?;
        let status = response.status();

        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        Ok(Box::new(response))
    }
}
