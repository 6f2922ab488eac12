//
// Copyright 2026 The Project Oak Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! A stand-in for the HTTPS client used to fetch AMD certificates and CRLs.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Fetches the body of a URL.
pub trait HttpsGetter {
    fn get(&self, url: &str) -> Result<Vec<u8>>;
}

/// Answers requests from a fixed map of URLs to response bodies. URLs must
/// match exactly.
#[derive(Clone, Debug, Default)]
pub struct StaticGetter {
    responses: HashMap<String, Vec<u8>>,
}

impl StaticGetter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, body: Vec<u8>) -> Option<Vec<u8>> {
        self.responses.insert(url.into(), body)
    }
}

impl<U: Into<String>> FromIterator<(U, Vec<u8>)> for StaticGetter {
    fn from_iter<T: IntoIterator<Item = (U, Vec<u8>)>>(iter: T) -> Self {
        Self { responses: iter.into_iter().map(|(url, body)| (url.into(), body)).collect() }
    }
}

impl HttpsGetter for StaticGetter {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        log::debug!("GET {url}");
        self.responses.get(url).cloned().ok_or_else(|| Error::NotFound(url.to_string()))
    }
}
