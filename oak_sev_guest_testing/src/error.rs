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

//! General error type for the SEV guest test double.

use crate::linux_abi::{EsResult, FirmwareError};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("device already open")]
    AlreadyOpen,
    #[error("device already closed")]
    AlreadyClosed,
    #[error("device is not open")]
    NotOpen,
    #[error("test error: no response for report data {0}")]
    NoResponse(String),
    #[error("test error: could not sign report: {0:#}")]
    Sign(anyhow::Error),
    #[error("test error: could not set signature: {0}")]
    SetSignature(&'static str),
    #[error("test error: certificate chain of {0} bytes exceeds the 4 GiB length field")]
    CertificatesTooLarge(usize),
    #[error("test failure: cert buffer too small: {actual} < {required}")]
    BufferTooSmall { actual: usize, required: usize },
    #[error("invalid command 0x{0:x}")]
    InvalidCommand(u64),
    #[error("unexpected request: {0}")]
    UnexpectedRequest(String),
    #[error("404: {0}")]
    NotFound(String),
    #[error("guest request failed at the hypervisor layer: {0:?}")]
    LowerLayer(EsResult),
    #[error("guest request rejected: {0}")]
    Firmware(FirmwareError),
    #[error("malformed certificate table: {0}")]
    CertificateTable(&'static str),
}
