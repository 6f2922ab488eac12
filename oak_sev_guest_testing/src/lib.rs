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

//! A test double for the Linux `sev-guest` driver.
//!
//! [`MockDevice`] answers `SNP_GET_REPORT` and `SNP_GET_EXT_REPORT` ioctls from
//! a registry of canned responses, signing each returned report with a
//! [`ReportSigner`], so that attestation verification code can be exercised
//! on machines without SEV-SNP hardware.

pub mod certificates;
pub mod client;
pub mod device;
pub mod error;
pub mod getter;
pub mod linux_abi;
pub mod registry;
pub mod signer;

pub use device::{MockDevice, SevGuestDevice};
pub use error::{Error, Result};
pub use getter::{HttpsGetter, StaticGetter};
pub use registry::CannedReportResponse;
pub use signer::{ReportSigner, SignatureComponents, TestSigner};
