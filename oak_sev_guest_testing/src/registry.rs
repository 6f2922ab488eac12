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

//! Canned report responses, keyed by the report data of the request.

use std::collections::HashMap;

use oak_sev_snp_attestation_report::{
    AttestationReport, SigningAlgorithm, SigningKey, CURRENT_REPORT_VERSION, REPORT_DATA_SIZE,
};

use crate::linux_abi::{EsResult, ReportResponse};

/// A pre-programmed response to a report request.
#[derive(Clone, Debug)]
pub struct CannedReportResponse {
    /// The response as the firmware would produce it, before signing.
    pub response: ReportResponse,
    /// The result of the hypervisor layer.
    pub es_result: EsResult,
    /// The `exitinfo2` value to report. Zero means the firmware accepted the
    /// request and a signed report is returned.
    pub fw_error: u64,
}

impl CannedReportResponse {
    /// A successful response containing a current-version report for
    /// `report_data`.
    pub fn success(report_data: [u8; REPORT_DATA_SIZE]) -> Self {
        let mut report = AttestationReport::from_report_data(report_data);
        report.data.version = CURRENT_REPORT_VERSION;
        report.data.signature_algo = SigningAlgorithm::EcdsaP384Sha384 as u32;
        report.data.set_signing_key(SigningKey::VCEK);
        Self::from_report(report)
    }

    pub fn from_report(report: AttestationReport) -> Self {
        CannedReportResponse {
            response: ReportResponse::new(report),
            es_result: EsResult::Ok,
            fw_error: 0,
        }
    }

    /// A response rejected by the firmware with `fw_error`.
    pub fn firmware_error(report_data: [u8; REPORT_DATA_SIZE], fw_error: u64) -> Self {
        Self { fw_error, ..Self::success(report_data) }
    }

    pub fn with_es_result(self, es_result: EsResult) -> Self {
        Self { es_result, ..self }
    }
}

/// Maps hex-encoded report data to canned responses.
#[derive(Debug, Default)]
pub struct ResponseRegistry {
    responses: HashMap<String, CannedReportResponse>,
}

impl ResponseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `response` for `report_data`, returning the response it
    /// replaces, if any.
    pub fn insert(
        &mut self,
        report_data: &[u8; REPORT_DATA_SIZE],
        response: CannedReportResponse,
    ) -> Option<CannedReportResponse> {
        let key = hex::encode(report_data);
        let previous = self.responses.insert(key, response);
        if previous.is_some() {
            log::warn!("replacing canned response for report data {}", hex::encode(report_data));
        }
        previous
    }

    pub fn get(&self, report_data: &[u8; REPORT_DATA_SIZE]) -> Option<&CannedReportResponse> {
        self.responses.get(&hex::encode(report_data))
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}
