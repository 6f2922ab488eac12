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

//! Drives a [`SevGuestDevice`] through the report protocols the way a guest
//! attestation agent would.

use oak_sev_snp_attestation_report::{AttestationReport, REPORT_DATA_SIZE};
use zerocopy::FromZeros;

use crate::{
    device::SevGuestDevice,
    error::{Error, Result},
    linux_abi::{
        EsResult, ExtendedReportRequest, FirmwareError, GuestRequestPayload, IoctlRequest,
        ReportRequest, ReportResponse, SnpUserGuestRequest, SNP_GET_EXT_REPORT, SNP_GET_REPORT,
    },
};

/// Requests an attestation report containing `report_data`.
pub fn get_report(
    device: &dyn SevGuestDevice,
    report_data: [u8; REPORT_DATA_SIZE],
    vmpl: u32,
) -> Result<AttestationReport> {
    let mut response = ReportResponse::new_zeroed();
    let mut request = IoctlRequest::Guest(SnpUserGuestRequest::new(
        GuestRequestPayload::Report(ReportRequest::new(report_data, vmpl)),
        &mut response,
    ));
    let es_result = device.ioctl(SNP_GET_REPORT, &mut request)?;
    check_result(es_result, request.fw_error())?;
    check_status(&response)?;
    Ok(response.report)
}

/// Requests an attestation report together with the certificate table of
/// the key that signed it.
///
/// The first request carries an empty certificate buffer, so the device
/// replies with the size it needs. The second request supplies a buffer of
/// exactly that size.
pub fn get_extended_report(
    device: &dyn SevGuestDevice,
    report_data: [u8; REPORT_DATA_SIZE],
    vmpl: u32,
) -> Result<(AttestationReport, Vec<u8>)> {
    let data = ReportRequest::new(report_data, vmpl);
    let mut response = ReportResponse::new_zeroed();
    let (es_result, fw_error, certs_len) =
        extended_report_request(device, data.clone(), &mut [], &mut response)?;
    if !FirmwareError(fw_error).is_invalid_length() {
        // The device produced the report without asking for a buffer.
        check_result(es_result, fw_error)?;
        check_status(&response)?;
        return Ok((response.report, Vec::new()));
    }
    if certs_len == 0 {
        log::debug!("device has no certificates, requesting a plain report");
        return get_report(device, report_data, vmpl).map(|report| (report, Vec::new()));
    }

    log::debug!("device requires {certs_len} bytes of certificates");
    let mut certs = vec![0u8; certs_len as usize];
    let (es_result, fw_error, _) =
        extended_report_request(device, data, &mut certs, &mut response)?;
    check_result(es_result, fw_error)?;
    check_status(&response)?;
    Ok((response.report, certs))
}

/// Issues a single `SNP_GET_EXT_REPORT` ioctl and returns the hypervisor
/// result, the `exitinfo2` value and the certificate length written back by
/// the device.
fn extended_report_request(
    device: &dyn SevGuestDevice,
    data: ReportRequest,
    certs: &mut [u8],
    response: &mut ReportResponse,
) -> Result<(EsResult, u64, u32)> {
    let mut request = IoctlRequest::Guest(SnpUserGuestRequest::new(
        GuestRequestPayload::ExtendedReport(ExtendedReportRequest::new(data, certs)),
        response,
    ));
    let es_result = device.ioctl(SNP_GET_EXT_REPORT, &mut request)?;
    match request {
        IoctlRequest::Guest(SnpUserGuestRequest {
            request: GuestRequestPayload::ExtendedReport(ext_request),
            fw_error,
            ..
        }) => Ok((es_result, fw_error, ext_request.certs_len)),
        _ => Err(Error::UnexpectedRequest("device replaced the extended report request".into())),
    }
}

fn check_result(es_result: EsResult, fw_error: u64) -> Result<()> {
    if fw_error != 0 {
        return Err(Error::Firmware(FirmwareError(fw_error)));
    }
    if es_result != EsResult::Ok {
        return Err(Error::LowerLayer(es_result));
    }
    Ok(())
}

fn check_status(response: &ReportResponse) -> Result<()> {
    match response.status {
        0 => Ok(()),
        status => Err(Error::Firmware(FirmwareError(status.into()))),
    }
}
