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

//! A `sev-guest` device with pre-programmed responses to commands.

use oak_sev_snp_attestation_report::REPORT_DATA_SIZE;

use crate::{
    error::{Error, Result},
    linux_abi::{
        EsResult, ExtendedReportRequest, FirmwareError, GuestRequestPayload, IoctlRequest,
        ReportRequest, ReportResponse, SnpUserGuestRequest, GUEST_REQUEST_INVALID_LENGTH,
        SNP_GET_EXT_REPORT, SNP_GET_REPORT,
    },
    registry::{CannedReportResponse, ResponseRegistry},
    signer::ReportSigner,
};

/// The interface of the Linux `sev-guest` character device.
pub trait SevGuestDevice {
    fn open(&mut self, path: &str) -> Result<()>;

    fn close(&mut self) -> Result<()>;

    /// Issues a single ioctl. Firmware errors are reported through the
    /// request's `fw_error` field, not through the returned `Result`.
    fn ioctl(&self, command: u64, request: &mut IoctlRequest<'_>) -> Result<EsResult>;
}

/// A mock `sev-guest` device that answers report requests from a registry of
/// canned responses and signs the reports it returns.
pub struct MockDevice<'a> {
    is_open: bool,
    registry: ResponseRegistry,
    certificates: Vec<u8>,
    signer: &'a dyn ReportSigner,
}

impl<'a> MockDevice<'a> {
    pub fn new(signer: &'a dyn ReportSigner) -> Self {
        Self { is_open: false, registry: ResponseRegistry::new(), certificates: Vec::new(), signer }
    }

    /// Registers the response returned for requests carrying `report_data`.
    /// A later registration for the same report data replaces the earlier one.
    pub fn register_response(
        &mut self,
        report_data: [u8; REPORT_DATA_SIZE],
        response: CannedReportResponse,
    ) -> Option<CannedReportResponse> {
        self.registry.insert(&report_data, response)
    }

    /// Sets the certificate blob returned with extended reports.
    pub fn set_certificates(&mut self, certificates: Vec<u8>) {
        self.certificates = certificates;
    }

    pub fn certificates(&self) -> &[u8] {
        &self.certificates
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    fn get_report(
        &self,
        request: &ReportRequest,
        response: &mut ReportResponse,
        fw_error: &mut u64,
    ) -> Result<EsResult> {
        let canned = self
            .registry
            .get(&request.report_data)
            .ok_or_else(|| Error::NoResponse(hex::encode(request.report_data)))?;
        if canned.fw_error != 0 {
            log::debug!("injecting {}", FirmwareError(canned.fw_error));
            *fw_error = canned.fw_error;
            return Ok(canned.es_result);
        }

        let mut signed = canned.response.clone();
        let report = &mut signed.report;
        let components = self.signer.sign(report.signed_component()).map_err(Error::Sign)?;
        report
            .signature
            .set_components(&components.r, &components.s)
            .map_err(Error::SetSignature)?;
        *response = signed;
        Ok(canned.es_result)
    }

    fn get_extended_report(
        &self,
        request: &mut ExtendedReportRequest<'_>,
        response: &mut ReportResponse,
        fw_error: &mut u64,
    ) -> Result<EsResult> {
        let required = self.certificates.len();
        if request.certs_len == 0 {
            log::debug!("certificate size query, {required} bytes required");
            request.certs_len = certs_length(required)?;
            *fw_error = GUEST_REQUEST_INVALID_LENGTH;
            return Ok(EsResult::Ok);
        }

        // A simulated firmware error is not a failure: the certificates are
        // still checked and copied.
        let result = self.get_report(&request.data, response, fw_error)?;
        let actual = (request.certs_len as usize).min(request.certs.len());
        if actual < required {
            return Err(Error::BufferTooSmall { actual, required });
        }
        request.certs[..required].copy_from_slice(&self.certificates);
        Ok(result)
    }

    fn dispatch(&self, command: u64, request: &mut SnpUserGuestRequest<'_>) -> Result<EsResult> {
        let SnpUserGuestRequest { request: payload, response, fw_error, .. } = request;
        match (command, payload) {
            (SNP_GET_REPORT, GuestRequestPayload::Report(report_request)) => {
                self.get_report(report_request, response, fw_error)
            }
            (SNP_GET_EXT_REPORT, GuestRequestPayload::ExtendedReport(ext_request)) => {
                self.get_extended_report(ext_request, response, fw_error)
            }
            (SNP_GET_REPORT | SNP_GET_EXT_REPORT, payload) => Err(Error::UnexpectedRequest(
                format!("command 0x{command:x} does not accept payload {}", payload_name(payload)),
            )),
            (command, _) => Err(Error::InvalidCommand(command)),
        }
    }
}

fn certs_length(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::CertificatesTooLarge(len))
}

fn payload_name(payload: &GuestRequestPayload<'_>) -> &'static str {
    match payload {
        GuestRequestPayload::Report(_) => "snp_report_req",
        GuestRequestPayload::ExtendedReport(_) => "snp_ext_report_req",
    }
}

impl SevGuestDevice for MockDevice<'_> {
    fn open(&mut self, path: &str) -> Result<()> {
        if self.is_open {
            return Err(Error::AlreadyOpen);
        }
        log::debug!("opening mock device at {path}");
        self.is_open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.is_open {
            return Err(Error::AlreadyClosed);
        }
        log::debug!("closing mock device");
        self.is_open = false;
        Ok(())
    }

    fn ioctl(&self, command: u64, request: &mut IoctlRequest<'_>) -> Result<EsResult> {
        match request {
            IoctlRequest::Guest(guest_request) => {
                if !self.is_open {
                    return Err(Error::NotOpen);
                }
                log::debug!("ioctl 0x{command:x}");
                self.dispatch(command, guest_request)
            }
            IoctlRequest::Raw(bytes) => Err(Error::UnexpectedRequest(format!(
                "{} byte argument is not a guest request",
                bytes.len()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use googletest::prelude::*;
    use zerocopy::FromZeros;

    use super::*;
    use crate::signer::{SignatureComponents, TestSigner};

    struct FailingSigner;

    impl ReportSigner for FailingSigner {
        fn sign(&self, _message: &[u8]) -> anyhow::Result<SignatureComponents> {
            anyhow::bail!("no key loaded")
        }
    }

    struct OversizedSigner;

    impl ReportSigner for OversizedSigner {
        fn sign(&self, _message: &[u8]) -> anyhow::Result<SignatureComponents> {
            Ok(SignatureComponents { r: vec![0xff; 80], s: vec![1] })
        }
    }

    fn report(device: &MockDevice, report_data: [u8; 64]) -> (super::Result<EsResult>, u64) {
        let mut response = ReportResponse::new_zeroed();
        let mut request = IoctlRequest::Guest(SnpUserGuestRequest::new(
            GuestRequestPayload::Report(ReportRequest::new(report_data, 0)),
            &mut response,
        ));
        let result = device.ioctl(SNP_GET_REPORT, &mut request);
        let IoctlRequest::Guest(guest_request) = request else { unreachable!() };
        (result, guest_request.fw_error)
    }

    #[googletest::test]
    fn open_twice_fails() {
        let signer = TestSigner::from_seed(b"device").unwrap();
        let mut device = MockDevice::new(&signer);

        assert_that!(&device.open("/dev/sev-guest"), ok(anything()));
        assert!(matches!(device.open("/dev/sev-guest"), Err(Error::AlreadyOpen)));
        assert_that!(device.is_open(), eq(true));
    }

    #[googletest::test]
    fn close_twice_fails() {
        let signer = TestSigner::from_seed(b"device").unwrap();
        let mut device = MockDevice::new(&signer);

        assert!(matches!(device.close(), Err(Error::AlreadyClosed)));
        device.open("/dev/sev-guest").unwrap();
        assert_that!(&device.close(), ok(anything()));
        assert!(matches!(device.close(), Err(Error::AlreadyClosed)));
        assert_that!(device.is_open(), eq(false));
    }

    #[googletest::test]
    fn reopen_keeps_registered_state() {
        let signer = TestSigner::from_seed(b"device").unwrap();
        let mut device = MockDevice::new(&signer);
        device.register_response([1; 64], CannedReportResponse::success([1; 64]));
        device.set_certificates(vec![1, 2, 3]);

        device.open("/dev/sev-guest").unwrap();
        device.close().unwrap();
        assert_that!(&device.open("/dev/sev-guest"), ok(anything()));

        assert_eq!(device.certificates(), &[1, 2, 3]);
        assert_that!(&report(&device, [1; 64]).0, ok(eq(&EsResult::Ok)));
    }

    #[googletest::test]
    fn ioctl_on_closed_device_fails() {
        let signer = TestSigner::from_seed(b"device").unwrap();
        let mut device = MockDevice::new(&signer);
        device.register_response([1; 64], CannedReportResponse::success([1; 64]));

        assert!(matches!(report(&device, [1; 64]).0, Err(Error::NotOpen)));
    }

    #[googletest::test]
    fn unregistered_report_data_is_a_lookup_error() {
        let mut device = MockDevice::new(&FailingSigner);
        device.open("/dev/sev-guest").unwrap();

        let (result, fw_error) = report(&device, [9; 64]);
        assert!(matches!(result, Err(Error::NoResponse(key)) if key == hex::encode([9u8; 64])));
        assert_that!(fw_error, eq(0));
    }

    #[googletest::test]
    fn signer_failure_is_propagated() {
        let mut device = MockDevice::new(&FailingSigner);
        device.register_response([1; 64], CannedReportResponse::success([1; 64]));
        device.open("/dev/sev-guest").unwrap();

        assert!(matches!(report(&device, [1; 64]).0, Err(Error::Sign(_))));
    }

    #[googletest::test]
    fn embedding_failure_is_propagated() {
        let mut device = MockDevice::new(&OversizedSigner);
        device.register_response([1; 64], CannedReportResponse::success([1; 64]));
        device.open("/dev/sev-guest").unwrap();

        assert!(matches!(report(&device, [1; 64]).0, Err(Error::SetSignature(_))));
    }

    #[googletest::test]
    fn firmware_error_skips_signing() {
        let mut device = MockDevice::new(&FailingSigner);
        device.register_response(
            [2; 64],
            CannedReportResponse::firmware_error([2; 64], 0x16).with_es_result(EsResult::VmmError),
        );
        device.open("/dev/sev-guest").unwrap();

        let (result, fw_error) = report(&device, [2; 64]);
        assert_that!(&result, ok(eq(&EsResult::VmmError)));
        assert_that!(fw_error, eq(0x16));
    }

    #[googletest::test]
    fn es_result_alone_does_not_block_signing() {
        let signer = TestSigner::from_seed(b"device").unwrap();
        let mut device = MockDevice::new(&signer);
        device.register_response(
            [3; 64],
            CannedReportResponse::success([3; 64]).with_es_result(EsResult::Retry),
        );
        device.open("/dev/sev-guest").unwrap();

        let (result, fw_error) = report(&device, [3; 64]);
        assert_that!(&result, ok(eq(&EsResult::Retry)));
        assert_that!(fw_error, eq(0));
    }

    #[googletest::test]
    fn unknown_command_is_invalid() {
        let signer = TestSigner::from_seed(b"device").unwrap();
        let mut device = MockDevice::new(&signer);
        device.open("/dev/sev-guest").unwrap();

        let mut response = ReportResponse::new_zeroed();
        let mut request = IoctlRequest::Guest(SnpUserGuestRequest::new(
            GuestRequestPayload::Report(ReportRequest::new([0; 64], 0)),
            &mut response,
        ));
        let result = device.ioctl(crate::linux_abi::SNP_GET_DERIVED_KEY, &mut request);
        assert!(matches!(
            result,
            Err(Error::InvalidCommand(command)) if command == crate::linux_abi::SNP_GET_DERIVED_KEY
        ));
    }

    #[googletest::test]
    fn raw_argument_is_unexpected() {
        let signer = TestSigner::from_seed(b"device").unwrap();
        let mut device = MockDevice::new(&signer);
        device.open("/dev/sev-guest").unwrap();

        let mut bytes = [0u8; 32];
        let result = device.ioctl(SNP_GET_REPORT, &mut IoctlRequest::Raw(&mut bytes));
        assert!(matches!(result, Err(Error::UnexpectedRequest(_))));
    }

    #[googletest::test]
    fn mismatched_payload_is_unexpected() {
        let signer = TestSigner::from_seed(b"device").unwrap();
        let mut device = MockDevice::new(&signer);
        device.register_response([1; 64], CannedReportResponse::success([1; 64]));
        device.open("/dev/sev-guest").unwrap();

        let mut response = ReportResponse::new_zeroed();
        let mut request = IoctlRequest::Guest(SnpUserGuestRequest::new(
            GuestRequestPayload::Report(ReportRequest::new([1; 64], 0)),
            &mut response,
        ));
        let result = device.ioctl(SNP_GET_EXT_REPORT, &mut request);
        assert!(matches!(result, Err(Error::UnexpectedRequest(_))));
    }

    #[googletest::test]
    fn size_query_never_signs() {
        let mut device = MockDevice::new(&FailingSigner);
        device.set_certificates(vec![7; 300]);
        device.open("/dev/sev-guest").unwrap();

        let mut response = ReportResponse::new_zeroed();
        let mut certs: [u8; 0] = [];
        let mut request = IoctlRequest::Guest(SnpUserGuestRequest::new(
            GuestRequestPayload::ExtendedReport(ExtendedReportRequest::new(
                ReportRequest::new([8; 64], 0),
                &mut certs,
            )),
            &mut response,
        ));

        // The report data is not even registered: the size query must not
        // look it up.
        let result = device.ioctl(SNP_GET_EXT_REPORT, &mut request);
        assert_that!(&result, ok(eq(&EsResult::Ok)));
        let IoctlRequest::Guest(guest_request) = request else { unreachable!() };
        assert_that!(guest_request.fw_error, eq(GUEST_REQUEST_INVALID_LENGTH));
        let GuestRequestPayload::ExtendedReport(ext_request) = guest_request.request else {
            unreachable!()
        };
        assert_that!(ext_request.certs_len, eq(300));
    }

    #[cfg(target_pointer_width = "64")]
    #[googletest::test]
    fn certificate_length_beyond_abi_field_is_rejected() {
        let too_large = u32::MAX as usize + 1;
        assert!(matches!(
            certs_length(too_large),
            Err(Error::CertificatesTooLarge(len)) if len == too_large
        ));
        assert_that!(certs_length(4096).unwrap(), eq(4096));
    }
}
