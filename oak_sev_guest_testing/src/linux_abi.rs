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

//! Types mirroring the Linux `sev-guest` driver ABI.
//!
//! See <https://git.kernel.org/pub/scm/linux/kernel/git/torvalds/linux.git/tree/include/uapi/linux/sev-guest.h>.
//! Raw user-space addresses in the kernel structures are replaced with
//! borrowed Rust values.

use core::{fmt, mem::size_of};

use oak_sev_snp_attestation_report::{AttestationReport, REPORT_DATA_SIZE, REPORT_SIZE};
use strum::FromRepr;
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

/// The ioctl type used by all `sev-guest` commands.
pub const SNP_GUEST_REQ_IOC_TYPE: u8 = b'S';

/// The size of the response buffer the kernel copies back to user space.
pub const REPORT_RESPONSE_SIZE: usize = 4000;

/// The VMM error reported when the certificate buffer is too small.
pub const SNP_GUEST_VMM_ERR_INVALID_LEN: u32 = 1;

/// The VMM error reported when the hypervisor is busy.
pub const SNP_GUEST_VMM_ERR_BUSY: u32 = 2;

/// The `fw_error` value returned together with the required certificate
/// buffer size.
pub const GUEST_REQUEST_INVALID_LENGTH: u64 = (SNP_GUEST_VMM_ERR_INVALID_LEN as u64) << 32;

/// The kernel layout of `struct snp_guest_request_ioctl`. Its size is encoded
/// in the ioctl command codes; it is never constructed.
#[allow(dead_code)]
#[repr(C)]
struct RawGuestRequestIoctl {
    msg_version: u8,
    req_data: u64,
    resp_data: u64,
    exitinfo2: u64,
}
static_assertions::assert_eq_size!(RawGuestRequestIoctl, [u8; 32]);

/// Equivalent of the `_IOWR` macro from `<asm-generic/ioctl.h>`.
const fn iowr(ioc_type: u8, nr: u8, size: usize) -> u64 {
    const IOC_READ_WRITE: u64 = 3;
    (IOC_READ_WRITE << 30) | ((size as u64) << 16) | ((ioc_type as u64) << 8) | nr as u64
}

/// Requests an attestation report.
pub const SNP_GET_REPORT: u64 =
    iowr(SNP_GUEST_REQ_IOC_TYPE, 0x0, size_of::<RawGuestRequestIoctl>());

/// Requests a key derived from a platform root key.
pub const SNP_GET_DERIVED_KEY: u64 =
    iowr(SNP_GUEST_REQ_IOC_TYPE, 0x1, size_of::<RawGuestRequestIoctl>());

/// Requests an attestation report together with its certificate table.
pub const SNP_GET_EXT_REPORT: u64 =
    iowr(SNP_GUEST_REQ_IOC_TYPE, 0x2, size_of::<RawGuestRequestIoctl>());

static_assertions::const_assert_eq!(SNP_GET_REPORT, 0xc020_5300);
static_assertions::const_assert_eq!(SNP_GET_EXT_REPORT, 0xc020_5302);

/// Request for an attestation report (`struct snp_report_req`).
#[repr(C)]
#[derive(Clone, Debug, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct ReportRequest {
    /// The custom data to be included in the attestation report.
    pub report_data: [u8; REPORT_DATA_SIZE],
    /// The VM Protection Level (VMPL) to be used in the attestation report.
    ///
    /// Must be greater or equal to the current VMPL and at most 3.
    pub vmpl: u32,
    /// Reserved, must be zero.
    _reserved: [u8; 28],
}
static_assertions::assert_eq_size!(ReportRequest, [u8; 96]);

impl ReportRequest {
    pub fn new(report_data: [u8; REPORT_DATA_SIZE], vmpl: u32) -> Self {
        ReportRequest { report_data, vmpl, _reserved: [0; 28] }
    }
}

/// Response containing the attestation report (`struct snp_report_resp`),
/// which holds a `MSG_REPORT_RSP` message.
///
/// See Table 25 in <https://www.amd.com/system/files/TechDocs/56860.pdf>.
#[repr(C)]
#[derive(Clone, Debug, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct ReportResponse {
    /// The status of the operation.
    pub status: u32,
    /// The size of the report.
    pub report_size: u32,
    /// Reserved, must be zero.
    _reserved: [u8; 24],
    /// The attestation report.
    pub report: AttestationReport,
    /// Padding up to the size of the kernel response buffer.
    _padding: [u8; REPORT_RESPONSE_SIZE - 32 - REPORT_SIZE],
}
static_assertions::assert_eq_size!(ReportResponse, [u8; REPORT_RESPONSE_SIZE]);

impl ReportResponse {
    /// Creates a successful response around `report`.
    pub fn new(report: AttestationReport) -> Self {
        let mut response = ReportResponse::new_zeroed();
        response.report_size = REPORT_SIZE as u32;
        response.report = report;
        response
    }

    /// Gets the status field as a `ReportStatus` enum if possible.
    pub fn get_status(&self) -> Option<ReportStatus> {
        ReportStatus::from_repr(self.status)
    }
}

/// The status of the report response.
#[derive(Clone, Copy, Debug, FromRepr, PartialEq)]
#[repr(u32)]
pub enum ReportStatus {
    /// Report was successfully generated.
    Success = 0,
    /// The supplied parameters in the request was invalid.
    InvalidParams = 0x16,
    /// The key selection field was invalid.
    InvalidKeySelection = 0x27,
}

/// Request for an extended attestation report (`struct snp_ext_report_req`).
#[derive(Debug)]
pub struct ExtendedReportRequest<'a> {
    /// The embedded report request.
    pub data: ReportRequest,
    /// The buffer the certificate table is written to.
    pub certs: &'a mut [u8],
    /// On input, the usable length of `certs`. When the buffer is too small
    /// the driver replaces it with the required length.
    pub certs_len: u32,
}

impl<'a> ExtendedReportRequest<'a> {
    /// Creates a request whose declared length matches the buffer.
    pub fn new(data: ReportRequest, certs: &'a mut [u8]) -> Self {
        let certs_len = declared_length(certs.len());
        ExtendedReportRequest { data, certs, certs_len }
    }
}

/// Converts a buffer length to the ABI's `u32` length field. Buffers above
/// 4 GiB declare `u32::MAX`; handlers bound their writes by the real buffer.
fn declared_length(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

/// The request payload carried by a guest request.
#[derive(Debug)]
pub enum GuestRequestPayload<'a> {
    Report(ReportRequest),
    ExtendedReport(ExtendedReportRequest<'a>),
}

/// The argument of a `sev-guest` ioctl (`struct snp_guest_request_ioctl`).
#[derive(Debug)]
pub struct SnpUserGuestRequest<'a> {
    /// Message version number, must be non-zero.
    pub message_version: u8,
    /// The request payload.
    pub request: GuestRequestPayload<'a>,
    /// The response buffer.
    pub response: &'a mut ReportResponse,
    /// Firmware and VMM error codes (`exitinfo2`).
    pub fw_error: u64,
}

impl<'a> SnpUserGuestRequest<'a> {
    pub fn new(request: GuestRequestPayload<'a>, response: &'a mut ReportResponse) -> Self {
        SnpUserGuestRequest { message_version: 1, request, response, fw_error: 0 }
    }
}

/// An argument passed to the device's ioctl entry point.
#[derive(Debug)]
pub enum IoctlRequest<'a> {
    /// A guest request, the only argument type the `sev-guest` driver knows.
    Guest(SnpUserGuestRequest<'a>),
    /// An argument of any other layout.
    Raw(&'a mut [u8]),
}

impl IoctlRequest<'_> {
    /// The `exitinfo2` value written by the device, zero for raw arguments.
    pub fn fw_error(&self) -> u64 {
        match self {
            IoctlRequest::Guest(guest_request) => guest_request.fw_error,
            IoctlRequest::Raw(_) => 0,
        }
    }
}

/// The outcome of the GHCB guest request exit, independent of the firmware
/// status.
#[derive(Clone, Copy, Debug, Default, Eq, FromRepr, PartialEq)]
#[repr(u32)]
pub enum EsResult {
    #[default]
    Ok = 0,
    /// The requested operation is not supported.
    Unsupported = 1,
    /// The hypervisor returned an error.
    VmmError = 2,
    /// The instruction could not be decoded.
    DecodeFailed = 3,
    /// An exception was raised.
    Exception = 4,
    /// The operation should be retried.
    Retry = 5,
}

/// SEV firmware status codes.
///
/// See Table 3 in <https://www.amd.com/system/files/TechDocs/55766_SEV-KM_API_Specification.pdf>.
#[derive(Clone, Copy, Debug, FromRepr, PartialEq)]
#[repr(u32)]
pub enum SevFirmwareStatus {
    Success = 0x00,
    InvalidPlatformState = 0x01,
    InvalidGuestState = 0x02,
    InvalidConfig = 0x03,
    InvalidLength = 0x04,
    AlreadyOwned = 0x05,
    InvalidCertificate = 0x06,
    PolicyFailure = 0x07,
    Inactive = 0x08,
    InvalidAddress = 0x09,
    BadSignature = 0x0a,
    BadMeasurement = 0x0b,
    AsidOwned = 0x0c,
    InvalidAsid = 0x0d,
    WbinvdRequired = 0x0e,
    DfFlushRequired = 0x0f,
    InvalidGuest = 0x10,
    InvalidCommand = 0x11,
    Active = 0x12,
    HwErrorPlatform = 0x13,
    HwErrorUnsafe = 0x14,
    Unsupported = 0x15,
    InvalidParam = 0x16,
    ResourceLimit = 0x17,
    SecureDataInvalid = 0x18,
    InvalidPageSize = 0x19,
    InvalidPageState = 0x1a,
    InvalidMdataEntry = 0x1b,
    InvalidPageOwner = 0x1c,
    AeadOverflow = 0x1d,
    RmpInitRequired = 0x1f,
    BadSvn = 0x20,
    BadVersion = 0x21,
    ShutdownRequired = 0x22,
    UpdateFailed = 0x23,
    RestoreRequired = 0x24,
    RmpInitFailed = 0x25,
    InvalidKey = 0x26,
}

/// The `exitinfo2` value of a guest request: the VMM error in the upper half
/// and the firmware status in the lower half.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FirmwareError(pub u64);

impl FirmwareError {
    pub fn vmm_error(&self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub fn firmware_status(&self) -> u32 {
        self.0 as u32
    }

    /// Whether this is the reply to a certificate buffer size query.
    pub fn is_invalid_length(&self) -> bool {
        self.vmm_error() == SNP_GUEST_VMM_ERR_INVALID_LEN
    }
}

impl fmt::Display for FirmwareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.vmm_error() {
            0 => {}
            SNP_GUEST_VMM_ERR_INVALID_LEN => write!(f, "VMM error: invalid length, ")?,
            SNP_GUEST_VMM_ERR_BUSY => write!(f, "VMM error: busy, ")?,
            other => write!(f, "VMM error: 0x{other:x}, ")?,
        }
        match SevFirmwareStatus::from_repr(self.firmware_status()) {
            Some(status) => write!(f, "firmware status: {status:?}"),
            None => write!(f, "firmware status: unknown (0x{:x})", self.firmware_status()),
        }
    }
}
