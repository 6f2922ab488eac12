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

//! AMD SEV-SNP attestation report layout, together with the helpers needed to
//! sign a report in software: extracting the signed component and embedding
//! an ECDSA P-384 signature at the signature offset.
//!
//! This is based on revision 1.58 of <https://www.amd.com/system/files/TechDocs/56860.pdf>

#![cfg_attr(not(test), no_std)]

use bitflags::bitflags;
use strum::FromRepr;
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

/// The size of a serialized attestation report.
pub const REPORT_SIZE: usize = 0x4A0;

/// The offset of the signature within a serialized attestation report. All
/// bytes before this offset are covered by the signature.
pub const SIGNATURE_OFFSET: usize = 0x2A0;

/// The size of each of the R and S fields in the report signature.
pub const SIGNATURE_COMPONENT_SIZE: usize = 72;

/// The size of an ECDSA P-384 scalar.
pub const P384_SCALAR_SIZE: usize = 48;

/// The number of bytes of custom data that can be included in the attestation
/// report.
///
/// See Table 23 of the SEV-SNP firmware ABI.
pub const REPORT_DATA_SIZE: usize = 64;

/// The attestation report version produced by current firmware.
pub const CURRENT_REPORT_VERSION: u32 = 5;

/// A signed attestation report.
///
/// See Table 23 of the SEV-SNP firmware ABI.
#[repr(C)]
#[derive(Clone, Debug, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct AttestationReport {
    /// The data contained in the report.
    pub data: AttestationReportData,
    /// The signature over the data.
    pub signature: EcdsaSignature,
}
static_assertions::assert_eq_size!(AttestationReport, [u8; REPORT_SIZE]);
static_assertions::const_assert_eq!(
    core::mem::offset_of!(AttestationReport, signature),
    SIGNATURE_OFFSET
);

impl AttestationReport {
    /// Creates a new AttestationReport with all zeros and the provided value on
    /// the data.report_data field.
    pub fn from_report_data(report_data: [u8; REPORT_DATA_SIZE]) -> Self {
        let mut result = AttestationReport::new_zeroed();
        result.data.report_data = report_data;
        result
    }

    /// The bytes covered by the signature.
    pub fn signed_component(&self) -> &[u8] {
        self.data.as_bytes()
    }

    /// Checks that the report data is valid and the signature has the expected
    /// format.
    pub fn validate(&self) -> Result<(), &'static str> {
        self.data.validate()?;
        self.signature.validate_format()
    }
}

/// A byte array which is interpreted depending on the CPU model.
///
/// See Tables 3 and 4 of the SEV-SNP firmware ABI.
pub type RawTcbVersion = [u8; 8];

/// The data contained in an attestation report.
///
/// See Table 23 of the SEV-SNP firmware ABI.
#[repr(C)]
#[derive(Clone, Debug, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct AttestationReportData {
    /// The version of the attestation report format.
    pub version: u32,
    /// The guest security version number.
    pub guest_svn: u32,
    /// The policy required by the guest VM to be launched.
    pub policy: GuestPolicy,
    /// The family ID provided at launch.
    pub family_id: [u8; 16],
    /// The image ID provided at launch.
    pub image_id: [u8; 16],
    /// The VMPL value that was passed in the request.
    pub vmpl: u32,
    /// The algorithm used to sign the report.
    ///
    /// Use `AttestationReportData::get_signature_algo` to try to convert this
    /// to a `SigningAlgorithm` enum.
    pub signature_algo: u32,
    /// The current version of each of the components in the Trusted Computing
    /// Base (TCB).
    pub current_tcb: RawTcbVersion,
    /// Information about the platform.
    pub platform_info: u64,
    /// Bit-packed field containing the following:
    /// 31:5 -- reserved, MBZ
    /// 4:2 -- SIGNING_KEY, key used to sign this report
    /// 1 - MASK_CHIP_KEY
    /// 0 - AUTHOR_KEY_EN
    key: u32,

    /// Reserved. Must be zero.
    _reserved_4: u32,
    /// Guest-provided data. The custom data provided in the attestation
    /// request.
    pub report_data: [u8; REPORT_DATA_SIZE],
    /// The measurement of the VM memory calculated at launch.
    pub measurement: [u8; 48],
    /// Custom data provided by the hypervisor at launch.
    pub host_data: [u8; 32],
    /// The SHA-384 digest of the ID public key used to sign the ID block.
    pub id_key_digest: [u8; 48],
    /// The SHA-384 digest of the author public key used to certify the ID key.
    pub author_key_digest: [u8; 48],
    /// The report ID of this guest.
    pub report_id: [u8; 32],
    /// The report ID of this guest's migration agent.
    pub report_id_ma: [u8; 32],
    /// The reported TCB version that was used to generate the versioned chip
    /// endorsement key (VCEK) used to sign this report.
    pub reported_tcb: RawTcbVersion,
    /// Family ID (combined Extended Family ID and Family ID).
    pub cpuid_fam_id: u8,
    /// Model (combined Extended Model and Model fields).
    pub cpuid_mod_id: u8,
    /// Stepping.
    pub cpuid_step: u8,
    /// Reserved.
    _reserved_0: [u8; 21],
    /// Identifier unique to the chip, unless masked.
    pub chip_id: [u8; 64],
    /// The committed TCB version.
    pub committed_tcb: RawTcbVersion,
    /// The build number of the current secure firmware ABI version.
    pub current_build: u8,
    /// The minor number of the current secure firmware ABI version.
    pub current_minor: u8,
    /// The major number of the current secure firmware ABI version.
    pub current_major: u8,
    /// Reserved.
    _reserved_1: u8,
    /// The build number of the committed secure firmware ABI version.
    pub committed_build: u8,
    /// The minor number of the committed secure firmware ABI version.
    pub committed_minor: u8,
    /// The major number of the committed secure firmware ABI version.
    pub committed_major: u8,
    /// Reserved.
    _reserved_2: u8,
    /// The value of the current TCB version when the guest was launched or
    /// imported.
    pub launch_tcb: RawTcbVersion,
    /// The value of the verified mitigation vector when the guest was launched.
    pub launch_mit_vector: u64,
    /// The value of the current verified mitigation vector.
    pub current_mit_vector: u64,

    /// Reserved.
    _reserved_3: [u8; 152],
}

static_assertions::assert_eq_size!(AttestationReportData, [u8; SIGNATURE_OFFSET]);

impl AttestationReportData {
    /// Gets the key used to sign this report.
    pub fn get_signing_key(&self) -> Option<SigningKey> {
        // Only bits 2, 3, 4 are of interest, mask out the rest and shift.
        SigningKey::from_repr((self.key & 0b11100) >> 2)
    }

    /// Sets the SIGNING_KEY bits of the key field.
    pub fn set_signing_key(&mut self, signing_key: SigningKey) {
        self.key = (self.key & !0b11100) | ((signing_key as u32) << 2);
    }

    /// Gets the signing algorithm field as a `SigningAlgorithm` enum if
    /// possible.
    pub fn get_signature_algo(&self) -> Option<SigningAlgorithm> {
        SigningAlgorithm::from_repr(self.signature_algo)
    }

    /// Checks that fields with specific expected values or ranges are valid and
    /// the reserved bytes are all zero.
    pub fn validate(&self) -> Result<(), &'static str> {
        // Version zero must go through since it represents the fake/insecure
        // case.
        if self.version == 1 || self.version == 2 {
            return Err("outdated attestation report version - upgrade firmware");
        }
        self.policy.validate()?;
        if self._reserved_4 != 0 {
            return Err("nonzero value in _reserved_4");
        }
        if self.get_signing_key().is_none() {
            return Err("invalid signing key setting");
        }
        if self.get_signature_algo().is_none() {
            return Err("invalid signature algorithm");
        }
        Ok(())
    }
}

/// The signing algorithm used for the report signature.
///
/// See Table 139 of the SEV-SNP firmware ABI.
#[derive(Debug, FromRepr, PartialEq)]
#[repr(u32)]
pub enum SigningAlgorithm {
    /// Invalid.
    Invalid = 0,
    /// ECDSA using curve P-384 with SHA-384.
    EcdsaP384Sha384 = 1,
}

/// Key used to sign the attestation report.
///
/// See Table 23 of the SEV-SNP firmware ABI.
#[derive(Clone, Copy, Debug, FromRepr, PartialEq)]
#[repr(u32)]
pub enum SigningKey {
    VCEK = 0,
    VLEK = 1,
    // Values 2 through 6 are reserved.
    None = 7,
}

/// The required policy for a guest to run.
///
/// See Table 9 of the SEV-SNP firmware ABI.
#[repr(C)]
#[derive(Clone, Debug, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct GuestPolicy {
    /// The minimum ABI minor version required to launch the guest.
    pub abi_minor: u8,
    /// The minimum ABI major version required to launch the guest.
    pub abi_major: u8,
    /// The allowed settings for the guest.
    ///
    /// Use `GuestPolicy::get_flags` to try to convert this to a `PolicyFlags`
    /// enum.
    pub flags: u16,
    /// Reserved, must be zero.
    _reserved: u32,
}

static_assertions::assert_eq_size!(GuestPolicy, u64);

impl GuestPolicy {
    /// Gets the flags field as a `PolicyFlags` representation if possible.
    pub fn get_flags(&self) -> Option<PolicyFlags> {
        PolicyFlags::from_bits(self.flags)
    }

    /// Checks that the flags are valid and the reserved bytes are all zero.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self._reserved != 0 {
            return Err("nonzero value in _reserved");
        }
        if self.get_flags().is_none() {
            return Err("invalid flags");
        }
        Ok(())
    }
}

bitflags! {
    /// Flags indicating allowed policy options.
    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    pub struct PolicyFlags: u16 {
        /// Simulatneous multi-threading (SMT) is allowed.
        const SMT = (1 << 0);
        /// Reserved, must always be 1.
        const RESERVED = (1 << 1);
        /// The guest can be associated with a migration agent.
        const MIGRATE_MA = (1 << 2);
        /// Debugging the guest is allowed.
        const DEBUG = (1 << 3);
        /// The guest can only be activated on a single socket.
        const SINGLE_SOCKET = (1 << 4);
        /// CXL can be populated with devices or memory.
        const CXL_ALLOW = (1 << 5);
        /// AES 256 XTS is required for memory encryption.
        const MEM_AES_256_XTS = (1 << 6);
        /// Running Average Power Limit is disabled.
        const RAPL_DIS = (1 << 7);
        /// Ciphertext hiding for DRAM must be enabled.
        const CIPHERTEXT_HIDING_DRAM = (1 << 8);
        /// Disable Guest support for Page Swap and Page Move commands.
        const PAGE_SWAP_DISABLE = (1 << 9);
    }
}

/// An ECDSA signature.
///
/// See Table 141 of the SEV-SNP firmware ABI.
#[repr(C)]
#[derive(Clone, Debug, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct EcdsaSignature {
    /// The R component of this signature. The value is zero-extended and
    /// little-endian encoded.
    pub r: [u8; SIGNATURE_COMPONENT_SIZE],
    /// The S component of this signature. The value is zero-extended and
    /// little-endian encoded.
    pub s: [u8; SIGNATURE_COMPONENT_SIZE],
    /// Reserved, must be zero.
    _reserved: [u8; 368],
}
static_assertions::assert_eq_size!(EcdsaSignature, [u8; 512]);

impl EcdsaSignature {
    /// Checks that the reserved bytes are all zero.
    pub fn validate_format(&self) -> Result<(), &'static str> {
        if self._reserved.iter().any(|&value| value != 0) {
            return Err("nonzero value in _reserved");
        }
        Ok(())
    }

    /// Stores the big-endian unsigned integers `r` and `s` in the signature
    /// fields.
    pub fn set_components(&mut self, r: &[u8], s: &[u8]) -> Result<(), &'static str> {
        write_component(r, &mut self.r)?;
        write_component(s, &mut self.s)
    }

    /// Returns `r` and `s` as big-endian P-384 scalars.
    pub fn p384_components(
        &self,
    ) -> Result<([u8; P384_SCALAR_SIZE], [u8; P384_SCALAR_SIZE]), &'static str> {
        Ok((read_p384_component(&self.r)?, read_p384_component(&self.s)?))
    }
}

/// Writes a big-endian unsigned integer into a zero-extended little-endian
/// field.
fn write_component(big_endian: &[u8], field: &mut [u8]) -> Result<(), &'static str> {
    let leading_zeros = big_endian.iter().take_while(|&&byte| byte == 0).count();
    let significant = &big_endian[leading_zeros..];
    if significant.len() > field.len() {
        return Err("signature component does not fit in the signature field");
    }
    field.fill(0);
    for (target, source) in field.iter_mut().zip(significant.iter().rev()) {
        *target = *source;
    }
    Ok(())
}

fn read_p384_component(
    field: &[u8; SIGNATURE_COMPONENT_SIZE],
) -> Result<[u8; P384_SCALAR_SIZE], &'static str> {
    if field[P384_SCALAR_SIZE..].iter().any(|&value| value != 0) {
        return Err("signature component is longer than a P-384 scalar");
    }
    // The field is little-endian, the scalar big-endian, so mirror.
    let mut result = [0u8; P384_SCALAR_SIZE];
    for (i, value) in result.iter_mut().enumerate() {
        *value = field[P384_SCALAR_SIZE - 1 - i];
    }
    Ok(result)
}
