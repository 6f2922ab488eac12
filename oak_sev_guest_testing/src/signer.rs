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

//! Software signing of attestation reports with a test VCEK.

use anyhow::Context;
use hkdf::Hkdf;
use oak_sev_snp_attestation_report::{AttestationReport, P384_SCALAR_SIZE};
use p384::{
    ecdsa::{
        signature::{Signer, Verifier},
        Signature, SigningKey, VerifyingKey,
    },
    FieldBytes,
};
use sha2::Sha384;

/// Salt mixed into every seed when deriving a test signing key.
pub const SEED_SALT: &str = "OAK_SEV_GUEST_TESTING_SALT";

/// The R and S components of an ECDSA signature as big-endian unsigned
/// integers.
#[derive(Clone, Debug, PartialEq)]
pub struct SignatureComponents {
    pub r: Vec<u8>,
    pub s: Vec<u8>,
}

/// Signs the signed component of an attestation report.
pub trait ReportSigner {
    fn sign(&self, message: &[u8]) -> anyhow::Result<SignatureComponents>;
}

/// An ECDSA P-384 / SHA-384 signer standing in for the chip's VCEK.
pub struct TestSigner {
    signing_key: SigningKey,
}

impl TestSigner {
    pub fn new(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    /// Derives a deterministic signing key from `seed`, so that fixtures are
    /// reproducible across runs.
    pub fn from_seed(seed: &[u8]) -> anyhow::Result<Self> {
        let hkdf = Hkdf::<Sha384>::new(Some(SEED_SALT.as_bytes()), seed);
        let mut okm = [0u8; P384_SCALAR_SIZE];
        hkdf.expand(b"VCEK", &mut okm)
            .map_err(|_err| anyhow::anyhow!("could not expand the signing key seed"))?;
        let signing_key =
            SigningKey::from_slice(&okm).context("seed does not yield a valid P-384 scalar")?;
        Ok(Self { signing_key })
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey::from(&self.signing_key)
    }
}

impl ReportSigner for TestSigner {
    fn sign(&self, message: &[u8]) -> anyhow::Result<SignatureComponents> {
        let signature: Signature =
            self.signing_key.try_sign(message).context("ECDSA P-384 signing failed")?;
        let (r, s) = signature.split_bytes();
        log::trace!("signed {} bytes, r={}", message.len(), hex::encode(r));
        Ok(SignatureComponents { r: r.to_vec(), s: s.to_vec() })
    }
}

/// Checks the signature embedded in `report` against `verifying_key`.
pub fn verify_report_signature(
    report: &AttestationReport,
    verifying_key: &VerifyingKey,
) -> anyhow::Result<()> {
    let (r, s) = report.signature.p384_components().map_err(anyhow::Error::msg)?;
    let signature =
        Signature::from_scalars(FieldBytes::from(r), FieldBytes::from(s))
            .map_err(|_err| anyhow::anyhow!("could not extract ECDSA P-384 signature"))?;
    verifying_key
        .verify(report.signed_component(), &signature)
        .map_err(|_err| anyhow::anyhow!("failed to verify ECDSA P-384 signature"))
}

#[cfg(test)]
mod tests {
    use googletest::prelude::*;

    use super::*;

    fn signed_report(signer: &TestSigner, report_data: [u8; 64]) -> AttestationReport {
        let mut report = AttestationReport::from_report_data(report_data);
        let components = signer.sign(report.signed_component()).unwrap();
        report.signature.set_components(&components.r, &components.s).unwrap();
        report
    }

    #[googletest::test]
    fn seeded_keys_are_deterministic() {
        let first = TestSigner::from_seed(b"seed").unwrap();
        let second = TestSigner::from_seed(b"seed").unwrap();
        let other = TestSigner::from_seed(b"other seed").unwrap();

        assert_eq!(first.verifying_key(), second.verifying_key());
        assert_ne!(first.verifying_key(), other.verifying_key());
    }

    #[googletest::test]
    fn signatures_are_deterministic() {
        let signer = TestSigner::from_seed(b"seed").unwrap();
        assert_eq!(signer.sign(b"message").unwrap(), signer.sign(b"message").unwrap());
    }

    #[googletest::test]
    fn embedded_signature_verifies() {
        let signer = TestSigner::from_seed(b"seed").unwrap();
        let report = signed_report(&signer, [5; 64]);

        assert_that!(&verify_report_signature(&report, &signer.verifying_key()), ok(anything()));
    }

    #[googletest::test]
    fn signature_from_other_key_fails() {
        let signer = TestSigner::from_seed(b"seed").unwrap();
        let other = TestSigner::from_seed(b"other seed").unwrap();
        let report = signed_report(&signer, [5; 64]);

        assert_that!(&verify_report_signature(&report, &other.verifying_key()), err(anything()));
    }

    #[googletest::test]
    fn tampered_report_fails() {
        let signer = TestSigner::from_seed(b"seed").unwrap();
        let mut report = signed_report(&signer, [5; 64]);
        report.data.report_data[0] ^= 1;

        assert_that!(&verify_report_signature(&report, &signer.verifying_key()), err(anything()));
    }

    #[googletest::test]
    fn unsigned_report_fails() {
        let signer = TestSigner::from_seed(b"seed").unwrap();
        let report = AttestationReport::from_report_data([5; 64]);

        assert_that!(&verify_report_signature(&report, &signer.verifying_key()), err(anything()));
    }
}
