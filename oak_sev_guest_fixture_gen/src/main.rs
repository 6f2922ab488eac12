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

//! Generates signed SEV-SNP attestation report fixtures by running the
//! extended report protocol against a mock `sev-guest` device.

use std::{fs, path::PathBuf};

use anyhow::Context;
use clap::Parser;
use log::info;
use oak_sev_guest_testing::{
    certificates::{CertType, CertificateTable},
    client::get_extended_report,
    CannedReportResponse, MockDevice, SevGuestDevice, TestSigner,
};
use oak_sev_snp_attestation_report::REPORT_DATA_SIZE;
use zerocopy::IntoBytes;

const DEFAULT_SEED: &str = "oak-sev-guest-fixture";

#[derive(Parser, Clone)]
#[command(about = "Oak SEV-SNP Attestation Report Fixture Generator")]
struct Cli {
    #[arg(
        long,
        help = "Hex-encoded report data, at most 64 bytes, zero-padded on the right",
        default_value = ""
    )]
    report_data: String,
    #[arg(long, help = "Seed from which the signing key is derived", default_value = DEFAULT_SEED)]
    seed: String,
    #[arg(long, help = "The VM protection level to request the report for", default_value_t = 0)]
    vmpl: u32,
    #[arg(long, help = "The location of the ARK certificate to include")]
    ark: Option<PathBuf>,
    #[arg(long, help = "The location of the ASK certificate to include")]
    ask: Option<PathBuf>,
    #[arg(long, help = "The location of the VCEK certificate to include")]
    vcek: Option<PathBuf>,
    #[arg(long, help = "The directory the fixtures are written to", default_value = ".")]
    output_dir: PathBuf,
}

impl Cli {
    fn certificate_table(&self) -> anyhow::Result<CertificateTable> {
        let mut table = CertificateTable::new();
        for (cert_type, path) in
            [(CertType::Ark, &self.ark), (CertType::Ask, &self.ask), (CertType::Vcek, &self.vcek)]
        {
            if let Some(path) = path {
                let certificate = fs::read(path)
                    .with_context(|| format!("couldn't read certificate {}", path.display()))?;
                table.insert(cert_type, certificate);
            }
        }
        Ok(table)
    }
}

fn parse_report_data(value: &str) -> anyhow::Result<[u8; REPORT_DATA_SIZE]> {
    let bytes = hex::decode(value)
        .map_err(|err| anyhow::anyhow!("report data is not valid hex: {err}"))?;
    anyhow::ensure!(
        bytes.len() <= REPORT_DATA_SIZE,
        "report data is {} bytes, at most {REPORT_DATA_SIZE} are allowed",
        bytes.len()
    );
    let mut report_data = [0u8; REPORT_DATA_SIZE];
    report_data[..bytes.len()].copy_from_slice(&bytes);
    Ok(report_data)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let report_data = parse_report_data(&cli.report_data)?;
    let signer = TestSigner::from_seed(cli.seed.as_bytes())?;
    let table = cli.certificate_table()?;

    let mut device = MockDevice::new(&signer);
    device.register_response(report_data, CannedReportResponse::success(report_data));
    if !table.is_empty() {
        device.set_certificates(table.to_bytes()?);
    }
    device.open("/dev/sev-guest")?;
    let (report, certificates) = get_extended_report(&device, report_data, cli.vmpl)?;
    device.close()?;

    fs::create_dir_all(&cli.output_dir)
        .with_context(|| format!("couldn't create {}", cli.output_dir.display()))?;
    let write = |name: &str, contents: &[u8]| -> anyhow::Result<()> {
        let path = cli.output_dir.join(name);
        fs::write(&path, contents).with_context(|| format!("couldn't write {}", path.display()))?;
        info!("wrote {} bytes to {}", contents.len(), path.display());
        Ok(())
    };
    write("report.bin", report.as_bytes())?;
    if !certificates.is_empty() {
        write("certs.bin", &certificates)?;
    }
    let public_key = signer.verifying_key().to_encoded_point(false);
    write("vcek_public_key.hex", hex::encode(public_key.as_bytes()).as_bytes())?;

    println!("Report data: {}", hex::encode(report_data));
    Ok(())
}

#[cfg(test)]
mod tests {
    use googletest::prelude::*;

    use super::*;

    #[googletest::test]
    fn short_report_data_is_zero_padded() {
        let report_data = parse_report_data("0102").unwrap();

        assert_eq!(report_data[..2], [1, 2]);
        assert_that!(report_data[2..].iter().all(|byte| *byte == 0), eq(true));
    }

    #[googletest::test]
    fn oversized_report_data_is_rejected() {
        assert_that!(parse_report_data(&"00".repeat(65)).is_err(), eq(true));
    }

    #[googletest::test]
    fn invalid_hex_is_rejected() {
        assert_that!(parse_report_data("xyz").is_err(), eq(true));
    }
}
