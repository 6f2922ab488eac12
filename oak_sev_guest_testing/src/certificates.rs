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

//! The certificate table returned alongside extended attestation reports.
//!
//! The table starts with a list of 24-byte entries (a GUID, then the offset
//! and length of the certificate as little-endian `u32`s) terminated by an
//! all-zero entry. The certificates follow the entries and the whole blob is
//! padded to a whole number of 4 KiB pages.

use uuid::Uuid;

use crate::error::{Error, Result};

/// Certificate blobs are handed out in whole pages.
pub const PAGE_SIZE: usize = 4096;

const ENTRY_SIZE: usize = 24;
const GUID_SIZE: usize = 16;

const ARK_GUID: Uuid = Uuid::from_u128(0xc0b406a4_a803_4952_9743_3fb6014cd0ae);
const ASK_GUID: Uuid = Uuid::from_u128(0x4ab7b379_bbac_4fe4_a02f_05aef327c782);
const VCEK_GUID: Uuid = Uuid::from_u128(0x63da758d_e664_4564_adc5_f4b93be8accd);
const VLEK_GUID: Uuid = Uuid::from_u128(0xa8074bc2_a25a_483e_aae6_39c045a0b8a1);
const CRL_GUID: Uuid = Uuid::from_u128(0x92f81bc3_5811_4d3d_97ff_d19f88dc67ea);

/// The kind of certificate stored in a table entry.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CertType {
    /// AMD Root Key certificate.
    Ark,
    /// AMD SEV Key certificate.
    Ask,
    /// Versioned Chip Endorsement Key certificate.
    Vcek,
    /// Versioned Loaded Endorsement Key certificate.
    Vlek,
    /// Certificate revocation list.
    Crl,
    /// Any other certificate, identified by its GUID.
    Other(Uuid),
}

impl CertType {
    pub fn guid(&self) -> Uuid {
        match self {
            CertType::Ark => ARK_GUID,
            CertType::Ask => ASK_GUID,
            CertType::Vcek => VCEK_GUID,
            CertType::Vlek => VLEK_GUID,
            CertType::Crl => CRL_GUID,
            CertType::Other(guid) => *guid,
        }
    }

    pub fn from_guid(guid: Uuid) -> Self {
        match guid {
            ARK_GUID => CertType::Ark,
            ASK_GUID => CertType::Ask,
            VCEK_GUID => CertType::Vcek,
            VLEK_GUID => CertType::Vlek,
            CRL_GUID => CertType::Crl,
            other => CertType::Other(other),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CertTableEntry {
    pub cert_type: CertType,
    pub data: Vec<u8>,
}

/// An ordered set of certificates, at most one per type.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CertificateTable {
    entries: Vec<CertTableEntry>,
}

impl CertificateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `data` under `cert_type`, returning the certificate it replaces.
    pub fn insert(&mut self, cert_type: CertType, data: Vec<u8>) -> Option<Vec<u8>> {
        match self.entries.iter_mut().find(|entry| entry.cert_type == cert_type) {
            Some(entry) => Some(core::mem::replace(&mut entry.data, data)),
            None => {
                self.entries.push(CertTableEntry { cert_type, data });
                None
            }
        }
    }

    pub fn get(&self, cert_type: CertType) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|entry| entry.cert_type == cert_type)
            .map(|entry| entry.data.as_slice())
    }

    pub fn entries(&self) -> &[CertTableEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serializes the table into the layout the host hands to the guest.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut offset = (self.entries.len() + 1) * ENTRY_SIZE;
        let mut header = Vec::with_capacity(offset);
        let mut body = Vec::new();
        for entry in &self.entries {
            let start = u32::try_from(offset)
                .map_err(|_| Error::CertificateTable("table exceeds 4 GiB"))?;
            let length = u32::try_from(entry.data.len())
                .map_err(|_| Error::CertificateTable("certificate exceeds 4 GiB"))?;
            header.extend_from_slice(entry.cert_type.guid().as_bytes());
            header.extend_from_slice(&start.to_le_bytes());
            header.extend_from_slice(&length.to_le_bytes());
            body.extend_from_slice(&entry.data);
            offset += entry.data.len();
        }
        header.resize(header.len() + ENTRY_SIZE, 0);
        header.append(&mut body);
        header.resize(round_to_whole_pages(header.len()), 0);
        Ok(header)
    }

    /// Parses a table produced by [`CertificateTable::to_bytes`] or by the
    /// host. Trailing padding is ignored.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut table = CertificateTable::new();
        for raw_entry in bytes.chunks(ENTRY_SIZE) {
            if raw_entry.len() < ENTRY_SIZE {
                break;
            }
            let (guid, location) = raw_entry.split_at(GUID_SIZE);
            let guid = Uuid::from_slice(guid)
                .map_err(|_| Error::CertificateTable("invalid entry GUID"))?;
            if guid.is_nil() {
                return Ok(table);
            }
            let offset = read_u32(&location[..4]) as usize;
            let length = read_u32(&location[4..]) as usize;
            let data = offset
                .checked_add(length)
                .and_then(|end| bytes.get(offset..end))
                .ok_or(Error::CertificateTable("entry points outside the table"))?;
            if table.insert(CertType::from_guid(guid), data.to_vec()).is_some() {
                return Err(Error::CertificateTable("duplicate certificate type"));
            }
        }
        Err(Error::CertificateTable("missing terminating entry"))
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buffer = [0u8; 4];
    buffer.copy_from_slice(bytes);
    u32::from_le_bytes(buffer)
}

fn round_to_whole_pages(size: usize) -> usize {
    match size % PAGE_SIZE {
        0 => size,
        rem => size + (PAGE_SIZE - rem),
    }
}
