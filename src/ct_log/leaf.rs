// src/ct_log/leaf.rs
//! Decoding of RFC 6962 `MerkleTreeLeaf` records and their `extra_data`.
//!
//! ```text
//! MerkleTreeLeaf  = version(1) leaf_type(1) TimestampedEntry
//! TimestampedEntry = timestamp(8) entry_type(2) signed_entry extensions(2+n)
//!   x509_entry:    ASN.1Cert            (3-byte length + DER)
//!   precert_entry: issuer_key_hash(32) TBSCertificate (3-byte length + DER)
//! ```
//!
//! `extra_data` is a 3-byte-length list of chain certificates for x509 entries,
//! and the full pre-certificate followed by that list for precert entries.

use anyhow::{Context, Result};
use base64::Engine;

use super::types::LogEntry;

/// Log-native leaf classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryType {
    Certificate,
    Precertificate,
    Unknown(u16),
}

impl EntryType {
    fn from_wire(value: u16) -> Self {
        match value {
            0 => EntryType::Certificate,
            1 => EntryType::Precertificate,
            other => EntryType::Unknown(other),
        }
    }

    /// Short name used in artifact file names and summaries
    pub fn label(&self) -> &'static str {
        match self {
            EntryType::Certificate => "cert",
            EntryType::Precertificate => "precert",
            EntryType::Unknown(_) => "unknown",
        }
    }
}

/// A decoded leaf at a known log index
#[derive(Debug, Clone)]
pub struct RawLogEntry {
    pub index: u64,
    /// Milliseconds since the Unix epoch, as stamped by the log
    pub timestamp: u64,
    pub entry_type: EntryType,
    /// Leaf certificate DER, or the full pre-certificate for precert entries
    pub cert: Vec<u8>,
    /// TBSCertificate submitted with a precert entry
    pub tbs_certificate: Option<Vec<u8>>,
    pub issuer_key_hash: Option<[u8; 32]>,
    /// Issuer chain, leaf-most first
    pub chain: Vec<Vec<u8>>,
}

impl RawLogEntry {
    /// Decode a get-entries record found at `index`
    pub fn from_log_entry(index: u64, entry: &LogEntry) -> Result<Self> {
        let engine = base64::engine::general_purpose::STANDARD;
        let leaf = engine
            .decode(&entry.leaf_input)
            .context("Failed to decode base64 leaf_input")?;
        let extra = engine
            .decode(&entry.extra_data)
            .context("Failed to decode base64 extra_data")?;

        Self::from_bytes(index, &leaf, &extra)
    }

    pub fn from_bytes(index: u64, leaf_input: &[u8], extra_data: &[u8]) -> Result<Self> {
        let mut leaf = TlsReader::new(leaf_input);

        let version = leaf.u8()?;
        if version != 0 {
            anyhow::bail!("Unsupported MerkleTreeLeaf version {}", version);
        }
        let leaf_type = leaf.u8()?;
        if leaf_type != 0 {
            anyhow::bail!("Unsupported MerkleLeafType {}", leaf_type);
        }

        let timestamp = leaf.u64()?;
        let entry_type = EntryType::from_wire(leaf.u16()?);

        let mut parsed = RawLogEntry {
            index,
            timestamp,
            entry_type,
            cert: Vec::new(),
            tbs_certificate: None,
            issuer_key_hash: None,
            chain: Vec::new(),
        };

        match entry_type {
            EntryType::Certificate => {
                parsed.cert = leaf.opaque_u24().context("x509_entry certificate")?.to_vec();
                leaf.extensions()?;

                // Some logs omit the chain for x509 entries entirely
                if !extra_data.is_empty() {
                    let mut extra = TlsReader::new(extra_data);
                    parsed.chain = extra.cert_list().context("certificate_chain")?;
                }
            }
            EntryType::Precertificate => {
                let hash = leaf.take(32).context("issuer_key_hash")?;
                let mut issuer_key_hash = [0u8; 32];
                issuer_key_hash.copy_from_slice(hash);
                parsed.issuer_key_hash = Some(issuer_key_hash);
                parsed.tbs_certificate =
                    Some(leaf.opaque_u24().context("precert tbs_certificate")?.to_vec());
                leaf.extensions()?;

                let mut extra = TlsReader::new(extra_data);
                parsed.cert = extra.opaque_u24().context("pre_certificate")?.to_vec();
                parsed.chain = extra.cert_list().context("precertificate_chain")?;
            }
            EntryType::Unknown(_) => {}
        }

        Ok(parsed)
    }
}

/// Cursor over TLS presentation-language encoded bytes
struct TlsReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> TlsReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let remaining = self.buf.len() - self.pos;
        if remaining < n {
            anyhow::bail!("truncated: need {} bytes at offset {}, have {}", n, self.pos, remaining);
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(((b[0] as u16) << 8) | (b[1] as u16))
    }

    fn u24(&mut self) -> Result<usize> {
        let b = self.take(3)?;
        Ok(((b[0] as usize) << 16) | ((b[1] as usize) << 8) | (b[2] as usize))
    }

    fn u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(b.iter().fold(0u64, |acc, &x| (acc << 8) | x as u64))
    }

    fn opaque_u24(&mut self) -> Result<&'a [u8]> {
        let len = self.u24()?;
        self.take(len)
    }

    fn extensions(&mut self) -> Result<()> {
        let len = self.u16()? as usize;
        self.take(len).context("CtExtensions")?;
        Ok(())
    }

    fn cert_list(&mut self) -> Result<Vec<Vec<u8>>> {
        let mut list = TlsReader::new(self.opaque_u24()?);
        let mut certs = Vec::new();
        while list.pos < list.buf.len() {
            certs.push(list.opaque_u24()?.to_vec());
        }
        Ok(certs)
    }
}
