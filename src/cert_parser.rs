// src/cert_parser.rs
use anyhow::Result;
use sha2::{Digest, Sha256};
use x509_parser::extensions::ParsedExtension;
use x509_parser::prelude::*;

/// Best-effort names pulled from a certificate or TBSCertificate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedNames {
    pub subject_cn: Option<String>,
    pub issuer_cn: Option<String>,
    /// Non-fatal problems met while parsing; the names above are still usable
    pub warnings: Vec<String>,
}

/// Certificate parser for the fields reported per log entry.
///
/// An `Err` means the input is malformed beyond recovery (fatal). Anything the
/// parser can step over (unrecognized extensions, undecodable name strings,
/// trailing bytes) is recorded in [`ParsedNames::warnings`] instead.
pub struct CertificateParser;

impl CertificateParser {
    /// Parse a full DER certificate (x509 leaf or pre-certificate)
    pub fn parse_certificate(der_bytes: &[u8]) -> Result<ParsedNames> {
        let (rest, cert) = X509Certificate::from_der(der_bytes)
            .map_err(|e| anyhow::anyhow!("Failed to parse X.509 certificate: {:?}", e))?;

        let mut names = Self::names_from_tbs(&cert.tbs_certificate);
        if !rest.is_empty() {
            names
                .warnings
                .push(format!("{} trailing bytes after certificate", rest.len()));
        }
        Ok(names)
    }

    /// Parse a bare TBSCertificate, as carried in a precert leaf
    pub fn parse_tbs(der_bytes: &[u8]) -> Result<ParsedNames> {
        let (rest, tbs) = TbsCertificate::from_der(der_bytes)
            .map_err(|e| anyhow::anyhow!("Failed to parse TBSCertificate: {:?}", e))?;

        let mut names = Self::names_from_tbs(&tbs);
        if !rest.is_empty() {
            names
                .warnings
                .push(format!("{} trailing bytes after TBSCertificate", rest.len()));
        }
        Ok(names)
    }

    /// SHA-256 fingerprint as lowercase hex
    pub fn fingerprint(der_bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(der_bytes);
        hex::encode(hasher.finalize())
    }

    fn names_from_tbs(tbs: &TbsCertificate) -> ParsedNames {
        let mut warnings = Vec::new();

        let subject_cn = Self::extract_cn(tbs.subject(), "subject", &mut warnings);
        let issuer_cn = Self::extract_cn(tbs.issuer(), "issuer", &mut warnings)
            .or_else(|| {
                // Fallback: full issuer DN
                let dn = tbs.issuer().to_string();
                if dn.is_empty() { None } else { Some(dn) }
            });

        for ext in tbs.extensions() {
            match ext.parsed_extension() {
                ParsedExtension::UnsupportedExtension { .. } => {
                    warnings.push(format!("unrecognized extension {}", ext.oid));
                }
                ParsedExtension::ParseError { error } => {
                    warnings.push(format!("malformed extension {}: {:?}", ext.oid, error));
                }
                _ => {}
            }
        }

        ParsedNames {
            subject_cn,
            issuer_cn,
            warnings,
        }
    }

    /// First Common Name attribute of a distinguished name
    fn extract_cn(name: &X509Name, role: &str, warnings: &mut Vec<String>) -> Option<String> {
        let attr = name.iter_common_name().next()?;
        match attr.as_str() {
            Ok(cn) => Some(cn.to_string()),
            Err(e) => {
                warnings.push(format!("{} CN not decodable: {:?}", role, e));
                None
            }
        }
    }
}
