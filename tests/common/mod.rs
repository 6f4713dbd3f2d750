// Shared helpers for integration tests: RFC 6962 leaf encoders and a
// wiremock-backed CT log.
#![allow(dead_code)]

use base64::Engine;
use ct_scanlog::ct_log::LogEntry;
use rcgen::{Certificate, CertificateParams, DistinguishedName, DnType, DnValue};
use serde_json::json;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Cert,
    Precert,
}

fn push_opaque(out: &mut Vec<u8>, data: &[u8]) {
    let len = data.len();
    out.extend_from_slice(&[(len >> 16) as u8, (len >> 8) as u8, len as u8]);
    out.extend_from_slice(data);
}

fn cert_list(chain: &[Vec<u8>]) -> Vec<u8> {
    let mut body = Vec::new();
    for c in chain {
        push_opaque(&mut body, c);
    }
    let mut out = Vec::new();
    push_opaque(&mut out, &body);
    out
}

fn header(timestamp: u64, entry_type: u16) -> Vec<u8> {
    let mut out = vec![0u8, 0u8];
    out.extend_from_slice(&timestamp.to_be_bytes());
    out.extend_from_slice(&entry_type.to_be_bytes());
    out
}

fn encode(leaf: Vec<u8>, extra: Vec<u8>) -> LogEntry {
    let engine = base64::engine::general_purpose::STANDARD;
    LogEntry {
        leaf_input: engine.encode(leaf),
        extra_data: engine.encode(extra),
    }
}

/// TBSCertificate element of a DER certificate
fn tbs_of(cert_der: &[u8]) -> Vec<u8> {
    fn read_header(der: &[u8], at: usize) -> (usize, usize) {
        let first = der[at + 1];
        if first & 0x80 == 0 {
            return (first as usize, at + 2);
        }
        let n = (first & 0x7f) as usize;
        let len = der[at + 2..at + 2 + n]
            .iter()
            .fold(0usize, |acc, &b| (acc << 8) | b as usize);
        (len, at + 2 + n)
    }

    let (_, body_start) = read_header(cert_der, 0);
    let (len, content_start) = read_header(cert_der, body_start);
    cert_der[body_start..content_start + len].to_vec()
}

fn certificate(cn: &str) -> Certificate {
    let mut params = CertificateParams::new(vec![cn.to_string()]);
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, DnValue::Utf8String(cn.to_string()));
    params.distinguished_name = dn;
    Certificate::from_params(params).unwrap()
}

/// Log entries of the given kinds, each with a real certificate for
/// `host-{index}.example.com` and a one-certificate chain
pub fn build_entries(kinds: &[Kind]) -> Vec<LogEntry> {
    let issuer = certificate("Integration CA");
    let issuer_der = issuer.serialize_der().unwrap();

    kinds
        .iter()
        .enumerate()
        .map(|(i, kind)| {
            let ts = 1_650_000_000_000 + i as u64;
            let leaf = certificate(&format!("host-{}.example.com", i));
            let der = leaf.serialize_der_with_signer(&issuer).unwrap();
            let chain = vec![issuer_der.clone()];

            match kind {
                Kind::Cert => {
                    let mut input = header(ts, 0);
                    push_opaque(&mut input, &der);
                    input.extend_from_slice(&[0, 0]);
                    encode(input, cert_list(&chain))
                }
                Kind::Precert => {
                    let mut input = header(ts, 1);
                    input.extend_from_slice(&[0x11; 32]);
                    push_opaque(&mut input, &tbs_of(&der));
                    input.extend_from_slice(&[0, 0]);

                    let mut extra = Vec::new();
                    push_opaque(&mut extra, &der);
                    extra.extend_from_slice(&cert_list(&chain));
                    encode(input, extra)
                }
            }
        })
        .collect()
}

/// Serves get-entries out of a shared entry list
struct EntriesResponder {
    entries: Arc<Mutex<Vec<LogEntry>>>,
    max_per_response: usize,
}

impl Respond for EntriesResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let param = |name: &str| {
            request
                .url
                .query_pairs()
                .find(|(k, _)| k == name)
                .and_then(|(_, v)| v.parse::<usize>().ok())
        };
        let (Some(start), Some(end)) = (param("start"), param("end")) else {
            return ResponseTemplate::new(400);
        };

        let entries = self.entries.lock().unwrap();
        let hi = (end + 1).min(entries.len());
        let page: Vec<&LogEntry> = if start < hi {
            entries[start..hi].iter().take(self.max_per_response).collect()
        } else {
            Vec::new()
        };
        ResponseTemplate::new(200).set_body_json(json!({ "entries": page }))
    }
}

/// Serves get-sth from the current size of the shared entry list
struct SthResponder {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl Respond for SthResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let size = self.entries.lock().unwrap().len();
        ResponseTemplate::new(200).set_body_json(json!({
            "tree_size": size,
            "timestamp": 1_650_000_000_000u64,
            "sha256_root_hash": "AAAA",
            "tree_head_signature": "AAAA"
        }))
    }
}

/// A CT log over HTTP whose contents can grow between runs
pub struct TestLog {
    pub server: MockServer,
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl TestLog {
    pub async fn start(kinds: &[Kind], max_per_response: usize) -> Self {
        let server = MockServer::start().await;
        let entries = Arc::new(Mutex::new(build_entries(kinds)));

        Mock::given(method("GET"))
            .and(path("/ct/v1/get-sth"))
            .respond_with(SthResponder {
                entries: entries.clone(),
            })
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/ct/v1/get-entries"))
            .respond_with(EntriesResponder {
                entries: entries.clone(),
                max_per_response,
            })
            .mount(&server)
            .await;

        Self { server, entries }
    }

    /// Append entries; existing indices keep their contents
    pub fn grow(&self, kinds: &[Kind]) {
        let mut entries = self.entries.lock().unwrap();
        let offset = entries.len();
        let fresh = build_entries(&[vec![Kind::Cert; offset], kinds.to_vec()].concat());
        entries.extend(fresh.into_iter().skip(offset));
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Number of get-entries requests served so far
    pub async fn entries_requests(&self) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == "/ct/v1/get-entries")
            .count()
    }
}
