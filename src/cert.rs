//! Signing-certificate parsing and fingerprinting.
//!
//! Fingerprints are computed over the raw DER bytes, never over parsed
//! fields, in fixed order: MD5, SHA-1, SHA-256. An unparseable blob is a
//! recoverable outcome; analysis of the package continues without
//! certificate data.

use tracing::{debug, warn};
use x509_parser::prelude::*;

use crate::core::{CertificateInfo, Fingerprint, PrincipalEntry};
use crate::hashing::{format_fingerprint, md5_digest, sha1_digest, sha256_digest};

/// Known principal keywords with their human-readable names, keyed by
/// attribute OID. Anything else passes through unannotated.
const KEYWORD_TABLE: [(&str, &str, &str); 7] = [
    ("2.5.4.3", "CN", "Common Name"),
    ("2.5.4.11", "OU", "Organizational Unit"),
    ("2.5.4.10", "O", "Organization"),
    ("2.5.4.7", "L", "Locality"),
    ("2.5.4.8", "ST", "State or Province"),
    ("2.5.4.6", "C", "Country"),
    ("1.2.840.113549.1.9.1", "EMAILADDRESS", "Email Address"),
];

/// Parse one raw signing certificate.
///
/// Returns `None` when the bytes do not form a certificate; the miss is
/// logged, never propagated.
pub fn analyze(der: &[u8]) -> Option<CertificateInfo> {
    let (_, cert) = match X509Certificate::from_der(der) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, bytes = der.len(), "unparseable signing certificate");
            return None;
        }
    };

    Some(CertificateInfo {
        issuer: principal_entries(cert.issuer()),
        subject: principal_entries(cert.subject()),
        fingerprint: fingerprint(der),
    })
}

/// Identity fingerprints over raw certificate bytes.
pub fn fingerprint(der: &[u8]) -> Fingerprint {
    Fingerprint {
        md5: format_fingerprint(&md5_digest(der)),
        sha1: format_fingerprint(&sha1_digest(der)),
        sha256: format_fingerprint(&sha256_digest(der)),
    }
}

fn principal_entries(name: &X509Name<'_>) -> Vec<PrincipalEntry> {
    let mut entries = Vec::new();
    for attr in name.iter_attributes() {
        let value = match attr.as_str() {
            Ok(v) => v.to_string(),
            Err(e) => {
                debug!(error = %e, "skipping non-string principal attribute");
                continue;
            }
        };
        let oid = attr.attr_type().to_id_string();
        let known = KEYWORD_TABLE.iter().find(|(id, _, _)| *id == oid);
        entries.push(match known {
            Some((_, keyword, reference)) => PrincipalEntry {
                keyword: (*keyword).to_string(),
                value,
                reference_name: Some((*reference).to_string()),
            },
            None => PrincipalEntry {
                keyword: oid,
                value,
                reference_name: None,
            },
        });
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    const CERT_DER: &[u8] =
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/cert.der"));

    #[test]
    fn golden_fingerprints() {
        let fp = fingerprint(CERT_DER);
        assert_eq!(fp.md5, "C9:18:69:F8:CD:57:60:95  71:BA:5B:16:09:7B:FA:AA");
        assert_eq!(
            fp.sha1,
            "C3:CC:8E:A3:3E:5E:23:AB  66:BF:8E:4B:72:6C:68:F3  4A:15:EB:B7"
        );
        assert_eq!(
            fp.sha256,
            "E8:84:05:63:24:13:37:06  01:09:06:7D:A4:69:35:AA  \
             91:05:07:38:66:16:86:80  48:F6:6B:AB:12:24:4D:98"
        );
    }

    #[test]
    fn principal_keywords_annotated() {
        let info = analyze(CERT_DER).unwrap();
        let find = |keyword: &str| {
            info.subject
                .iter()
                .find(|e| e.keyword == keyword)
                .unwrap_or_else(|| panic!("missing {}", keyword))
        };
        assert_eq!(find("CN").value, "Apkscope Test");
        assert_eq!(find("CN").reference_name.as_deref(), Some("Common Name"));
        assert_eq!(find("C").value, "US");
        assert_eq!(find("OU").value, "Engineering");
        assert_eq!(
            find("EMAILADDRESS").reference_name.as_deref(),
            Some("Email Address")
        );
        // Self-signed: issuer mirrors subject.
        assert_eq!(info.issuer, info.subject);
    }

    #[test]
    fn garbage_is_unparseable() {
        assert!(analyze(b"not a certificate").is_none());
        assert!(analyze(b"").is_none());
    }
}
