//! Parsed signing-certificate facts.

use serde::{Deserialize, Serialize};

/// One keyword/value pair from a certificate principal (issuer or
/// subject), optionally annotated with a human-readable name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalEntry {
    pub keyword: String,
    pub value: String,
    /// Human-readable name for known keywords (CN, OU, O, L, ST, C,
    /// email address); `None` for anything else.
    pub reference_name: Option<String>,
}

/// Identity fingerprints over the raw certificate bytes, in fixed order.
/// Each digest is rendered as grouped uppercase hex (pairs joined by
/// `:`, eight pairs per group, groups joined by two spaces).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
}

/// Structured facts extracted from one signing certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateInfo {
    pub issuer: Vec<PrincipalEntry>,
    pub subject: Vec<PrincipalEntry>,
    pub fingerprint: Fingerprint,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_round_trip() {
        let info = CertificateInfo {
            issuer: vec![PrincipalEntry {
                keyword: "CN".to_string(),
                value: "Android Debug".to_string(),
                reference_name: Some("Common Name".to_string()),
            }],
            subject: vec![],
            fingerprint: Fingerprint {
                md5: "AA:BB".to_string(),
                sha1: "CC:DD".to_string(),
                sha256: "EE:FF".to_string(),
            },
        };
        let json = serde_json::to_string(&info).unwrap();
        let back: CertificateInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
    }
}
