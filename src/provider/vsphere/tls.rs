//! # Certificate Pinning
//!
//! vCenter usually runs with a self-signed certificate. When a `VSphereCluster`
//! carries a thumbprint, the server certificate is accepted only if its
//! fingerprint matches; chain and host name are not checked.
//!
//! Thumbprints are colon separated hex. A 20 byte thumbprint is compared
//! against the SHA-1 digest of the certificate, a 32 byte one against SHA-256.

use anyhow::{bail, Context, Result};
use ring::digest::{digest, SHA1_FOR_LEGACY_USE_ONLY};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Parsed certificate fingerprint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Thumbprint {
    Sha1([u8; 20]),
    Sha256([u8; 32]),
}

impl Thumbprint {
    /// Parse `AB:CD:...` (separators and case are ignored)
    pub fn parse(value: &str) -> Result<Self> {
        let hex: String = value
            .chars()
            .filter(|c| !matches!(c, ':' | ' ' | '-'))
            .collect();
        if !hex.is_ascii() || hex.len() % 2 != 0 {
            bail!("thumbprint must be an even number of hex digits");
        }

        let bytes = (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16))
            .collect::<Result<Vec<u8>, _>>()
            .context("thumbprint is not valid hex")?;

        if let Ok(sha1) = <[u8; 20]>::try_from(bytes.as_slice()) {
            return Ok(Self::Sha1(sha1));
        }
        if let Ok(sha256) = <[u8; 32]>::try_from(bytes.as_slice()) {
            return Ok(Self::Sha256(sha256));
        }
        bail!(
            "thumbprint must be 20 (SHA-1) or 32 (SHA-256) bytes, got {}",
            bytes.len()
        )
    }

    /// Whether the DER encoded certificate has this fingerprint
    #[must_use]
    pub fn matches(&self, der: &[u8]) -> bool {
        match self {
            Self::Sha1(expected) => digest(&SHA1_FOR_LEGACY_USE_ONLY, der).as_ref() == expected,
            Self::Sha256(expected) => Sha256::digest(der).as_slice() == expected,
        }
    }
}

/// Accepts exactly the certificate with the pinned thumbprint
#[derive(Debug)]
pub struct ThumbprintVerifier {
    thumbprint: Thumbprint,
    provider: Arc<CryptoProvider>,
}

impl ThumbprintVerifier {
    #[must_use]
    pub fn new(thumbprint: Thumbprint, provider: Arc<CryptoProvider>) -> Self {
        Self {
            thumbprint,
            provider,
        }
    }
}

impl ServerCertVerifier for ThumbprintVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        if self.thumbprint.matches(end_entity.as_ref()) {
            Ok(ServerCertVerified::assertion())
        } else {
            Err(rustls::Error::General(
                "server certificate does not match the configured thumbprint".to_string(),
            ))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// rustls client configuration pinned to `thumbprint`
pub fn pinned_client_config(thumbprint: Thumbprint) -> Result<ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .context("Failed to select TLS protocol versions")?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(ThumbprintVerifier::new(thumbprint, provider)))
        .with_no_client_auth();
    Ok(config)
}
