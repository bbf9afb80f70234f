//! rustls plumbing for the TLS listeners and for outbound node connections.
//!
//! Outbound connections to nodes skip certificate verification: a node proves
//! it is authorised by checking the proxy's signature, not by presenting a
//! trusted certificate. TLS there only provides transport encryption.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, ring};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use rustls_pemfile::{Item, certs, read_one};
use tokio_rustls::{TlsAcceptor, TlsConnector};
use tracing::info;

use crate::types::TlsConfig;

fn provider() -> Arc<CryptoProvider> {
    Arc::new(ring::default_provider())
}

// reads a cert file and gives back every x509 cert in it
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path)
        .with_context(|| format!("opening certificate file `{}`", path.display()))?;
    let mut rd = BufReader::new(file);

    let raw_certs: Vec<_> = certs(&mut rd)
        .collect::<std::result::Result<_, _>>()
        .context("reading certificates from PEM")?;

    if raw_certs.is_empty() {
        bail!("no certificates found in `{}`", path.display());
    }
    Ok(raw_certs)
}

// first pkcs8 / sec1 / rsa private key in a PEM file
pub fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let mut rd = BufReader::new(
        File::open(path).with_context(|| format!("opening key file `{}`", path.display()))?,
    );

    loop {
        match read_one(&mut rd).context("reading PEM block")? {
            Some(Item::Pkcs8Key(key)) => return Ok(PrivateKeyDer::from(key)),
            Some(Item::Sec1Key(key)) => return Ok(PrivateKeyDer::from(key)),
            Some(Item::Pkcs1Key(key)) => return Ok(PrivateKeyDer::from(key)),
            Some(_) => continue,
            None => break,
        }
    }
    bail!("no private key found in `{}`", path.display());
}

/// Build a server-side acceptor from PEM files.
pub fn server_acceptor(cert: &Path, key: &Path) -> Result<TlsAcceptor> {
    let certs = load_certs(cert)?;
    let key = load_key(key)?;

    let config = rustls::ServerConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()
        .context("selecting TLS protocol versions")?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("building TLS server config")?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// `Some(acceptor)` when the section enables TLS.
pub fn acceptor_from_config(tls: &TlsConfig) -> Result<Option<TlsAcceptor>> {
    if !tls.enabled {
        return Ok(None);
    }

    let (Some(cert), Some(key)) = (&tls.cert, &tls.key) else {
        bail!("tls is enabled but cert or key is missing");
    };

    info!("TLS enabled with certificate {}", cert.display());
    server_acceptor(cert, key).map(Some)
}

/// Client connector that accepts any server certificate.
pub fn insecure_connector() -> Result<TlsConnector> {
    let provider = provider();
    let verifier = AcceptAnyServerCert(provider.clone());

    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .context("selecting TLS protocol versions")?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

/// SNI name for a node address; IPs and hostnames are both accepted.
pub fn server_name(host: &str) -> Result<ServerName<'static>> {
    ServerName::try_from(host.to_string())
        .with_context(|| format!("`{}` is not a valid server name", host))
}

/// Skips chain and hostname checks but still verifies handshake signatures,
/// so the session key is bound to whatever certificate the node presented.
#[derive(Debug)]
struct AcceptAnyServerCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn disabled_section_builds_no_acceptor() {
        let tls = TlsConfig::default();
        assert!(acceptor_from_config(&tls).unwrap().is_none());
    }

    #[test]
    fn enabled_section_without_paths_fails() {
        let tls = TlsConfig {
            enabled: true,
            cert: None,
            key: None,
        };
        assert!(acceptor_from_config(&tls).is_err());
    }

    #[test]
    fn pem_without_certificates_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not a pem file").unwrap();
        assert!(load_certs(file.path()).is_err());
        assert!(load_key(file.path()).is_err());
    }

    #[test]
    fn missing_files_name_the_path() {
        let err = load_certs(Path::new("/nonexistent/cert.pem")).unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/cert.pem"));
    }

    #[test]
    fn server_names_accept_hosts_and_ips() {
        assert!(server_name("127.0.0.1").is_ok());
        assert!(server_name("node-1.internal").is_ok());
        assert!(server_name("not a host").is_err());
    }

    #[test]
    fn insecure_connector_builds() {
        assert!(insecure_connector().is_ok());
    }
}
