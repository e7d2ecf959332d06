// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use anyhow::{anyhow, Context};
use rustls::ServerConfig;
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::TlsAcceptor;

use crate::config::TlsPaths;

/// Builds the acceptor for the metrics listener from a PEM certificate chain
/// and an unencrypted PEM private key.
pub fn acceptor(paths: &TlsPaths) -> anyhow::Result<TlsAcceptor> {
    let certs = CertificateDer::pem_file_iter(&paths.cert)
        .and_then(|certs| certs.collect::<Result<Vec<_>, _>>())
        .map_err(|e| anyhow!("invalid certificate file: {e:?}"))
        .with_context(|| format!("loading {}", paths.cert.display()))?;
    if certs.is_empty() {
        return Err(anyhow!("no certificate found in {}", paths.cert.display()));
    }

    let key = PrivateKeyDer::from_pem_file(&paths.key)
        .map_err(|e| anyhow!("invalid private key: {e:?}"))
        .with_context(|| format!("loading {}", paths.key.display()))?;

    let config = ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| anyhow!("failed to select protocol versions: {e:?}"))?
    .with_no_client_auth()
    .with_single_cert(certs, key)
    .map_err(|e| anyhow!("failed to set server cert pair: {e:?}"))?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}
