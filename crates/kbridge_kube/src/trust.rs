//
// Copyright (c) 2025 murilo ijanc' <murilo@ijanc.org>
//
// Permission to use, copy, modify, and distribute this software for any
// purpose with or without fee is hereby granted, provided that the above
// copyright notice and this permission notice appear in all copies.
//
// THE SOFTWARE IS PROVIDED "AS IS" AND THE AUTHOR DISCLAIMS ALL WARRANTIES
// WITH REGARD TO THIS SOFTWARE INCLUDING ALL IMPLIED WARRANTIES OF
// MERCHANTABILITY AND FITNESS. IN NO EVENT SHALL THE AUTHOR BE LIABLE FOR
// ANY SPECIAL, DIRECT, INDIRECT, OR CONSEQUENTIAL DAMAGES OR ANY DAMAGES
// WHATSOEVER RESULTING FROM LOSS OF USE, DATA OR PROFITS, WHETHER IN AN
// ACTION OF CONTRACT, NEGLIGENCE OR OTHER TORTIOUS ACTION, ARISING OUT OF
// OR IN CONNECTION WITH THE USE OR PERFORMANCE OF THIS SOFTWARE.
//

//! Pins the HTTPS session to the cluster's own CA.
//!
//! The CA bundle is validated, then written to a temporary `.pem` file that
//! the generated kubeconfig points at. The file lives exactly as long as the
//! [`TlsTrust`] value and is removed when it is dropped, whatever the exit
//! path of the invocation.

use std::io::Write;
use std::path::Path;

use rustls::RootCertStore;
use rustls::pki_types::CertificateDer;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::{Error, Result};

const CERTIFICATE_TAG: &str = "CERTIFICATE";

#[derive(Debug)]
pub struct TlsTrust {
    endpoint: http::Uri,
    ca_file: NamedTempFile,
}

impl TlsTrust {
    /// Cluster endpoint, always `https`.
    pub fn endpoint(&self) -> &http::Uri {
        &self.endpoint
    }

    pub fn ca_path(&self) -> &Path {
        self.ca_file.path()
    }
}

/// Validates `ca_certificate` and materializes it for the TLS session.
///
/// Accepts PEM text with one or more `CERTIFICATE` blocks, or a single DER
/// encoded certificate. The file is created in `dir`, or in the system temp
/// directory when `None`.
pub fn resolve(
    endpoint: &http::Uri,
    ca_certificate: &[u8],
    dir: Option<&Path>,
) -> Result<TlsTrust> {
    let endpoint = normalize_endpoint(endpoint)?;
    let anchors = trust_anchors(ca_certificate)?;

    let mut builder = tempfile::Builder::new();
    builder.prefix("kbridge-ca-").suffix(".pem");
    let mut ca_file = match dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };
    ca_file.write_all(pem::encode_many(&anchors).as_bytes())?;
    ca_file.flush()?;

    debug!(
        endpoint = %endpoint,
        anchors = anchors.len(),
        "resolved cluster trust"
    );

    Ok(TlsTrust { endpoint, ca_file })
}

fn trust_anchors(ca_certificate: &[u8]) -> Result<Vec<pem::Pem>> {
    let blocks = pem::parse_many(ca_certificate)
        .map_err(|e| Error::untrusted(format!("malformed PEM: {e}")))?;

    let anchors: Vec<pem::Pem> = if blocks.is_empty() {
        // not PEM, try it as a bare DER certificate
        vec![pem::Pem::new(CERTIFICATE_TAG, ca_certificate.to_vec())]
    } else {
        blocks
            .into_iter()
            .filter(|block| block.tag() == CERTIFICATE_TAG)
            .collect()
    };

    if anchors.is_empty() {
        return Err(Error::untrusted("no certificate in CA bundle"));
    }

    let mut roots = RootCertStore::empty();
    for anchor in &anchors {
        roots
            .add(CertificateDer::from(anchor.contents().to_vec()))
            .map_err(|e| {
                Error::untrusted(format!("invalid CA certificate: {e}"))
            })?;
    }

    Ok(anchors)
}

fn normalize_endpoint(endpoint: &http::Uri) -> Result<http::Uri> {
    match endpoint.scheme_str() {
        Some("https") => Ok(endpoint.clone()),
        Some(scheme) => Err(Error::untrusted(format!(
            "endpoint scheme {scheme} is not https"
        ))),
        None => {
            let authority = endpoint
                .authority()
                .ok_or_else(|| Error::untrusted("endpoint has no host"))?;
            http::Uri::builder()
                .scheme("https")
                .authority(authority.clone())
                .path_and_query("/")
                .build()
                .map_err(|e| Error::untrusted(format!("invalid endpoint: {e}")))
        }
    }
}
