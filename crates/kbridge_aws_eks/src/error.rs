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

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// DescribeCluster failed or returned incomplete data.
    #[error("cluster lookup failed for {cluster}: {reason}")]
    ClusterLookup { cluster: String, reason: String },

    /// No usable AWS credentials could be resolved.
    #[error("credential error: {0}")]
    Credential(String),

    /// The STS request could not be pre-signed.
    #[error("signing error: {0}")]
    Signing(String),
}

impl Error {
    pub(crate) fn lookup(cluster: &str, reason: impl Into<String>) -> Self {
        Self::ClusterLookup {
            cluster: cluster.to_string(),
            reason: reason.into(),
        }
    }
}
