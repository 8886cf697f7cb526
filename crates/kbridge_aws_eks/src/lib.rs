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

//! AWS side of the bridge: EKS cluster metadata and the IAM authenticator
//! bearer token.

pub mod cluster;
pub mod error;
pub mod token;

pub use cluster::{
    ClusterIdentity, ClusterLookup, ClusterMetadata, EksClusterLookup,
};
pub use error::{Error, Result};
pub use token::{AuthToken, SdkTokenMinter, TokenSource};

use aws_config::{BehaviorVersion, SdkConfig};
use aws_types::region::Region;

/// Loads the default AWS configuration pinned to `region`.
///
/// The returned value is owned by the caller; nothing is stored globally.
pub async fn load_sdk_config(region: &str) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await
}
