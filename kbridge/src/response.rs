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

use kbridge_kube::ProxyResponse;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifies one invocation of the bridge and carries the inbound event.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub id: String,
    pub source: String,
    pub event: Value,
}

/// What the caller gets back once the proxied call succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeResponse {
    pub invocation_id: String,
    pub invocation_source: String,
    /// Outcome of the bridge itself, upstream status is in `response`.
    pub status_code: u16,
    pub original_event: Value,
    pub response: UpstreamReply,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamReply {
    pub status: u16,
    pub data: Value,
}

impl BridgeResponse {
    pub fn new(invocation: Invocation, upstream: &ProxyResponse) -> Self {
        Self {
            invocation_id: invocation.id,
            invocation_source: invocation.source,
            status_code: 200,
            original_event: invocation.event,
            response: UpstreamReply {
                status: upstream.status,
                data: body_data(&upstream.body),
            },
        }
    }
}

/// JSON bodies are embedded as-is, anything else as text.
fn body_data(body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(body).unwrap_or_else(|_| {
        Value::String(String::from_utf8_lossy(body).into_owned())
    })
}
