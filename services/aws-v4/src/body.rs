// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use crate::constants::UNSIGNED_PAYLOAD;
use awsign_core::hash::{hex_sha256, EMPTY_STRING_SHA256};
use std::borrow::Cow;

/// SignableBody tells the signer how to fill in the payload hash.
///
/// The signer never reads a stream: large or streaming bodies are signed
/// with a precomputed digest or with [`SignableBody::UnsignedPayload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignableBody<'a> {
    /// A fully buffered body, hashed while signing.
    Bytes(&'a [u8]),
    /// Hex encoded SHA-256 of the body, computed by the caller.
    Precomputed(String),
    /// `UNSIGNED-PAYLOAD`, typical for presigned GET and streaming uploads.
    UnsignedPayload,
    /// No body at all.
    Empty,
}

impl SignableBody<'_> {
    /// The payload hash as it appears on the last line of the canonical request.
    pub fn payload_hash(&self) -> Cow<'_, str> {
        match self {
            SignableBody::Bytes(bs) if bs.is_empty() => Cow::Borrowed(EMPTY_STRING_SHA256),
            SignableBody::Bytes(bs) => Cow::Owned(hex_sha256(bs)),
            SignableBody::Precomputed(hash) => Cow::Borrowed(hash),
            SignableBody::UnsignedPayload => Cow::Borrowed(UNSIGNED_PAYLOAD),
            SignableBody::Empty => Cow::Borrowed(EMPTY_STRING_SHA256),
        }
    }
}
