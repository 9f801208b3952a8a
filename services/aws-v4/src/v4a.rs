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

//! SigV4a signature primitives over ECDSA P-256.
//!
//! Keys come from [`generate_ecdsa_key`](crate::generate_ecdsa_key).

use awsign_core::{Error, Result};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};

/// ECDSA P-256 SHA-256 signature of `string_to_sign`, as hex encoded DER.
///
/// Nonces follow RFC 6979, so the same key and input always give the same
/// signature.
pub fn sign(key: &SigningKey, string_to_sign: &str) -> String {
    let signature: Signature = key.sign(string_to_sign.as_bytes());
    hex::encode(signature.to_der().as_bytes())
}

/// Check a hex encoded DER signature produced by [`sign`].
pub fn verify(key: &VerifyingKey, string_to_sign: &str, signature: &str) -> Result<()> {
    let der = hex::decode(signature)
        .map_err(|e| Error::request_invalid("signature is not valid hex").with_source(e))?;
    let signature = Signature::from_der(&der)
        .map_err(|e| Error::request_invalid("signature is not valid DER").with_source(e))?;
    key.verify(string_to_sign.as_bytes(), &signature)
        .map_err(|e| Error::credential_invalid("signature does not match").with_source(e))
}
