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

use crate::constants::{AWS4_ECDSA_P256_SHA256, AWS4_REQUEST};
use crate::scope::CredentialScope;
use awsign_core::hash::{hex_sha256, hmac_sha256};
use awsign_core::{Error, LruCache, Result, DEFAULT_CACHE_CAPACITY};
use log::debug;
use p256::ecdsa::SigningKey;
use std::sync::Arc;

/// P-256 group order minus two, big-endian.
const P256_ORDER_MINUS_TWO: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xbc, 0xe6, 0xfa, 0xad, 0xa7, 0x17, 0x9e, 0x84, 0xf3, 0xb9, 0xca, 0xc2, 0xfc, 0x63, 0x25, 0x4f,
];

/// Derive the SigV4 signing key of `scope`.
///
/// `kSigning = HMAC(HMAC(HMAC(HMAC("AWS4" + secret, date), region), service), "aws4_request")`
pub fn generate_signing_key(secret: &str, scope: &CredentialScope) -> Vec<u8> {
    // Sign secret
    let secret = format!("AWS4{secret}");
    // Sign date
    let sign_date = hmac_sha256(secret.as_bytes(), scope.date().as_bytes());
    // Sign region
    let sign_region = hmac_sha256(sign_date.as_slice(), scope.region().as_bytes());
    // Sign service
    let sign_service = hmac_sha256(sign_region.as_slice(), scope.service().as_bytes());
    // Sign request
    hmac_sha256(sign_service.as_slice(), AWS4_REQUEST.as_bytes())
}

/// Derive the SigV4a private key of a credential.
///
/// NIST SP 800-108 counter mode KDF over HMAC-SHA256, retried with an
/// increasing counter byte until the candidate `c` satisfies `c <= N - 2`.
/// The private scalar is `c + 1`, which always lies in `[1, N - 1]`.
pub fn generate_ecdsa_key(access_key_id: &str, secret: &str) -> Result<SigningKey> {
    let input_key = format!("AWS4A{secret}");

    let mut fixed_input =
        Vec::with_capacity(4 + AWS4_ECDSA_P256_SHA256.len() + 1 + access_key_id.len() + 1 + 4);
    for counter in 1u8..=254 {
        fixed_input.clear();
        fixed_input.extend_from_slice(&1u32.to_be_bytes());
        fixed_input.extend_from_slice(AWS4_ECDSA_P256_SHA256.as_bytes());
        fixed_input.push(0x00);
        fixed_input.extend_from_slice(access_key_id.as_bytes());
        fixed_input.push(counter);
        fixed_input.extend_from_slice(&256u32.to_be_bytes());

        let candidate: [u8; 32] = hmac_sha256(input_key.as_bytes(), &fixed_input)
            .as_slice()
            .try_into()
            .map_err(|e| Error::unexpected("hmac output must be 32 bytes").with_source(e))?;
        // Byte-wise comparison of equal length big-endian numbers.
        if candidate > P256_ORDER_MINUS_TWO {
            continue;
        }

        let scalar = add_one(candidate);
        return SigningKey::from_bytes(&p256::FieldBytes::from(scalar)).map_err(|e| {
            Error::unexpected("derived scalar is not a valid P-256 private key").with_source(e)
        });
    }

    Err(Error::unexpected(
        "exhausted counter while deriving the SigV4a signing key",
    ))
}

fn add_one(mut n: [u8; 32]) -> [u8; 32] {
    for b in n.iter_mut().rev() {
        let (v, overflow) = b.overflowing_add(1);
        *b = v;
        if !overflow {
            break;
        }
    }
    n
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    /// Hex SHA-256 of the secret, the raw secret is never used as a key.
    secret_fingerprint: String,
    scope: String,
}

/// SigningKeyCache keeps recently derived signing keys.
///
/// SigV4 keys are keyed by secret and scope, so a new day or region is
/// simply a miss. SigV4a keys only depend on the credential.
#[derive(Debug)]
pub struct SigningKeyCache {
    v4: LruCache<CacheKey, Arc<[u8]>>,
    v4a: LruCache<CacheKey, Arc<SigningKey>>,
}

impl Default for SigningKeyCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl SigningKeyCache {
    /// Create a cache holding up to `capacity` keys of each kind.
    pub fn new(capacity: usize) -> Self {
        Self {
            v4: LruCache::new(capacity),
            v4a: LruCache::new(capacity),
        }
    }

    /// SigV4 signing key for `secret` within `scope`.
    pub fn signing_key(&self, secret: &str, scope: &CredentialScope) -> Arc<[u8]> {
        let key = CacheKey {
            secret_fingerprint: hex_sha256(secret.as_bytes()),
            scope: scope.to_string(),
        };
        self.v4.get_or_insert_with(key, |k| {
            debug!("signing key cache miss for scope {}", k.scope);
            Arc::from(generate_signing_key(secret, scope))
        })
    }

    /// SigV4a private key for the credential.
    pub fn ecdsa_key(&self, access_key_id: &str, secret: &str) -> Result<Arc<SigningKey>> {
        let key = CacheKey {
            secret_fingerprint: hex_sha256(secret.as_bytes()),
            scope: format!("{access_key_id}/{AWS4_ECDSA_P256_SHA256}"),
        };
        self.v4a.try_get_or_insert_with(key, |_| {
            debug!("ecdsa key cache miss for access key {access_key_id}");
            generate_ecdsa_key(access_key_id, secret).map(Arc::new)
        })
    }

    /// Number of cached SigV4 keys.
    pub fn len(&self) -> usize {
        self.v4.len()
    }

    /// Returns true when no SigV4 key is cached.
    pub fn is_empty(&self) -> bool {
        self.v4.is_empty()
    }
}
