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

use crate::body::SignableBody;
use crate::canonical::{encode_query, CanonicalHeaders, CanonicalRequest};
use crate::constants::{
    X_AMZ_ALGORITHM_QUERY, X_AMZ_CONTENT_SHA_256, X_AMZ_CREDENTIAL_QUERY, X_AMZ_DATE,
    X_AMZ_DATE_QUERY, X_AMZ_EXPIRES_QUERY, X_AMZ_REGION_SET, X_AMZ_REGION_SET_QUERY,
    X_AMZ_SECURITY_TOKEN, X_AMZ_SECURITY_TOKEN_QUERY, X_AMZ_SIGNATURE_QUERY,
    X_AMZ_SIGNED_HEADERS_QUERY,
};
use crate::key::SigningKeyCache;
use crate::params::{SigningParams, SigningRegion};
use crate::scope::CredentialScope;
use crate::v4a;
use crate::Credential;
use async_trait::async_trait;
use awsign_core::hash::hex_hmac_sha256;
use awsign_core::time::{format_iso8601, DateTime};
use awsign_core::{Context, Error, Result, SignRequest, SigningMethod, SigningRequest};
use http::request::Parts;
use http::{header, HeaderValue};
use log::debug;
use std::sync::Arc;
use std::time::Duration;

/// RequestSigner that implements AWS SigV4 and SigV4a.
///
/// The algorithm follows the [`SigningParams`]: a single region signs with
/// `AWS4-HMAC-SHA256`, a region set with `AWS4-ECDSA-P256-SHA256`.
///
/// - [Signature Version 4 signing process](https://docs.aws.amazon.com/general/latest/gr/signature-version-4.html)
/// - [Authenticating requests: using query parameters](https://docs.aws.amazon.com/AmazonS3/latest/API/sigv4-query-string-auth.html)
#[derive(Debug, Clone)]
pub struct RequestSigner {
    params: SigningParams,
    key_cache: Arc<SigningKeyCache>,
}

impl RequestSigner {
    /// Create a signer with its own signing key cache.
    pub fn new(params: SigningParams) -> Self {
        Self {
            params,
            key_cache: Arc::new(SigningKeyCache::default()),
        }
    }

    /// Share a signing key cache with other signers.
    pub fn with_key_cache(mut self, cache: Arc<SigningKeyCache>) -> Self {
        self.key_cache = cache;
        self
    }

    /// Signing params of this signer.
    pub fn params(&self) -> &SigningParams {
        &self.params
    }

    /// Sign the request with an `Authorization` header.
    pub fn sign(
        &self,
        req: &mut Parts,
        credential: &Credential,
        body: &SignableBody<'_>,
    ) -> Result<()> {
        self.sign_parts(req, Some(credential), body, SigningMethod::Header)
    }

    /// Sign the request into its query string, valid for `expires_in`.
    pub fn presign(
        &self,
        req: &mut Parts,
        credential: &Credential,
        body: &SignableBody<'_>,
        expires_in: Duration,
    ) -> Result<()> {
        self.sign_parts(
            req,
            Some(credential),
            body,
            SigningMethod::Query(expires_in),
        )
    }

    fn sign_parts(
        &self,
        req: &mut Parts,
        credential: Option<&Credential>,
        body: &SignableBody<'_>,
        method: SigningMethod,
    ) -> Result<()> {
        let Some(cred) = credential else {
            return Err(Error::config_invalid("credential is required for signing"));
        };
        if cred.access_key_id.is_empty() || cred.secret_access_key.is_empty() {
            return Err(Error::credential_invalid(
                "access key id and secret access key must not be empty",
            ));
        }
        if let SigningMethod::Query(expires_in) = method {
            self.params.validate_expiration(expires_in)?;
        }

        let now = self.params.signing_time();
        let scope = self.params.scope(now);
        let algorithm = self.params.algorithm();
        let payload_hash = body.payload_hash();
        debug!("calculated scope: {scope}");

        let mut signed_req = SigningRequest::build(req)?;

        // canonicalize headers
        if signed_req.headers.get(header::HOST).is_none() {
            let host = HeaderValue::from_str(signed_req.host_header_value())?;
            signed_req.headers.insert(header::HOST, host);
        }
        match method {
            SigningMethod::Header => {
                // A previous signature must never be signed again.
                signed_req.headers.remove(header::AUTHORIZATION);
                self.canonicalize_header(&mut signed_req, cred, now, &payload_hash)?;
            }
            SigningMethod::Query(_) => {}
        }
        let headers = CanonicalHeaders::from_headers(&signed_req.headers)?;

        // canonicalize query
        if let SigningMethod::Query(expires_in) = method {
            self.canonicalize_query(&mut signed_req, cred, now, &scope, &headers, expires_in);
        }
        signed_req.query = encode_query(&signed_req.query);

        let creq = CanonicalRequest::new(
            &signed_req.method,
            &signed_req.path,
            &signed_req.query,
            headers,
            self.params.uri_encoding(),
            &payload_hash,
        );

        let string_to_sign = string_to_sign(algorithm, now, &scope, &creq.hashed());
        debug!("calculated string to sign: {string_to_sign}");

        let signature = self.calculate_signature(cred, &scope, &string_to_sign)?;

        match method {
            SigningMethod::Header => {
                let mut authorization = HeaderValue::from_str(&format!(
                    "{algorithm} Credential={}/{scope}, SignedHeaders={}, Signature={signature}",
                    cred.access_key_id,
                    creq.headers().signed_headers(),
                ))?;
                authorization.set_sensitive(true);
                signed_req
                    .headers
                    .insert(header::AUTHORIZATION, authorization);
            }
            SigningMethod::Query(_) => {
                // Hex digits need no escaping.
                signed_req
                    .query
                    .push((X_AMZ_SIGNATURE_QUERY.to_string(), signature));
            }
        }

        signed_req.apply(req)
    }

    fn canonicalize_header(
        &self,
        req: &mut SigningRequest,
        cred: &Credential,
        now: DateTime,
        payload_hash: &str,
    ) -> Result<()> {
        req.headers
            .insert(X_AMZ_DATE, HeaderValue::try_from(format_iso8601(now))?);

        if let Some(token) = &cred.session_token {
            let mut value = HeaderValue::from_str(token)?;
            // Set token value sensitive to avoid leaking.
            value.set_sensitive(true);
            req.headers.insert(X_AMZ_SECURITY_TOKEN, value);
        }

        if self.params.content_sha256_header() {
            req.headers
                .insert(X_AMZ_CONTENT_SHA_256, HeaderValue::from_str(payload_hash)?);
        }

        if let SigningRegion::RegionSet(set) = self.params.region() {
            req.headers
                .insert(X_AMZ_REGION_SET, HeaderValue::from_str(&set.to_string())?);
        }

        Ok(())
    }

    fn canonicalize_query(
        &self,
        req: &mut SigningRequest,
        cred: &Credential,
        now: DateTime,
        scope: &CredentialScope,
        headers: &CanonicalHeaders,
        expires_in: Duration,
    ) {
        req.query_push(X_AMZ_ALGORITHM_QUERY, self.params.algorithm());
        req.query_push(
            X_AMZ_CREDENTIAL_QUERY,
            format!("{}/{scope}", cred.access_key_id),
        );
        req.query_push(X_AMZ_DATE_QUERY, format_iso8601(now));
        req.query_push(X_AMZ_EXPIRES_QUERY, expires_in.as_secs().to_string());
        req.query_push(X_AMZ_SIGNED_HEADERS_QUERY, headers.signed_headers());

        if let Some(token) = &cred.session_token {
            req.query_push(X_AMZ_SECURITY_TOKEN_QUERY, token.as_str());
        }
        if let SigningRegion::RegionSet(set) = self.params.region() {
            req.query_push(X_AMZ_REGION_SET_QUERY, set.to_string());
        }
    }

    fn calculate_signature(
        &self,
        cred: &Credential,
        scope: &CredentialScope,
        string_to_sign: &str,
    ) -> Result<String> {
        match self.params.region() {
            SigningRegion::Region(_) => {
                let key = self
                    .key_cache
                    .signing_key(&cred.secret_access_key, scope);
                Ok(hex_hmac_sha256(&key, string_to_sign.as_bytes()))
            }
            SigningRegion::RegionSet(_) => {
                let key = self
                    .key_cache
                    .ecdsa_key(&cred.access_key_id, &cred.secret_access_key)?;
                Ok(v4a::sign(&key, string_to_sign))
            }
        }
    }
}

/// Build the string to sign.
///
/// ```text
/// AWS4-HMAC-SHA256
/// 20220313T072004Z
/// 20220313/<region>/<service>/aws4_request
/// <hashed_canonical_request>
/// ```
pub fn string_to_sign(
    algorithm: &str,
    time: DateTime,
    scope: &CredentialScope,
    hashed_canonical_request: &str,
) -> String {
    format!(
        "{algorithm}\n{}\n{scope}\n{hashed_canonical_request}",
        format_iso8601(time)
    )
}

#[async_trait]
impl SignRequest for RequestSigner {
    type Credential = Credential;

    /// Signs with the payload hash found in `x-amz-content-sha256`, falling
    /// back to `UNSIGNED-PAYLOAD`.
    async fn sign_request(
        &self,
        _: &Context,
        req: &mut Parts,
        credential: Option<&Self::Credential>,
        expires_in: Option<Duration>,
    ) -> Result<()> {
        let body = match req.headers.get(X_AMZ_CONTENT_SHA_256) {
            Some(v) => SignableBody::Precomputed(v.to_str()?.to_string()),
            None => SignableBody::UnsignedPayload,
        };

        self.sign_parts(req, credential, &body, SigningMethod::from(expires_in))
    }
}
