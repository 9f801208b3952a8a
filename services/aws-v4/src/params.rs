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

use crate::canonical::UriEncoding;
use crate::constants::{
    AWS4_ECDSA_P256_SHA256, AWS4_HMAC_SHA256, MAX_PRESIGN_EXPIRATION, S3_SERVICES,
};
use crate::scope::{CredentialScope, RegionSet};
use awsign_core::time::{now, DateTime, TimeDelta};
use awsign_core::{Error, Result};
use std::time::Duration;

/// Where a signature is valid: one region (SigV4) or a region set (SigV4a).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningRegion {
    /// A single region, signed with `AWS4-HMAC-SHA256`.
    Region(String),
    /// A set of regions, signed with `AWS4-ECDSA-P256-SHA256`.
    RegionSet(RegionSet),
}

/// SigningParams holds everything besides the credential that a signature
/// depends on.
///
/// Required inputs are checked once, when the value is built:
///
/// ```
/// use awsign_aws_v4::SigningParams;
///
/// let params = SigningParams::new("s3", "us-east-1")?;
/// assert!(!params.uri_encoding().double_url_encode);
/// # Ok::<(), awsign_core::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct SigningParams {
    service: String,
    region: SigningRegion,

    time: Option<DateTime>,
    time_offset: TimeDelta,
    uri_encoding: UriEncoding,
    content_sha256_header: bool,
    max_presign_expiration: Duration,
}

impl SigningParams {
    /// Params for SigV4 signing in `region`.
    pub fn new(service: &str, region: &str) -> Result<Self> {
        if region.trim().is_empty() {
            return Err(Error::config_invalid("signing region is required"));
        }
        Self::build(service, SigningRegion::Region(region.trim().to_string()))
    }

    /// Params for SigV4a signing across `region_set`.
    pub fn new_v4a(service: &str, region_set: RegionSet) -> Result<Self> {
        Self::build(service, SigningRegion::RegionSet(region_set))
    }

    fn build(service: &str, region: SigningRegion) -> Result<Self> {
        let service = service.trim();
        if service.is_empty() {
            return Err(Error::config_invalid("signing service name is required"));
        }

        let is_s3 = S3_SERVICES.contains(&service);
        Ok(Self {
            service: service.to_string(),
            region,

            time: None,
            time_offset: TimeDelta::zero(),
            uri_encoding: UriEncoding {
                double_url_encode: !is_s3,
                normalize_path: !is_s3,
            },
            content_sha256_header: is_s3,
            max_presign_expiration: MAX_PRESIGN_EXPIRATION,
        })
    }

    /// Sign with a fixed time instead of the wall clock.
    pub fn with_time(mut self, time: DateTime) -> Self {
        self.time = Some(time);
        self
    }

    /// Add `offset` to the signing time to correct a skewed local clock.
    pub fn with_time_offset(mut self, offset: TimeDelta) -> Self {
        self.time_offset = offset;
        self
    }

    /// Encode the path a second time in the canonical URI.
    pub fn with_double_url_encode(mut self, enabled: bool) -> Self {
        self.uri_encoding.double_url_encode = enabled;
        self
    }

    /// Remove dot segments from the path before encoding.
    pub fn with_normalize_path(mut self, enabled: bool) -> Self {
        self.uri_encoding.normalize_path = enabled;
        self
    }

    /// Send the payload hash in `x-amz-content-sha256` when signing headers.
    pub fn with_content_sha256_header(mut self, enabled: bool) -> Self {
        self.content_sha256_header = enabled;
        self
    }

    /// Longest accepted lifetime of a presigned request.
    pub fn with_max_presign_expiration(mut self, max: Duration) -> Self {
        self.max_presign_expiration = max;
        self
    }

    /// Service signing name.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Signing region or region set.
    pub fn region(&self) -> &SigningRegion {
        &self.region
    }

    /// Canonical URI options.
    pub fn uri_encoding(&self) -> UriEncoding {
        self.uri_encoding
    }

    /// Whether `x-amz-content-sha256` is added in header signing.
    pub fn content_sha256_header(&self) -> bool {
        self.content_sha256_header
    }

    /// Algorithm name used in the string to sign and the authorization.
    pub fn algorithm(&self) -> &'static str {
        match self.region {
            SigningRegion::Region(_) => AWS4_HMAC_SHA256,
            SigningRegion::RegionSet(_) => AWS4_ECDSA_P256_SHA256,
        }
    }

    /// Signing time: fixed time or wall clock, plus the offset.
    pub fn signing_time(&self) -> DateTime {
        self.time.unwrap_or_else(now) + self.time_offset
    }

    /// Credential scope at `time`.
    pub fn scope(&self, time: DateTime) -> CredentialScope {
        match &self.region {
            SigningRegion::Region(region) => CredentialScope::new(time, region, &self.service),
            SigningRegion::RegionSet(set) => {
                CredentialScope::with_region_set(time, set, &self.service)
            }
        }
    }

    /// Check a presign lifetime against `(0, max]`.
    pub fn validate_expiration(&self, expires_in: Duration) -> Result<()> {
        if expires_in.as_secs() == 0 {
            return Err(Error::request_invalid(
                "presign expiration must be at least one second",
            ));
        }
        if expires_in > self.max_presign_expiration {
            return Err(Error::request_invalid(format!(
                "presign expiration {}s exceeds the maximum of {}s",
                expires_in.as_secs(),
                self.max_presign_expiration.as_secs()
            )));
        }
        Ok(())
    }
}
