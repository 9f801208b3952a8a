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

use crate::constants::*;
use crate::params::SigningParams;
use crate::scope::RegionSet;
use awsign_core::utils::parse_comma_separated_list;
use awsign_core::{Context, Error, Result};
use log::debug;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Authentication schemes a request can be signed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthScheme {
    /// `AWS4-HMAC-SHA256` over a single region.
    SigV4,
    /// `AWS4-ECDSA-P256-SHA256` over a region set.
    SigV4a,
}

impl AuthScheme {
    /// Name used in `AWS_AUTH_SCHEME_PREFERENCE`.
    pub fn name(&self) -> &'static str {
        match self {
            AuthScheme::SigV4 => "sigv4",
            AuthScheme::SigV4a => "sigv4a",
        }
    }
}

impl FromStr for AuthScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sigv4" => Ok(AuthScheme::SigV4),
            "sigv4a" => Ok(AuthScheme::SigV4a),
            v => Err(Error::config_invalid(format!("unknown auth scheme: {v}"))),
        }
    }
}

impl Display for AuthScheme {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Config for AWS request signing.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Region for SigV4, from `AWS_REGION` or `AWS_DEFAULT_REGION`.
    pub region: Option<String>,
    /// Comma separated region set for SigV4a, from `AWS_SIGV4A_SIGNING_REGION_SET`.
    pub sigv4a_signing_region_set: Option<String>,
    /// Preferred auth scheme names in order, from `AWS_AUTH_SCHEME_PREFERENCE`.
    pub auth_scheme_preference: Vec<String>,
}

impl Config {
    /// Load config from environment variables.
    pub fn from_env(ctx: &Context) -> Self {
        Self {
            region: ctx
                .env_var(AWS_REGION)
                .or_else(|| ctx.env_var(AWS_DEFAULT_REGION))
                .filter(|v| !v.trim().is_empty()),
            sigv4a_signing_region_set: ctx
                .env_var(AWS_SIGV4A_SIGNING_REGION_SET)
                .filter(|v| !v.trim().is_empty()),
            auth_scheme_preference: ctx
                .env_var(AWS_AUTH_SCHEME_PREFERENCE)
                .map(|v| parse_comma_separated_list(&v))
                .unwrap_or_default(),
        }
    }

    /// Pick the auth scheme among `supported`.
    ///
    /// The first preferred scheme that is supported wins; unknown names are
    /// skipped. Without a match the first supported scheme is used.
    pub fn resolve_auth_scheme(&self, supported: &[AuthScheme]) -> Result<AuthScheme> {
        let preferred = self
            .auth_scheme_preference
            .iter()
            .filter_map(|name| match name.parse::<AuthScheme>() {
                Ok(scheme) => Some(scheme),
                Err(err) => {
                    debug!("ignore auth scheme preference: {err}");
                    None
                }
            })
            .find(|scheme| supported.contains(scheme));

        preferred
            .or_else(|| supported.first().copied())
            .ok_or_else(|| Error::config_invalid("no supported auth scheme"))
    }

    /// Build signing params for `service` with the resolved auth scheme.
    ///
    /// SigV4a falls back to the single configured region when no region set
    /// is configured.
    pub fn signing_params(&self, service: &str, supported: &[AuthScheme]) -> Result<SigningParams> {
        match self.resolve_auth_scheme(supported)? {
            AuthScheme::SigV4 => {
                let region = self
                    .region
                    .as_deref()
                    .ok_or_else(|| Error::config_invalid("region is required for sigv4"))?;
                SigningParams::new(service, region)
            }
            AuthScheme::SigV4a => {
                let region_set = match (&self.sigv4a_signing_region_set, &self.region) {
                    (Some(set), _) => set.parse::<RegionSet>()?,
                    (None, Some(region)) => RegionSet::new([region.as_str()])?,
                    (None, None) => {
                        return Err(Error::config_invalid(
                            "region set or region is required for sigv4a",
                        ))
                    }
                };
                SigningParams::new_v4a(service, region_set)
            }
        }
    }
}
