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

use crate::constants::AWS4_REQUEST;
use awsign_core::time::{format_date, DateTime};
use awsign_core::utils::parse_comma_separated_list;
use awsign_core::{Error, Result};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// RegionSet is the set of regions a SigV4a signature is valid for.
///
/// The set is kept sorted and free of duplicates, so two sets holding the
/// same regions always serialize the same way.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegionSet(BTreeSet<String>);

impl RegionSet {
    /// Build a region set, failing when it would be empty.
    pub fn new<I, S>(regions: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = regions
            .into_iter()
            .map(Into::into)
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        if set.is_empty() {
            return Err(Error::config_invalid("region set must not be empty"));
        }
        Ok(Self(set))
    }

    /// Iterate regions in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl FromStr for RegionSet {
    type Err = Error;

    /// Parse a comma separated list such as `us-west-2, us-east-1`.
    fn from_str(s: &str) -> Result<Self> {
        Self::new(parse_comma_separated_list(s))
    }
}

impl Display for RegionSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (idx, region) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            f.write_str(region)?;
        }
        Ok(())
    }
}

/// CredentialScope narrows a derived signing key to a date, region and service.
///
/// Renders as `{date}/{region}/{service}/aws4_request`; for SigV4a the
/// canonical region set takes the place of the region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialScope {
    date: String,
    region: String,
    service: String,
}

impl CredentialScope {
    /// Scope for a SigV4 signature.
    pub fn new(time: DateTime, region: &str, service: &str) -> Self {
        Self {
            date: format_date(time),
            region: region.to_string(),
            service: service.to_string(),
        }
    }

    /// Scope for a SigV4a signature.
    pub fn with_region_set(time: DateTime, region_set: &RegionSet, service: &str) -> Self {
        Self {
            date: format_date(time),
            region: region_set.to_string(),
            service: service.to_string(),
        }
    }

    /// Signing date in `yyyyMMdd`.
    pub fn date(&self) -> &str {
        &self.date
    }

    /// Region, or the serialized region set.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Service signing name.
    pub fn service(&self) -> &str {
        &self.service
    }
}

impl Display for CredentialScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.date, self.region, self.service, AWS4_REQUEST
        )
    }
}
