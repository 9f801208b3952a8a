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

//! AWS SigV4 and SigV4a request signing.
//!
//! ## Example
//!
//! ```no_run
//! use awsign_aws_v4::{Credential, RequestSigner, SignableBody, SigningParams};
//! use std::time::Duration;
//!
//! # fn main() -> awsign_core::Result<()> {
//! let signer = RequestSigner::new(SigningParams::new("s3", "us-east-1")?);
//! let cred = Credential::new("access_key_id", "secret_access_key");
//!
//! let (mut parts, _) = http::Request::get("https://bucket.s3.amazonaws.com/key")
//!     .body(())?
//!     .into_parts();
//! signer.presign(&mut parts, &cred, &SignableBody::UnsignedPayload, Duration::from_secs(3600))?;
//! println!("{}", parts.uri);
//! # Ok(())
//! # }
//! ```
//!
//! SigV4a is selected by building the params over a region set with
//! [`SigningParams::new_v4a`].

#![warn(missing_docs)]

mod body;
pub use body::SignableBody;

mod canonical;
pub use canonical::{
    canonical_query_string, canonical_uri, encode_query, normalize_header_value,
    CanonicalHeaders, CanonicalRequest, UriEncoding,
};

mod config;
pub use config::{AuthScheme, Config};

#[allow(missing_docs)]
pub mod constants;

mod credential;
pub use credential::Credential;

mod key;
pub use key::{generate_ecdsa_key, generate_signing_key, SigningKeyCache};

mod params;
pub use params::{SigningParams, SigningRegion};

mod provide_credential;
pub use provide_credential::*;

mod scope;
pub use scope::{CredentialScope, RegionSet};

mod sign_request;
pub use sign_request::{string_to_sign, RequestSigner};

pub mod v4a;
