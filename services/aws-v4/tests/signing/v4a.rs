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

use super::{signature_of, suite_credential};
use anyhow::Result;
use awsign_aws_v4::constants::*;
use awsign_aws_v4::{
    generate_ecdsa_key, string_to_sign, v4a, CanonicalHeaders, CanonicalRequest,
    CredentialScope, RegionSet, RequestSigner, SignableBody, SigningParams, UriEncoding,
};
use awsign_core::hash::hex_sha256;
use awsign_core::time::from_timestamp;
use http::{header, Request};
use pretty_assertions::assert_eq;
use std::time::Duration;

const BODY: &[u8] = br#"{"TableName": "foo"}"#;

fn signer() -> Result<RequestSigner> {
    let _ = env_logger::builder().is_test(true).try_init();

    let params = SigningParams::new_v4a("demo", "aws-global".parse::<RegionSet>()?)?
        .with_time(from_timestamp(1596476903)?);
    Ok(RequestSigner::new(params))
}

fn request() -> Result<http::request::Parts> {
    Ok(Request::post("https://demo.us-east-1.amazonaws.com/")
        .header("x-amz-archive-description", "test  test")
        .body(())?
        .into_parts()
        .0)
}

#[test]
fn test_sigv4a_header_signing() -> Result<()> {
    let cred = suite_credential();
    let mut req = request()?;
    signer()?.sign(&mut req, &cred, &SignableBody::Bytes(BODY))?;

    assert_eq!(req.headers[X_AMZ_REGION_SET], "aws-global");
    assert_eq!(req.headers[X_AMZ_DATE], "20200803T174823Z");
    let auth = req.headers[header::AUTHORIZATION].to_str()?;
    assert!(auth.starts_with(
        "AWS4-ECDSA-P256-SHA256 Credential=AKIDEXAMPLE/20200803/aws-global/demo/aws4_request, \
         SignedHeaders=host;x-amz-archive-description;x-amz-date;x-amz-region-set, "
    ));

    // Rebuild what the service would see and check the ECDSA signature.
    let mut headers = req.headers.clone();
    headers.remove(header::AUTHORIZATION);
    let headers = CanonicalHeaders::from_headers(&headers)?;
    assert_eq!(headers.get("x-amz-archive-description"), Some("test test"));

    let payload_hash = hex_sha256(BODY);
    assert_eq!(
        payload_hash,
        "a15c8292b1d12abbbbe4148605f7872fbdf645618fee5ab0e8072a7b34f155e2"
    );
    let creq = CanonicalRequest::new(
        &req.method,
        req.uri.path(),
        &[],
        headers,
        UriEncoding::default(),
        &payload_hash,
    );
    assert!(creq
        .to_string()
        .contains("\nx-amz-archive-description:test test\n"));

    let time = from_timestamp(1596476903)?;
    let scope = CredentialScope::with_region_set(time, &"aws-global".parse::<RegionSet>()?, "demo");
    let sts = string_to_sign(AWS4_ECDSA_P256_SHA256, time, &scope, &creq.hashed());

    let key = generate_ecdsa_key(&cred.access_key_id, &cred.secret_access_key)?;
    v4a::verify(key.verifying_key(), &sts, &signature_of(&req)?)?;

    // Another credential cannot have produced it.
    let other = generate_ecdsa_key("AKIDOTHER", &cred.secret_access_key)?;
    assert!(v4a::verify(other.verifying_key(), &sts, &signature_of(&req)?).is_err());
    Ok(())
}

#[test]
fn test_sigv4a_is_deterministic() -> Result<()> {
    let signer = signer()?;
    let cred = suite_credential();

    let mut a = request()?;
    let mut b = request()?;
    signer.sign(&mut a, &cred, &SignableBody::Bytes(BODY))?;
    signer.sign(&mut b, &cred, &SignableBody::Bytes(BODY))?;
    assert_eq!(signature_of(&a)?, signature_of(&b)?);
    Ok(())
}

#[test]
fn test_sigv4a_presign() -> Result<()> {
    let set: RegionSet = "us-west-2,us-east-1".parse()?;
    let params = SigningParams::new_v4a("s3", set)?.with_time(from_timestamp(1596476903)?);
    let mut req = Request::get("https://bucket.s3.amazonaws.com/key")
        .body(())?
        .into_parts()
        .0;

    RequestSigner::new(params).presign(
        &mut req,
        &suite_credential(),
        &SignableBody::UnsignedPayload,
        Duration::from_secs(3600),
    )?;

    let query = req.uri.query().unwrap_or_default();
    assert!(query.contains("X-Amz-Algorithm=AWS4-ECDSA-P256-SHA256"));
    assert!(query.contains("X-Amz-Region-Set=us-east-1%2Cus-west-2"));
    assert!(query.contains(
        "X-Amz-Credential=AKIDEXAMPLE%2F20200803%2Fus-east-1%2Cus-west-2%2Fs3%2Faws4_request"
    ));
    assert!(req.headers.get(X_AMZ_REGION_SET).is_none());
    Ok(())
}
