//! AWS signing with convenience constructors.

pub use awsign_aws_v4::*;

use crate::{Context, OsEnv, Result, Signer};

/// Signer with the default AWS components.
pub type DefaultSigner = Signer<Credential>;

/// Create a signer for `service` in `region`.
///
/// Credentials come from the default provider chain and configuration from
/// the process environment.
///
/// ```no_run
/// # #[tokio::main]
/// # async fn main() -> awsign_core::Result<()> {
/// let signer = awsign::aws::default_signer("dynamodb", "eu-west-1")?;
///
/// let (mut parts, _) = http::Request::post("https://dynamodb.eu-west-1.amazonaws.com/")
///     .header("x-amz-target", "DynamoDB_20120810.ListTables")
///     .body(())?
///     .into_parts();
/// signer.sign(&mut parts, None).await?;
/// # Ok(())
/// # }
/// ```
pub fn default_signer(service: &str, region: &str) -> Result<DefaultSigner> {
    let ctx = Context::new().with_env(OsEnv);
    let params = SigningParams::new(service, region)?;
    Ok(Signer::new(
        ctx,
        DefaultCredentialProvider::new(),
        RequestSigner::new(params),
    ))
}

/// Create a signer configured from the environment of `ctx`.
///
/// The auth scheme is picked among `supported` following
/// `AWS_AUTH_SCHEME_PREFERENCE`.
pub fn signer_from_env(
    ctx: Context,
    service: &str,
    supported: &[AuthScheme],
) -> Result<DefaultSigner> {
    let params = Config::from_env(&ctx).signing_params(service, supported)?;
    Ok(Signer::new(
        ctx,
        DefaultCredentialProvider::new(),
        RequestSigner::new(params),
    ))
}
