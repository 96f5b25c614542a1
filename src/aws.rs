//! AWS-related code shared by different modules.

use aws_config::{BehaviorVersion, Region};

use crate::{config::AwsConfig, prelude::*};

/// Load the user's AWS configuration using standard conventions, applying any
/// region override from our own configuration.
#[instrument(level = "debug", skip_all)]
pub async fn load_aws_config(aws: &AwsConfig) -> Result<aws_config::SdkConfig> {
    let mut loader = aws_config::defaults(BehaviorVersion::v2025_01_17());
    if let Some(region) = &aws.region {
        debug!(%region, "Using configured AWS region");
        loader = loader.region(Region::new(region.clone()));
    }
    Ok(loader.load().await)
}
