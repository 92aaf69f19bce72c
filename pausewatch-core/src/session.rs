use async_trait::async_trait;

use crate::error::Error;

/// The authentication boundary the core receives from its caller: something
/// that can vend a region-scoped SDK client per service kind. Credential
/// acquisition (assume-role, profile resolution, MFA) happens on the other
/// side of this trait and is never the core's concern.
#[async_trait]
pub trait Session: Send + Sync {
    async fn ec2_client(&self, region: &str) -> Result<aws_sdk_ec2::Client, Error>;
    async fn rds_client(&self, region: &str) -> Result<aws_sdk_rds::Client, Error>;
    async fn ecs_client(&self, region: &str) -> Result<aws_sdk_ecs::Client, Error>;
    async fn autoscaling_client(&self, region: &str) -> Result<aws_sdk_autoscaling::Client, Error>;
}

/// Builds region-scoped clients from a base `aws-config` loader, caching
/// nothing itself — the driver registry is the cache layer above this.
pub struct AwsSession {
    base: aws_config::SdkConfig,
}

impl AwsSession {
    /// Loads the default provider chain (env vars, profile, IMDS, web
    /// identity) once; per-region configs are derived from it per call.
    pub async fn from_env() -> Self {
        let base = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self { base }
    }

    fn region_config(&self, region: &str) -> aws_types::SdkConfig {
        self.base
            .to_builder()
            .region(aws_types::region::Region::new(region.to_string()))
            .build()
    }
}

#[async_trait]
impl Session for AwsSession {
    async fn ec2_client(&self, region: &str) -> Result<aws_sdk_ec2::Client, Error> {
        Ok(aws_sdk_ec2::Client::new(&self.region_config(region)))
    }

    async fn rds_client(&self, region: &str) -> Result<aws_sdk_rds::Client, Error> {
        Ok(aws_sdk_rds::Client::new(&self.region_config(region)))
    }

    async fn ecs_client(&self, region: &str) -> Result<aws_sdk_ecs::Client, Error> {
        Ok(aws_sdk_ecs::Client::new(&self.region_config(region)))
    }

    async fn autoscaling_client(&self, region: &str) -> Result<aws_sdk_autoscaling::Client, Error> {
        Ok(aws_sdk_autoscaling::Client::new(&self.region_config(region)))
    }
}
