//! S3 bucket binding.
//!
//! Buckets carry no per-consumer credential: access is granted through the
//! compute stack's own IAM role, outside this crate. The binding only forwards
//! the bucket name and region.

use tracing::debug;

use super::{BindingRequest, BindingServices, ResourceBinder, ResourceConfig, ResourceKind};
use crate::constants::export_suffix::{BUCKET_NAME, REGION};
use crate::context::Attributes;
use crate::core::{BindError, Output};

const ENV_PREFIX: &str = "S3";

/// Binder for `s3-bucket` resources.
#[derive(Debug, Clone, Copy, Default)]
pub struct S3BucketBinder;

impl ResourceBinder for S3BucketBinder {
    fn kind(&self) -> ResourceKind {
        ResourceKind::S3Bucket
    }

    fn export_suffixes(&self) -> &'static [&'static str] {
        &[BUCKET_NAME, REGION]
    }

    fn bind(
        &self,
        request: &BindingRequest<'_>,
        services: &BindingServices,
    ) -> Result<Output<()>, BindError> {
        let ResourceConfig::S3Bucket(config) = request.config else {
            return Err(request.kind_mismatch(self.kind()));
        };

        let identifier = request.identifier()?;
        debug!("Binding bucket '{}' into {}", identifier, request.consumer);

        let bucket = services.export(request.parent, &identifier, BUCKET_NAME, true);
        let region = services.export(request.parent, &identifier, REGION, true);

        let collector = services.collector.clone();
        let source = request.source();
        let (namespace, entity) = request.template_entity();
        let bucket_key = request.env_key(ENV_PREFIX, "BUCKET");
        let region_key = request.env_key(ENV_PREFIX, "REGION");
        let prefix_key = request.env_key(ENV_PREFIX, "PREFIX");
        let key_prefix = config.key_prefix.clone().filter(|prefix| !prefix.is_empty());

        Ok(bucket.zip(&region).map(move |(bucket, region)| {
            collector.add_env_if_not_exists(&bucket_key, bucket.as_str(), false, &source);
            collector.add_env_if_not_exists(&region_key, region.as_str(), false, &source);

            let mut attributes = Attributes::from([
                ("bucket".to_string(), bucket),
                ("region".to_string(), region),
            ]);
            if let Some(prefix) = key_prefix {
                collector.add_env_if_not_exists(&prefix_key, prefix.as_str(), false, &source);
                attributes.insert("prefix".to_string(), prefix);
            }
            collector.add_template_extension(namespace, &entity, attributes);
        }))
    }
}
