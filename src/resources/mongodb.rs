//! MongoDB Atlas binding.
//!
//! The parent stack exports the Atlas project id, the cluster id and a base
//! connection URI without credentials. Each consumer gets its own database
//! user, granted once the cluster id has resolved (the cluster must exist
//! before a user can be scoped to it), and the context receives a complete
//! connection URI built from the base URI.
//!
//! Direct consumers:
//!
//! | Env key              | Sensitive | Template attribute |
//! |----------------------|-----------|--------------------|
//! | `MONGO_URI`          | yes       | `uri`              |
//! | `MONGO_OPLOG_URI`    | yes       | `oplogUri`         |
//! | `MONGO_USER`         | no        | `user`             |
//! | `MONGO_PASSWORD`     | yes       | `password`         |
//! | `MONGO_DATABASE`     | no        | `dbName`           |
//! | `MONGO_SERVICE_USER` | no        | `serviceUser`      |
//!
//! Dependency consumers get the same keys namespaced as
//! `MONGO_DEP_<DEPENDENCY>_*`, without the oplog URI (they cannot read the
//! operational database).

use tracing::debug;

use super::{BindingRequest, BindingServices, ResourceBinder, ResourceConfig, ResourceKind};
use crate::constants::OPERATIONAL_DATABASE;
use crate::constants::export_suffix::{
    CLUSTER_ID, MONGO_URI, MONGO_URI_OPTIONS, PROJECT_ID, SERVICE_USER,
};
use crate::context::uri::{append_options, append_user_password_and_db, redact};
use crate::context::{Attributes, BindingSource, ComputeContextCollector, TemplateNamespace};
use crate::core::{BindError, Output};
use crate::credentials::{BackingResource, CredentialGrant, default_roles};

const ENV_PREFIX: &str = "MONGO";

/// Binder for `mongodb-atlas` resources.
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoDbAtlasBinder;

/// Build a consumer URI from the exported base URI and options.
fn consumer_uri(
    base_uri: &str,
    exported_options: &str,
    extra_options: Option<&str>,
    grant: &CredentialGrant,
    database: &str,
) -> Result<String, BindError> {
    let uri = append_user_password_and_db(base_uri, &grant.username, &grant.password, database)?;
    let uri = append_options(&uri, exported_options)?;
    let uri = match extra_options {
        Some(extra) => append_options(&uri, extra)?,
        None => uri,
    };
    debug!("Built connection URI {} for {}", redact(&uri), grant.username);
    Ok(uri)
}

impl ResourceBinder for MongoDbAtlasBinder {
    fn kind(&self) -> ResourceKind {
        ResourceKind::MongodbAtlas
    }

    fn export_suffixes(&self) -> &'static [&'static str] {
        &[PROJECT_ID, CLUSTER_ID, MONGO_URI, MONGO_URI_OPTIONS, SERVICE_USER]
    }

    fn bind(
        &self,
        request: &BindingRequest<'_>,
        services: &BindingServices,
    ) -> Result<Output<()>, BindError> {
        let ResourceConfig::MongodbAtlas(config) = request.config else {
            return Err(request.kind_mismatch(self.kind()));
        };

        let identifier = request.identifier()?;
        debug!("Binding MongoDB cluster '{}' into {}", identifier, request.consumer);

        let parent = request.parent;
        let project_id = services.export(parent, &identifier, PROJECT_ID, true);
        let cluster_id = services.export(parent, &identifier, CLUSTER_ID, true);
        let base_uri = services.export(parent, &identifier, MONGO_URI, true);
        let options = services.export(parent, &identifier, MONGO_URI_OPTIONS, false);
        let service_user = services.export(parent, &identifier, SERVICE_USER, false);

        let backing = BackingResource {
            identifier,
            project_id,
        };
        let grant = services.provisioner.grant(
            request.consumer,
            &backing,
            default_roles(request.consumer),
            cluster_id.unit(),
        )?;

        let bindings = MongoBindings::new(request, services.collector.clone());
        let extra_options = config.uri_options.clone();
        let database = request.consumer.database().to_string();

        Ok(grant.zip(&base_uri).zip(&options.zip(&service_user)).try_map(
            move |((grant, base_uri), (options, service_user))| {
                let uri =
                    consumer_uri(&base_uri, &options, extra_options.as_deref(), &grant, &database)?;
                let oplog_uri = if bindings.direct {
                    Some(consumer_uri(
                        &base_uri,
                        &options,
                        extra_options.as_deref(),
                        &grant,
                        OPERATIONAL_DATABASE,
                    )?)
                } else {
                    None
                };
                bindings.publish(&grant, &database, uri, oplog_uri, service_user);
                Ok(())
            },
        ))
    }
}

/// Where one MongoDB binding lands in the context.
struct MongoBindings {
    collector: ComputeContextCollector,
    source: BindingSource,
    direct: bool,
    keys: MongoKeys,
    namespace: TemplateNamespace,
    entity: String,
}

struct MongoKeys {
    uri: String,
    oplog_uri: String,
    user: String,
    password: String,
    database: String,
    service_user: String,
}

impl MongoBindings {
    fn new(request: &BindingRequest<'_>, collector: ComputeContextCollector) -> Self {
        let (namespace, entity) = request.template_entity();
        Self {
            collector,
            source: request.source(),
            direct: request.is_direct(),
            keys: MongoKeys {
                uri: request.env_key(ENV_PREFIX, "URI"),
                oplog_uri: request.env_key(ENV_PREFIX, "OPLOG_URI"),
                user: request.env_key(ENV_PREFIX, "USER"),
                password: request.env_key(ENV_PREFIX, "PASSWORD"),
                database: request.env_key(ENV_PREFIX, "DATABASE"),
                service_user: request.env_key(ENV_PREFIX, "SERVICE_USER"),
            },
            namespace,
            entity,
        }
    }

    fn publish(
        &self,
        grant: &CredentialGrant,
        database: &str,
        uri: String,
        oplog_uri: Option<String>,
        service_user: String,
    ) {
        let add = |key: &str, value: &str, sensitive: bool| {
            self.collector.add_env_if_not_exists(key, value, sensitive, &self.source);
        };
        add(&self.keys.uri, &uri, true);
        add(&self.keys.user, &grant.username, false);
        add(&self.keys.password, &grant.password, true);
        add(&self.keys.database, database, false);

        let mut attributes = Attributes::from([
            ("uri".to_string(), uri),
            ("user".to_string(), grant.username.clone()),
            ("password".to_string(), grant.password.clone()),
            ("dbName".to_string(), database.to_string()),
            ("cluster".to_string(), grant.backing_resource_ref.clone()),
        ]);
        if let Some(oplog_uri) = oplog_uri {
            add(&self.keys.oplog_uri, &oplog_uri, true);
            attributes.insert("oplogUri".to_string(), oplog_uri);
        }
        if !service_user.is_empty() {
            add(&self.keys.service_user, &service_user, false);
            attributes.insert("serviceUser".to_string(), service_user);
        }
        self.collector.add_template_extension(self.namespace, &self.entity, attributes);
    }
}
