//! AWS RDS Postgres binding.
//!
//! The parent exports the account id, the instance host and, optionally, its
//! port and master user. Each consumer gets its own login role, granted once
//! the host is known. Env keys are `POSTGRES_{HOST,PORT,USER,PASSWORD,DATABASE,URL}`
//! for direct consumers and `POSTGRES_DEP_<DEPENDENCY>_*` for dependencies;
//! template attributes are `host`, `port`, `user`, `password`, `dbName` and
//! `url`. When the parent exports its master user it is also published as
//! `POSTGRES_ROOT_USER` and `rootUser`.

use tracing::debug;

use super::{BindingRequest, BindingServices, ResourceBinder, ResourceConfig, ResourceKind};
use crate::constants::export_suffix::{HOST, PORT, PROJECT_ID, ROOT_USER};
use crate::context::Attributes;
use crate::context::uri::append_user_password_and_db;
use crate::core::{BindError, Output};
use crate::credentials::{BackingResource, ConsumerIdentity, ConsumerKind, RoleBinding};

const ENV_PREFIX: &str = "POSTGRES";
const DEFAULT_PORT: u16 = 5432;

/// Binder for `aws-rds-postgres` resources.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresBinder;

/// Postgres privileges for `consumer`.
///
/// Direct consumers own their database; dependencies may only read and write
/// the owner's tables.
pub fn postgres_roles(consumer: &ConsumerIdentity) -> Vec<RoleBinding> {
    let database = consumer.database();
    match consumer.kind {
        ConsumerKind::Direct => vec![RoleBinding::new(database, "ALL PRIVILEGES")],
        ConsumerKind::Dependency {
            ..
        } => vec![
            RoleBinding::new(database, "SELECT"),
            RoleBinding::new(database, "INSERT"),
            RoleBinding::new(database, "UPDATE"),
            RoleBinding::new(database, "DELETE"),
        ],
    }
}

fn parse_port(exported: &str, fallback: u16) -> Result<u16, BindError> {
    if exported.is_empty() {
        return Ok(fallback);
    }
    exported
        .parse()
        .map_err(|_| BindError::configuration(format!("exported port '{exported}' is not a valid port")))
}

impl ResourceBinder for PostgresBinder {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Postgres
    }

    fn export_suffixes(&self) -> &'static [&'static str] {
        &[PROJECT_ID, HOST, PORT, ROOT_USER]
    }

    fn bind(
        &self,
        request: &BindingRequest<'_>,
        services: &BindingServices,
    ) -> Result<Output<()>, BindError> {
        let ResourceConfig::Postgres(config) = request.config else {
            return Err(request.kind_mismatch(self.kind()));
        };

        let identifier = request.identifier()?;
        debug!("Binding Postgres instance '{}' into {}", identifier, request.consumer);

        let parent = request.parent;
        let project_id = services.export(parent, &identifier, PROJECT_ID, true);
        let host = services.export(parent, &identifier, HOST, true);
        let port = services.export(parent, &identifier, PORT, false);
        let root_user = services.export(parent, &identifier, ROOT_USER, false);

        let backing = BackingResource {
            identifier,
            project_id,
        };
        let grant = services.provisioner.grant(
            request.consumer,
            &backing,
            postgres_roles(request.consumer),
            host.unit(),
        )?;

        let collector = services.collector.clone();
        let source = request.source();
        let (namespace, entity) = request.template_entity();
        let keys: Vec<String> = ["HOST", "PORT", "USER", "PASSWORD", "DATABASE", "URL"]
            .into_iter()
            .map(|field| request.env_key(ENV_PREFIX, field))
            .collect();
        let root_user_key = request.env_key(ENV_PREFIX, "ROOT_USER");
        let fallback_port = config.port.unwrap_or(DEFAULT_PORT);
        let database = request.consumer.database().to_string();

        let exports = host.zip(&port).zip(&root_user);
        Ok(grant.zip(&exports).try_map(move |(grant, ((host, port), root_user))| {
            let port = parse_port(&port, fallback_port)?;
            let url = append_user_password_and_db(
                &format!("postgres://{host}:{port}"),
                &grant.username,
                &grant.password,
                &database,
            )?;

            let values = [
                (host.clone(), false),
                (port.to_string(), false),
                (grant.username.clone(), false),
                (grant.password.clone(), true),
                (database.clone(), false),
                (url.clone(), true),
            ];
            for (key, (value, sensitive)) in keys.iter().zip(values) {
                collector.add_env_if_not_exists(key, value, sensitive, &source);
            }


            let mut attributes = Attributes::from([
                ("host".to_string(), host),
                ("port".to_string(), port.to_string()),
                ("user".to_string(), grant.username),
                ("password".to_string(), grant.password),
                ("dbName".to_string(), database),
                ("url".to_string(), url),
            ]);
            if !root_user.is_empty() {
                collector.add_env_if_not_exists(&root_user_key, root_user.clone(), false, &source);
                attributes.insert("rootUser".to_string(), root_user);
            }
            collector.add_template_extension(namespace, &entity, attributes);
            Ok(())
        }))
    }
}
