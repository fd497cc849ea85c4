use stackbind_cli::context::{
    Attributes, BindingSource, ComputeContextCollector, TemplateNamespace, append_options,
    append_user_password_and_db, parse_connection_uri, to_env_key,
};
use stackbind_cli::templating::TemplateExtensionRegistry;
use stackbind_cli::test_utils::MONGO_BASE_URI;

fn source() -> BindingSource {
    BindingSource::new("mongodb-atlas", "mongo-main", "integrail")
}

#[test]
fn test_consumer_uri_round_trip() {
    let uri = append_user_password_and_db(MONGO_BASE_URI, "billing", "s3cr3tPassw0rd", "billing")
        .unwrap();
    let uri = append_options(&uri, "w=majority&retryWrites=false").unwrap();

    let parts = parse_connection_uri(&uri).unwrap();
    assert_eq!(parts.scheme, "mongodb+srv");
    assert_eq!(parts.hosts, vec!["cluster0.ab12c.mongodb.net"]);
    assert_eq!(parts.username, "billing");
    assert_eq!(parts.password.as_deref(), Some("s3cr3tPassw0rd"));
    assert_eq!(parts.database.as_deref(), Some("billing"));
    // Options already on the exported URI keep their value.
    assert_eq!(parts.query.as_deref(), Some("retryWrites=true&w=majority"));
}

#[test]
fn test_uri_without_host_is_rejected() {
    assert!(append_user_password_and_db("not a uri", "u", "p", "db").is_err());
    assert!(parse_connection_uri("mailto:ops@example.com").is_err());
    assert_eq!(append_options(MONGO_BASE_URI, "  ").unwrap(), MONGO_BASE_URI);
}

#[test]
fn test_env_registration_is_idempotent() {
    let collector = ComputeContextCollector::new();
    assert!(collector.add_env_if_not_exists("MONGO_DATABASE", "billing", false, &source()));
    assert!(!collector.add_env_if_not_exists("MONGO_DATABASE", "other", false, &source()));
    assert!(!collector.add_env_if_not_exists("mongo-database", "other", false, &source()));

    let context = collector.merge();
    assert_eq!(context.env.len(), 1);
    assert_eq!(context.get("MONGO_DATABASE").unwrap().value, "billing");
}

#[test]
fn test_secrets_are_split_from_plain_env() {
    let collector = ComputeContextCollector::new();
    collector.add_env("MONGO_USER", "billing", false, &source());
    collector.add_env("MONGO_PASSWORD", "s3cr3tPassw0rd", true, &source());

    let context = collector.merge();
    assert_eq!(context.plain_env().get("MONGO_USER"), Some(&"billing"));
    assert!(!context.plain_env().contains_key("MONGO_PASSWORD"));
    assert_eq!(context.secret_env().get("MONGO_PASSWORD"), Some(&"s3cr3tPassw0rd"));
    assert!(!context.to_json(false).to_string().contains("s3cr3tPassw0rd"));
}

#[test]
fn test_env_key_normalization() {
    assert_eq!(to_env_key("mongo-dep.billing db"), "MONGO_DEP_BILLING_DB");
    assert_eq!(to_env_key("MONGO_URI"), "MONGO_URI");
}

#[test]
fn test_render_document_with_known_and_foreign_tokens() {
    let collector = ComputeContextCollector::new();
    collector.add_template_extension(
        TemplateNamespace::Resource,
        "mongo-main",
        Attributes::from([
            ("dbName".to_string(), "billing".to_string()),
            ("user".to_string(), "billing".to_string()),
        ]),
    );
    collector.add_template_extension(
        TemplateNamespace::Dependency,
        "billing-db",
        Attributes::from([("dbName".to_string(), "billing".to_string())]),
    );
    let registry = TemplateExtensionRegistry::from_context(&collector.merge());

    let document = "db: ${resource:mongo-main.dbName}\n\
                    reports: ${dependency:billing-db.dbName}\n\
                    cache: ${resource:redis.uri}\n\
                    region: ${env:AWS_REGION.value}\n\
                    raw: $HOME\n";
    let rendered = registry.render(document);

    assert_eq!(
        rendered,
        "db: billing\n\
         reports: billing\n\
         cache: ${resource:redis.uri}\n\
         region: ${env:AWS_REGION.value}\n\
         raw: $HOME\n"
    );
    assert_eq!(
        registry.lookup(TemplateNamespace::Dependency, "billing-db", "dbName"),
        Some("billing")
    );
    assert_eq!(registry.resolve("prefix ${resource:mongo-main.user}"), "prefix ${resource:mongo-main.user}");
}
