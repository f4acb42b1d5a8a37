//! Integration tests for the resolution engine.
//!
//! Tests run against an in-memory store seeded with a small multi-tenant fixture.

use config_resolution::cache::CacheSettings;
use config_resolution::error::{ErrorCode, ErrorReport, ResolveError};
use config_resolution::merge::{ArrayPolicy, MergeOptions};
use config_resolution::resolver::{Resolver, ResolverOptions};
use config_resolution::store::MemoryStore;
use config_resolution::types::{Environment, Service, System, Tenant};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn system() -> System {
    serde_json::from_value(json!({
        "name": "shop",
        "architecture": "microservices",
        "defaults": {
            "runtime": "node18",
            "region": "eu-west-1",
            "tags": {"owner": "platform"},
            "replicas": 1,
            "logLevel": "info"
        }
    }))
    .unwrap()
}

fn service() -> Service {
    serde_json::from_value(json!({
        "name": "svc",
        "type": "http",
        "deployment": {"pattern": "container"},
        "dependencies": [{"name": "db", "type": "database"}],
        "replicas": 2,
        "tags": {"tier": "backend"},
        "environments": {
            "prod": {"replicas": 4, "logLevel": "warn"}
        }
    }))
    .unwrap()
}

fn environment() -> Environment {
    serde_json::from_value(json!({
        "name": "prod",
        "availability": "multi-az",
        "scaling": {"min": 2, "max": 10},
        "logLevel": "error"
    }))
    .unwrap()
}

fn tenant() -> Tenant {
    serde_json::from_value(json!({
        "id": "tenant1",
        "cloud": "aws",
        "compliance": ["soc2"],
        "region": "us-east-1",
        "environments": {
            "prod": {"scaling": {"max": 20}, "replicas": 6}
        },
        "services": {
            "svc": {"replicas": 8, "tags": {"tier": "premium"}}
        }
    }))
    .unwrap()
}

fn full_store() -> MemoryStore {
    MemoryStore::new()
        .with_system(system())
        .with_service(service())
        .with_service(Service::new("db"))
        .with_environment(environment())
        .with_tenant(tenant())
}

fn resolver(store: MemoryStore) -> Resolver<MemoryStore> {
    Resolver::new(Arc::new(store))
}

fn depends(name: &str, deps: &[&str]) -> Service {
    serde_json::from_value(json!({
        "name": name,
        "dependencies": deps.iter().map(|d| json!({"name": d})).collect::<Vec<Value>>()
    }))
    .unwrap()
}

mod service_resolution {
    use super::*;

    #[tokio::test]
    async fn provenance_lists_every_layer_in_precedence_order() {
        let resolver = resolver(full_store());

        let resolved = resolver
            .resolve_service_context("svc", Some("prod"), Some("tenant1"))
            .await
            .expect("resolution should succeed");

        assert_eq!(
            resolved.sources,
            vec![
                "system",
                "service:svc",
                "service:svc#env.prod",
                "environment:prod",
                "tenant:tenant1",
                "tenant:tenant1#env.prod",
                "tenant:tenant1#service.svc",
            ]
        );
    }

    #[tokio::test]
    async fn tenant_service_override_wins_over_every_layer() {
        let resolver = resolver(full_store());
        let resolved = resolver
            .resolve_service_context("svc", Some("prod"), Some("tenant1"))
            .await
            .unwrap();
        let service = &resolved.service;

        // replicas is set by every layer; the tenant service block is last
        assert_eq!(service["replicas"], json!(8));
        assert_eq!(service["tags"], json!({"owner": "platform", "tier": "premium"}));
        // environment document beats the service's own env block
        assert_eq!(service["logLevel"], json!("error"));
        // tenant env block merges into the environment scaling settings
        assert_eq!(service["scaling"], json!({"min": 2, "max": 20}));
        // tenant base overrides the system default region
        assert_eq!(service["region"], json!("us-east-1"));
        assert_eq!(service["runtime"], json!("node18"));
        assert_eq!(service["name"], json!("svc"));
        assert!(service.get("environments").is_none());
        assert!(service.get("services").is_none());

        assert_eq!(resolved.environment.as_ref().map(|e| e.name.as_str()), Some("prod"));
        assert_eq!(resolved.tenant.as_ref().map(|t| t.id.as_str()), Some("tenant1"));
        assert_eq!(resolved.system_defaults.as_ref().unwrap()["runtime"], json!("node18"));
    }

    #[tokio::test]
    async fn missing_optional_entities_are_omitted() {
        let store = MemoryStore::new().with_service(service()).with_service(Service::new("db"));
        let resolver = resolver(store);

        let resolved = resolver
            .resolve_service_context("svc", None, None)
            .await
            .expect("service alone should resolve");

        assert_eq!(resolved.sources, vec!["service:svc"]);
        assert!(resolved.system_defaults.is_none());
        assert!(resolved.environment.is_none());
        assert!(resolved.tenant.is_none());

        let value = serde_json::to_value(&resolved).unwrap();
        assert!(value.get("systemDefaults").is_none());
        assert!(value.get("environment").is_none());
        assert!(value.get("tenant").is_none());
        assert_eq!(value["service"]["replicas"], json!(2));
    }

    #[tokio::test]
    async fn unknown_environment_and_tenant_degrade_gracefully() {
        let resolver = resolver(full_store());
        let resolved = resolver
            .resolve_service_context("svc", Some("staging"), Some("nobody"))
            .await
            .unwrap();

        assert_eq!(resolved.sources, vec!["system", "service:svc"]);
        assert_eq!(resolved.service["replicas"], json!(2));
    }

    #[tokio::test]
    async fn service_env_block_applies_without_environment_document() {
        let store = MemoryStore::new().with_service(service()).with_service(Service::new("db"));
        let resolver = resolver(store);
        let resolved = resolver
            .resolve_service_context("svc", Some("prod"), None)
            .await
            .unwrap();

        assert_eq!(resolved.sources, vec!["service:svc", "service:svc#env.prod"]);
        assert_eq!(resolved.service["replicas"], json!(4));
        assert!(resolved.environment.is_none());
    }

    #[tokio::test]
    async fn concat_policy_appends_arrays() {
        let mut base = service();
        base.extra.insert("features".into(), json!(["a"]));
        let mut tenant = Tenant::new("t");
        tenant.services.insert("svc".into(), json!({"features": ["b"]}));
        let store = MemoryStore::new()
            .with_service(base)
            .with_service(Service::new("db"))
            .with_tenant(tenant);

        let options = ResolverOptions {
            merge: MergeOptions::default().with_array_policy(ArrayPolicy::Concat),
            cache: None,
        };
        let resolver = Resolver::with_options(Arc::new(store), options);
        let resolved = resolver
            .resolve_service_context("svc", None, Some("t"))
            .await
            .unwrap();
        assert_eq!(resolved.service["features"], json!(["a", "b"]));
    }

    #[tokio::test]
    async fn contributions_explain_winning_layers() {
        let options = ResolverOptions {
            merge: MergeOptions::default().with_provenance(),
            cache: None,
        };
        let resolver = Resolver::with_options(Arc::new(full_store()), options);
        let resolved = resolver
            .resolve_service_context("svc", Some("prod"), Some("tenant1"))
            .await
            .unwrap();

        let contributions = resolved.contributions.expect("provenance requested");
        let last_replicas = contributions
            .iter()
            .rev()
            .find(|c| c.path == "replicas")
            .map(|c| c.layer.as_str());
        assert_eq!(last_replicas, Some("tenant:tenant1#service.svc"));
        assert!(contributions.iter().all(|c| c.layer != "system"));
    }

    #[tokio::test]
    async fn resolution_is_fast() {
        let resolver = resolver(full_store());
        let started = Instant::now();
        resolver
            .resolve_service_context("svc", Some("prod"), Some("tenant1"))
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_millis(100));
    }
}

mod errors {
    use super::*;

    #[tokio::test]
    async fn missing_service_lists_known_services() {
        let resolver = resolver(full_store());
        let err = resolver
            .resolve_service_context("billing", None, None)
            .await
            .unwrap_err();

        match &err {
            ResolveError::ServiceNotFound { name, available } => {
                assert_eq!(name, "billing");
                assert_eq!(available, &vec!["db".to_string(), "svc".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.code(), ErrorCode::ServiceNotFound);
    }

    #[tokio::test]
    async fn cyclic_service_is_never_composed() {
        let store = MemoryStore::new()
            .with_service(depends("a", &["b"]))
            .with_service(depends("b", &["c"]))
            .with_service(depends("c", &["a"]));
        let resolver = resolver(store);

        let err = resolver
            .resolve_service_context("a", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::CircularDependency);
        assert_eq!(
            err.cycle(),
            Some(&["a".to_string(), "b".to_string(), "c".to_string(), "a".to_string()][..])
        );

        let report = serde_json::to_value(ErrorReport::from(&err)).unwrap();
        assert_eq!(report["code"], json!("CIRCULAR_DEPENDENCY"));
        assert_eq!(report["message"], json!("Circular dependency detected: a -> b -> c -> a"));
    }

    #[tokio::test]
    async fn self_dependency_is_rejected_like_any_cycle() {
        let store = MemoryStore::new().with_service(depends("solo", &["solo"]));
        let resolver = resolver(store);

        let err = resolver
            .resolve_service_context("solo", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.cycle(), Some(&["solo".to_string(), "solo".to_string()][..]));
    }

    #[tokio::test]
    async fn cycle_among_transitive_dependencies_blocks_resolution() {
        let store = MemoryStore::new()
            .with_service(depends("web", &["api"]))
            .with_service(depends("api", &["queue"]))
            .with_service(depends("queue", &["api"]));
        let resolver = resolver(store);

        let err = resolver
            .resolve_service_context("web", None, None)
            .await
            .unwrap_err();
        assert_eq!(
            err.cycle(),
            Some(&["api".to_string(), "queue".to_string(), "api".to_string()][..])
        );
    }

    #[tokio::test]
    async fn missing_environment_lists_known_environments() {
        let resolver = resolver(full_store());
        let err = resolver
            .resolve_environment_context("qa", None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::EnvironmentNotFound);
        assert_eq!(err.to_string(), "Environment not found: qa. Available environments: prod");
    }
}

mod environment_resolution {
    use super::*;

    #[tokio::test]
    async fn tenant_env_block_overrides_environment() {
        let resolver = resolver(full_store());
        let resolved = resolver
            .resolve_environment_context("prod", Some("tenant1"))
            .await
            .unwrap();

        assert_eq!(resolved.sources, vec!["environment:prod", "tenant:tenant1#env.prod"]);
        assert_eq!(resolved.environment["name"], json!("prod"));
        assert_eq!(resolved.environment["scaling"], json!({"min": 2, "max": 20}));
        assert_eq!(resolved.environment["replicas"], json!(6));
    }

    #[tokio::test]
    async fn environment_without_tenant() {
        let resolver = resolver(full_store());
        let resolved = resolver.resolve_environment_context("prod", None).await.unwrap();
        assert_eq!(resolved.sources, vec!["environment:prod"]);
        assert!(resolved.tenant.is_none());
    }

    #[tokio::test]
    async fn system_context_passes_through() {
        let resolver = resolver(full_store());
        let system = resolver.resolve_system_context().await.unwrap();
        assert_eq!(system.map(|s| s.name), Some("shop".to_string()));

        let empty = super::resolver(MemoryStore::new());
        assert!(empty.resolve_system_context().await.unwrap().is_none());
    }
}

mod caching {
    use super::*;

    fn cached(store: Arc<MemoryStore>, ttl: Duration) -> Resolver<MemoryStore> {
        Resolver::with_options(
            store,
            ResolverOptions {
                merge: MergeOptions::default(),
                cache: Some(CacheSettings { capacity: 16, ttl }),
            },
        )
    }

    #[tokio::test]
    async fn cached_results_survive_writes_until_bypassed() {
        let store = Arc::new(full_store());
        let resolver = cached(Arc::clone(&store), Duration::from_secs(300));

        let first = resolver.resolve_service_context("svc", None, None).await.unwrap();
        assert_eq!(first.service["replicas"], json!(2));

        let mut updated = service();
        updated.extra.insert("replicas".into(), json!(3));
        store.put_service(updated);

        let cached = resolver.resolve_service_context("svc", None, None).await.unwrap();
        assert_eq!(cached.service["replicas"], json!(2));

        let fresh = resolver
            .resolve_service_context_fresh("svc", None, None)
            .await
            .unwrap();
        assert_eq!(fresh.service["replicas"], json!(3));

        let refreshed = resolver.resolve_service_context("svc", None, None).await.unwrap();
        assert_eq!(refreshed.service["replicas"], json!(3));
    }

    #[tokio::test]
    async fn expired_entries_are_recomputed() {
        let store = Arc::new(full_store());
        let resolver = cached(Arc::clone(&store), Duration::ZERO);

        resolver.resolve_service_context("svc", None, None).await.unwrap();
        let mut updated = service();
        updated.extra.insert("replicas".into(), json!(5));
        store.put_service(updated);

        let resolved = resolver.resolve_service_context("svc", None, None).await.unwrap();
        assert_eq!(resolved.service["replicas"], json!(5));
    }

    #[tokio::test]
    async fn clear_cache_forces_recomputation() {
        let store = Arc::new(full_store());
        let resolver = cached(Arc::clone(&store), Duration::from_secs(300));

        resolver.resolve_environment_context("prod", None).await.unwrap();
        let mut updated = environment();
        updated.extra.insert("availability".into(), json!("single-az"));
        store.put_environment(updated);

        resolver.clear_cache();
        let resolved = resolver.resolve_environment_context("prod", None).await.unwrap();
        assert_eq!(resolved.environment["availability"], json!("single-az"));
    }
}
