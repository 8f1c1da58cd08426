//! Unit tests for dependent registry lookup and convergence ordering

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::cluster::ClusterError;
    use crate::dependent::DependentResource;
    use crate::error::Error;
    use crate::mock::MockCluster;
    use crate::registry::{DependentRegistry, TypePredicate};
    use crate::test_support::{TestDependent, owner};
    use crate::types::{OwnerRef, TypeIdentifier};

    fn registry_with(names: &[&str]) -> DependentRegistry {
        let mut registry = DependentRegistry::new();
        for name in names {
            registry.add(Arc::new(TestDependent::new(owner(), name, json!("v1"))));
        }
        registry
    }

    #[test]
    fn lookup_returns_the_single_match() {
        let registry = registry_with(&["gadget"]);
        let predicate = TypePredicate::new(TestDependent::type_id());
        let dep = registry.get(&predicate).expect("lookup failed");
        assert_eq!(dep.name(), "gadget");
    }

    #[test]
    fn lookup_fails_on_zero_matches() {
        let registry = registry_with(&["gadget"]);
        let predicate = TypePredicate::new(TypeIdentifier::core("v1", "Secret"));
        let err = registry.get(&predicate).expect_err("lookup must fail");
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("couldn't find any dependent resource"));
    }

    #[test]
    fn lookup_fails_on_multiple_matches() {
        let registry = registry_with(&["first", "second"]);
        let predicate = TypePredicate::new(TestDependent::type_id());
        let err = registry.get(&predicate).expect_err("lookup must fail");
        assert!(err.to_string().contains("found 2 dependent resources"));
    }

    #[test]
    #[should_panic(expected = "must have an owner")]
    fn registering_an_ownerless_dependent_aborts() {
        let ownerless = OwnerRef::new("", "default", TypeIdentifier::new("example.com", "v1", "Parent"));
        let mut registry = DependentRegistry::new();
        registry.add(Arc::new(TestDependent::new(ownerless, "gadget", json!("v1"))));
    }

    #[tokio::test]
    async fn converge_visits_dependents_in_registration_order() {
        let cluster = MockCluster::new();
        let registry = registry_with(&["first", "second", "third"]);

        registry.converge(&cluster).await.expect("convergence failed");

        assert_eq!(cluster.create_count(), 3);
        let stored: Vec<String> = cluster
            .registered_watches()
            .into_iter()
            .map(|t| t.kind)
            .collect();
        // watches are the reconciler's job, converge must not register any
        assert!(stored.is_empty());
        for name in ["first", "second", "third"] {
            assert!(cluster.stored(&TestDependent::type_id(), "default", name).is_some());
        }
    }

    #[tokio::test]
    async fn converge_aborts_on_first_failure() {
        let cluster = MockCluster::new();
        let registry = registry_with(&["first", "second"]);
        cluster.fail_next_create(ClusterError::Api("boom".into()));

        let err = registry.converge(&cluster).await.expect_err("failure must surface");
        match err {
            Error::Convergence { name, type_name, message } => {
                assert_eq!(name, "first");
                assert_eq!(type_name, "Gadget");
                assert!(message.contains("boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
        // the second dependent was never attempted
        assert_eq!(cluster.create_count(), 1);
        assert!(cluster.stored(&TestDependent::type_id(), "default", "second").is_none());
    }

    #[tokio::test]
    async fn fetch_updated_returns_live_state() {
        let cluster = MockCluster::new();
        let registry = registry_with(&["gadget"]);
        registry.converge(&cluster).await.expect("convergence failed");

        let predicate = TypePredicate::new(TestDependent::type_id());
        let live = registry
            .fetch_updated(&predicate, &cluster)
            .await
            .expect("fetch failed");
        assert_eq!(live["data"], "v1");
    }
}
