//! Unit tests for status aggregation

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::dependent::DependentResource;
    use crate::mock::MockCluster;
    use crate::registry::DependentRegistry;
    use crate::status::{WAITING_PREFIX, compute_status};
    use crate::test_support::{TestDependent, owner};

    fn checked(name: &str) -> Arc<TestDependent> {
        Arc::new(TestDependent::configured(owner(), name, json!("v1"), |c| {
            c.checked_for_readiness = true;
        }))
    }

    #[tokio::test]
    async fn all_ready_yields_ready_without_requeue() {
        let cluster = MockCluster::new();
        let mut registry = DependentRegistry::new();
        registry.add(checked("first"));
        registry.add(checked("second"));
        registry.converge(&cluster).await.expect("convergence failed");

        let aggregate = compute_status(&registry, &cluster).await;
        assert!(aggregate.ready);
        assert!(!aggregate.requeue);
        assert_eq!(aggregate.message, "Ready");
    }

    #[tokio::test]
    async fn missing_dependents_yield_waiting_message_in_order() {
        let cluster = MockCluster::new();
        let mut registry = DependentRegistry::new();
        registry.add(checked("first"));
        registry.add(checked("second"));
        // nothing converged, both fetches come back not-found

        let aggregate = compute_status(&registry, &cluster).await;
        assert!(!aggregate.ready);
        assert!(aggregate.requeue);
        assert!(aggregate.message.starts_with(WAITING_PREFIX));
        let first = aggregate.message.find("first =>").expect("first missing");
        let second = aggregate.message.find("second =>").expect("second missing");
        assert!(first < second, "not-ready entries must keep registration order");
        assert!(aggregate.message.contains(" / "));
        assert!(aggregate.fields.is_empty());
    }

    #[tokio::test]
    async fn recomputation_over_unchanged_state_is_deterministic() {
        let cluster = MockCluster::new();
        let mut registry = DependentRegistry::new();
        registry.add(checked("first"));
        registry.add(checked("second"));

        let once = compute_status(&registry, &cluster).await;
        let twice = compute_status(&registry, &cluster).await;
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn unchecked_dependents_do_not_gate_readiness() {
        let cluster = MockCluster::new();
        let mut registry = DependentRegistry::new();
        // not checked for readiness and absent from the cluster
        registry.add(Arc::new(TestDependent::new(owner(), "silent", json!("v1"))));

        let aggregate = compute_status(&registry, &cluster).await;
        assert!(aggregate.ready);
    }

    #[tokio::test]
    async fn ready_dependents_publish_their_status_fields() {
        let cluster = MockCluster::new();
        let mut registry = DependentRegistry::new();
        registry.add(Arc::new(TestDependent::configured(owner(), "creds", json!("v1"), |c| {
            c.checked_for_readiness = true;
            c.owner_status_field = "podName".into();
        })));
        registry.converge(&cluster).await.expect("convergence failed");

        let aggregate = compute_status(&registry, &cluster).await;
        assert!(aggregate.ready);
        assert_eq!(aggregate.fields.len(), 1);
        assert_eq!(aggregate.fields[0].field, "podName");
        assert_eq!(aggregate.fields[0].value, "creds");
    }

    #[tokio::test]
    async fn fields_are_withheld_while_anything_waits() {
        let cluster = MockCluster::new();
        let mut registry = DependentRegistry::new();
        registry.add(Arc::new(TestDependent::configured(owner(), "creds", json!("v1"), |c| {
            c.checked_for_readiness = true;
            c.owner_status_field = "podName".into();
        })));
        registry.add(checked("missing"));
        // converge only the first dependent by seeding it directly
        let dep = TestDependent::configured(owner(), "creds", json!("v1"), |_| {});
        let object = dep.build(false).await.expect("build failed");
        cluster.seed(object);

        let aggregate = compute_status(&registry, &cluster).await;
        assert!(!aggregate.ready);
        assert!(aggregate.fields.is_empty());
    }
}
