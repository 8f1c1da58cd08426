//! Unit tests for the reconciliation state machine

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use crate::cluster::{ClusterClient, ClusterError};
    use crate::error::Error;
    use crate::mock::MockCluster;
    use crate::reconciler::{PrimaryResource, Reconciler};
    use crate::registry::DependentRegistry;
    use crate::status::AggregateStatus;
    use crate::test_support::TestDependent;
    use crate::types::{self, OwnerRef, ResourceKey, TypeIdentifier};
    use crate::watches::WatchRegistry;

    /// Primary with a numeric `spec.size`, defaulted to 1 when absent and
    /// invalid when negative. Realized by a single readiness-checked gadget;
    /// a zero size makes dependent initialization fail.
    struct TestPrimary {
        raw: Value,
    }

    impl TestPrimary {
        fn size(&self) -> i64 {
            self.raw.pointer("/spec/size").and_then(Value::as_i64).unwrap_or(0)
        }

        fn set_message(&mut self, message: &str) -> bool {
            if self.status_as_string() == message {
                return false;
            }
            if !self.raw.get("status").is_some_and(Value::is_object) {
                self.raw["status"] = json!({});
            }
            self.raw["status"]["message"] = Value::String(message.to_owned());
            true
        }
    }

    #[async_trait]
    impl PrimaryResource for TestPrimary {
        fn type_id() -> TypeIdentifier {
            TypeIdentifier::new("example.com", "v1", "Parent")
        }

        fn new_empty(key: &ResourceKey) -> Self {
            Self {
                raw: types::new_object(&Self::type_id(), &key.name, &key.namespace),
            }
        }

        fn name(&self) -> String {
            types::name_of(&self.raw).unwrap_or_default().to_owned()
        }

        fn namespace(&self) -> String {
            types::namespace_of(&self.raw).unwrap_or_default().to_owned()
        }

        fn generation(&self) -> i64 {
            self.raw.pointer("/metadata/generation").and_then(Value::as_i64).unwrap_or(0)
        }

        fn owner_ref(&self) -> OwnerRef {
            OwnerRef::new(self.name(), self.namespace(), Self::type_id())
        }

        fn load(&mut self, object: Value) -> Result<(), Error> {
            self.raw = object;
            Ok(())
        }

        fn as_object(&self) -> Result<Value, Error> {
            Ok(self.raw.clone())
        }

        fn status_as_string(&self) -> String {
            self.raw
                .pointer("/status/message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned()
        }

        fn set_initial_status(&mut self, message: &str) -> bool {
            self.set_message(message)
        }

        fn provision_defaults(&mut self) -> bool {
            if self.raw.pointer("/spec/size").is_some() {
                return false;
            }
            match self.raw.get_mut("spec").and_then(Value::as_object_mut) {
                Some(spec) => {
                    spec.insert("size".into(), json!(1));
                }
                None => self.raw["spec"] = json!({ "size": 1 }),
            }
            true
        }

        fn check_validity(&self) -> Result<(), Error> {
            if self.size() < 0 {
                return Err(Error::Validation("spec.size must not be negative".into()));
            }
            Ok(())
        }

        async fn dependents(&self) -> Result<DependentRegistry, Error> {
            if self.size() == 0 {
                return Err(Error::Configuration(
                    "cannot build dependents for a zero-sized spec".into(),
                ));
            }
            let mut registry = DependentRegistry::new();
            let name = format!("{}-gadget", self.name());
            registry.add(Arc::new(TestDependent::configured(
                self.owner_ref(),
                &name,
                json!(self.size()),
                |c| c.checked_for_readiness = true,
            )));
            Ok(registry)
        }

        fn set_error_status(&mut self, err: &Error) -> bool {
            let message = format!("error: {err}");
            self.set_message(&message)
        }

        fn apply_aggregate(&mut self, aggregate: &AggregateStatus) -> bool {
            let mut changed = self.set_message(&aggregate.message);
            for update in &aggregate.fields {
                let current = self.raw.pointer(&format!("/status/{}", update.field));
                if current.and_then(Value::as_str) != Some(update.value.as_str()) {
                    self.raw["status"][update.field.clone()] = Value::String(update.value.clone());
                    changed = true;
                }
            }
            changed
        }
    }

    /// Same primary, but reconciled after deletion: cleanup leaves a
    /// tombstone object behind so tests can observe that it ran.
    struct DeletedPrimary(TestPrimary);

    #[async_trait]
    impl PrimaryResource for DeletedPrimary {
        fn type_id() -> TypeIdentifier {
            TestPrimary::type_id()
        }

        fn new_empty(key: &ResourceKey) -> Self {
            Self(TestPrimary::new_empty(key))
        }

        fn name(&self) -> String {
            self.0.name()
        }

        fn namespace(&self) -> String {
            self.0.namespace()
        }

        fn owner_ref(&self) -> OwnerRef {
            self.0.owner_ref()
        }

        fn load(&mut self, object: Value) -> Result<(), Error> {
            self.0.load(object)
        }

        fn as_object(&self) -> Result<Value, Error> {
            self.0.as_object()
        }

        fn status_as_string(&self) -> String {
            self.0.status_as_string()
        }

        fn set_initial_status(&mut self, message: &str) -> bool {
            self.0.set_initial_status(message)
        }

        fn marked_for_deletion(&self) -> bool {
            true
        }

        async fn cleanup(&mut self, cluster: &dyn ClusterClient) -> Result<(), Error> {
            let tombstone = types::new_object(
                &TypeIdentifier::new("example.com", "v1", "Tombstone"),
                &self.name(),
                &self.namespace(),
            );
            cluster.create(&tombstone).await?;
            Ok(())
        }

        async fn dependents(&self) -> Result<DependentRegistry, Error> {
            self.0.dependents().await
        }

        fn set_error_status(&mut self, err: &Error) -> bool {
            self.0.set_error_status(err)
        }

        fn apply_aggregate(&mut self, aggregate: &AggregateStatus) -> bool {
            self.0.apply_aggregate(aggregate)
        }
    }

    fn primary_object(size: Value) -> Value {
        json!({
            "apiVersion": "example.com/v1",
            "kind": "Parent",
            "metadata": {
                "name": "parent",
                "namespace": "default",
                "generation": 1,
            },
            "spec": { "size": size },
        })
    }

    fn setup() -> (MockCluster, Reconciler<TestPrimary>) {
        let cluster = MockCluster::new();
        let reconciler = Reconciler::new(Arc::new(cluster.clone()), Arc::new(WatchRegistry::new()));
        (cluster, reconciler)
    }

    fn key() -> ResourceKey {
        ResourceKey::new("parent", "default")
    }

    #[tokio::test]
    async fn absent_resource_is_a_silent_no_op() {
        let (cluster, reconciler) = setup();

        let outcome = reconciler.reconcile(&key()).await.expect("reconcile failed");
        assert!(!outcome.requeue);
        assert_eq!(cluster.create_count(), 0);
        assert_eq!(cluster.status_update_count(), 0);
    }

    #[tokio::test]
    async fn deleted_resource_runs_cleanup() {
        let cluster = MockCluster::new();
        let reconciler: Reconciler<DeletedPrimary> =
            Reconciler::new(Arc::new(cluster.clone()), Arc::new(WatchRegistry::new()));

        let outcome = reconciler.reconcile(&key()).await.expect("reconcile failed");
        assert!(!outcome.requeue);
        let tombstone = cluster.stored(
            &TypeIdentifier::new("example.com", "v1", "Tombstone"),
            "default",
            "parent",
        );
        assert!(tombstone.is_some(), "cleanup did not run");
    }

    #[tokio::test]
    async fn missing_defaults_are_provisioned_and_the_pass_stops() {
        let (cluster, reconciler) = setup();
        let mut object = primary_object(json!(1));
        object["spec"] = json!({});
        cluster.seed(object);

        let outcome = reconciler.reconcile(&key()).await.expect("reconcile failed");
        assert!(!outcome.requeue);
        assert_eq!(cluster.update_count(), 1, "defaulted spec must be persisted");
        assert_eq!(cluster.create_count(), 0, "no dependent may be converged in the same pass");
        let stored = cluster
            .stored(&TestPrimary::type_id(), "default", "parent")
            .expect("primary missing");
        assert_eq!(stored["spec"]["size"], 1);
    }

    #[tokio::test]
    async fn invalid_spec_records_an_error_and_stops() {
        let (cluster, reconciler) = setup();
        cluster.seed(primary_object(json!(-3)));

        let outcome = reconciler.reconcile(&key()).await.expect("reconcile failed");
        assert!(!outcome.requeue);
        assert_eq!(cluster.create_count(), 0);
        assert_eq!(cluster.status_update_count(), 1);
        let stored = cluster
            .stored(&TestPrimary::type_id(), "default", "parent")
            .expect("primary missing");
        let message = stored["status"]["message"].as_str().expect("status missing");
        assert!(message.contains("invalid specification"));
    }

    #[tokio::test]
    async fn happy_path_converges_and_reports_ready() {
        let (cluster, reconciler) = setup();
        cluster.seed(primary_object(json!(2)));

        let outcome = reconciler.reconcile(&key()).await.expect("reconcile failed");
        assert!(!outcome.requeue);

        let gadget = cluster
            .stored(&TestDependent::type_id(), "default", "parent-gadget")
            .expect("dependent not created");
        assert_eq!(gadget["data"], 2);
        let refs = gadget
            .pointer("/metadata/ownerReferences")
            .and_then(Value::as_array)
            .expect("owner references missing");
        assert_eq!(refs[0]["name"], "parent");

        let stored = cluster
            .stored(&TestPrimary::type_id(), "default", "parent")
            .expect("primary missing");
        assert_eq!(stored["status"]["message"], "Ready");

        let watched: Vec<String> = cluster.registered_watches().into_iter().map(|t| t.kind).collect();
        assert_eq!(watched, vec!["Gadget".to_owned()]);
    }

    #[tokio::test]
    async fn unchanged_state_suppresses_status_updates_and_watches() {
        let (cluster, reconciler) = setup();
        cluster.seed(primary_object(json!(2)));

        reconciler.reconcile(&key()).await.expect("first pass failed");
        let updates_after_first = cluster.status_update_count();

        reconciler.reconcile(&key()).await.expect("second pass failed");
        assert_eq!(
            cluster.status_update_count(),
            updates_after_first,
            "recomputing an unchanged status must not be persisted"
        );
        assert_eq!(cluster.registered_watches().len(), 1, "watch must register exactly once");
    }

    #[tokio::test]
    async fn dependent_init_failure_records_an_error_status() {
        let (cluster, reconciler) = setup();
        cluster.seed(primary_object(json!(0)));

        reconciler.reconcile(&key()).await.expect_err("init failure must surface");
        assert_eq!(cluster.create_count(), 0, "no convergence may be attempted");
        assert_eq!(cluster.status_update_count(), 1);
        let stored = cluster
            .stored(&TestPrimary::type_id(), "default", "parent")
            .expect("primary missing");
        let message = stored["status"]["message"].as_str().expect("status missing");
        assert!(message.contains("zero-sized"), "got {message}");
    }

    #[tokio::test]
    async fn failed_watch_registration_is_retried_on_the_next_pass() {
        let (cluster, reconciler) = setup();
        cluster.seed(primary_object(json!(2)));
        cluster.fail_next_register_watch(ClusterError::Api("watch channel unavailable".into()));

        reconciler.reconcile(&key()).await.expect_err("watch failure must surface");
        assert!(cluster.registered_watches().is_empty());
        let stored = cluster
            .stored(&TestPrimary::type_id(), "default", "parent")
            .expect("primary missing");
        let message = stored["status"]["message"].as_str().expect("status missing");
        assert!(message.contains("watch channel unavailable"), "got {message}");

        // same reconciler, same watch registry: the claim must have been
        // released so the retry can land the watch
        reconciler.reconcile(&key()).await.expect("retry failed");
        let watched: Vec<String> = cluster.registered_watches().into_iter().map(|t| t.kind).collect();
        assert_eq!(watched, vec!["Gadget".to_owned()]);
    }

    #[tokio::test]
    async fn convergence_failure_requeues_with_an_error_status() {
        let (cluster, reconciler) = setup();
        cluster.seed(primary_object(json!(2)));
        cluster.fail_next_create(ClusterError::Api("quota exceeded".into()));

        let outcome = reconciler.reconcile(&key()).await.expect("reconcile failed");
        assert!(outcome.requeue);
        let stored = cluster
            .stored(&TestPrimary::type_id(), "default", "parent")
            .expect("primary missing");
        let message = stored["status"]["message"].as_str().expect("status missing");
        assert!(message.contains("quota exceeded"));

        // the next pass succeeds and flips the status to ready
        let outcome = reconciler.reconcile(&key()).await.expect("retry failed");
        assert!(!outcome.requeue);
        let stored = cluster
            .stored(&TestPrimary::type_id(), "default", "parent")
            .expect("primary missing");
        assert_eq!(stored["status"]["message"], "Ready");
    }
}
