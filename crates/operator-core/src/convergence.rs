//! The convergence algorithm.
//!
//! Brings one dependent's actual cluster object into alignment with its
//! desired state, exactly once per invocation. Retry is the outer reconcile
//! loop's job (via requeue or the next delivered event), never this
//! function's.

use tracing::{debug, error, info};

use crate::cluster::ClusterClient;
use crate::dependent::DependentResource;
use crate::error::Error;

/// Fetches the dependent's underlying object and creates or updates it
/// according to the dependent's policy.
///
/// Losing a create race is not an error: if the object turns out to already
/// exist (e.g. another controller instance created it during a scheduler
/// handover), the pass reports success and the next pass observes the real
/// object.
pub async fn create_or_update(
    dep: &dyn DependentResource,
    cluster: &dyn ClusterClient,
) -> Result<(), Error> {
    let config = dep.config();
    // no-op dependent, e.g. a resource managed entirely by the user
    if !config.created && !config.updated {
        return Ok(());
    }

    let kind = config.type_name.clone();
    match dep.fetch(cluster).await {
        Err(err) if err.is_not_found() => {
            if !config.created {
                return Ok(());
            }
            let name = dep.name();
            let mut object = dep.build(false).await?;
            if config.owned {
                cluster.set_owner_reference(dep.owner(), &mut object)?;
            }
            match cluster.create(&object).await {
                Ok(()) => {
                    info!("created {} '{}'", kind, name);
                    Ok(())
                }
                Err(e) if e.is_already_exists() => {
                    debug!("{} '{}' already exists, lost create race", kind, name);
                    Ok(())
                }
                Err(e) => {
                    error!("failed to create {} '{}': {}", kind, name, e);
                    Err(e.into())
                }
            }
        }
        Err(err) => {
            error!("failed to get {} '{}': {}", kind, dep.name(), err);
            Err(err.into())
        }
        Ok(current) => {
            if !config.updated {
                // watched/read but never mutated by this controller
                return Ok(());
            }
            let outcome = dep.update(current).await?;
            if outcome.changed {
                let name = dep.name();
                if let Err(e) = cluster.update(&outcome.object).await {
                    error!("failed to update {} '{}': {}", kind, name, e);
                    return Err(e.into());
                }
                info!("updated {} '{}'", kind, name);
            }
            Ok(())
        }
    }
}
