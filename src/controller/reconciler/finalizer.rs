//! # Finalizer Management
//!
//! Idempotent add/remove of the cleaner finalizer on any stored object.
//!
//! Both operations only touch the named finalizer; markers owned by other
//! controllers are left exactly as they were. When the finalizer set already
//! has the desired shape nothing is written.

use crate::observability::metrics;
use crate::store::{ObjectStore, StoreError};
use kube::{Resource, ResourceExt};
use tracing::info;

/// Whether `object` carries `finalizer`
pub fn has_finalizer<K: Resource>(object: &K, finalizer: &str) -> bool {
    object.finalizers().iter().any(|f| f == finalizer)
}

/// Add `finalizer` in memory; returns `false` if it was already present
pub fn add_finalizer<K: Resource>(object: &mut K, finalizer: &str) -> bool {
    if has_finalizer(object, finalizer) {
        return false;
    }
    object.finalizers_mut().push(finalizer.to_string());
    true
}

/// Remove `finalizer` in memory; returns `false` if it was not present
pub fn remove_finalizer<K: Resource>(object: &mut K, finalizer: &str) -> bool {
    let finalizers = object.finalizers_mut();
    let before = finalizers.len();
    finalizers.retain(|f| f != finalizer);
    finalizers.len() != before
}

/// Make sure `finalizer` is present on the stored object
///
/// Returns the object as it is stored afterwards.
pub async fn ensure<K>(
    store: &dyn ObjectStore<K>,
    object: &K,
    finalizer: &str,
) -> Result<K, StoreError>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    let mut updated = object.clone();
    if !add_finalizer(&mut updated, finalizer) {
        return Ok(updated);
    }

    let stored = store.update(&updated).await?;
    let kind = K::kind(&());
    metrics::increment_finalizer_operations("add", &kind);
    info!(
        kind = %kind,
        name = %object.name_any(),
        finalizer = finalizer,
        "Added finalizer to object"
    );
    Ok(stored)
}

/// Make sure `finalizer` is absent from the stored object
///
/// Returns the object as it is stored afterwards.
pub async fn remove<K>(
    store: &dyn ObjectStore<K>,
    object: &K,
    finalizer: &str,
) -> Result<K, StoreError>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    let mut updated = object.clone();
    if !remove_finalizer(&mut updated, finalizer) {
        return Ok(updated);
    }

    let stored = store.update(&updated).await?;
    let kind = K::kind(&());
    metrics::increment_finalizer_operations("remove", &kind);
    info!(
        kind = %kind,
        name = %object.name_any(),
        finalizer = finalizer,
        "Removed finalizer from object"
    );
    Ok(stored)
}
