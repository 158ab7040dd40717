use std::any::{type_name, Any, TypeId};
use std::sync::Arc;

use crate::endpoint::ServiceEndpoint;
use crate::error::Result;
use crate::params::BindingParameterCollection;

/// Extension attached to an endpoint that can contribute binding parameters
///
/// Behaviors are also the extension objects returned by
/// [`ChannelFactory::property`](crate::factory::ChannelFactory::property).
pub trait EndpointBehavior: Any + Send + Sync {
    /// Name used in logs; defaults to the type name
    fn name(&self) -> &str {
        type_name::<Self>()
    }

    /// Append parameters for the binding; the default contributes nothing
    fn add_binding_parameters(
        &self,
        _endpoint: &ServiceEndpoint,
        _params: &mut BindingParameterCollection,
    ) -> Result<()> {
        Ok(())
    }
}

/// A behavior together with the type information needed to look it up
#[derive(Clone)]
pub struct BehaviorEntry {
    type_id: TypeId,
    behavior: Arc<dyn EndpointBehavior>,
    any: Arc<dyn Any + Send + Sync>,
}

impl BehaviorEntry {
    pub fn new<B: EndpointBehavior>(behavior: B) -> Self {
        let shared = Arc::new(behavior);
        Self {
            type_id: TypeId::of::<B>(),
            behavior: shared.clone(),
            any: shared,
        }
    }

    pub fn name(&self) -> &str {
        self.behavior.name()
    }

    pub fn behavior(&self) -> &dyn EndpointBehavior {
        self.behavior.as_ref()
    }

    fn downcast<B: Any>(&self) -> Option<&B> {
        self.any.downcast_ref::<B>()
    }
}

impl std::fmt::Debug for BehaviorEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered behaviors of an endpoint, looked up by concrete type
#[derive(Clone, Debug, Default)]
pub struct BehaviorCollection {
    entries: Vec<BehaviorEntry>,
}

impl BehaviorCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a behavior after the existing ones
    pub fn push<B: EndpointBehavior>(&mut self, behavior: B) {
        self.push_entry(BehaviorEntry::new(behavior));
    }

    pub fn push_entry(&mut self, entry: BehaviorEntry) {
        self.entries.push(entry);
    }

    /// Drop any behavior of the same type, then append this one
    pub fn replace<B: EndpointBehavior>(&mut self, behavior: B) {
        self.replace_entry(BehaviorEntry::new(behavior));
    }

    pub fn replace_entry(&mut self, entry: BehaviorEntry) {
        self.entries.retain(|e| e.type_id != entry.type_id);
        self.entries.push(entry);
    }

    /// Latest behavior of type `B`
    pub fn find<B: EndpointBehavior>(&self) -> Option<&B> {
        self.find_any::<B>()
    }

    pub(crate) fn find_any<T: Any>(&self) -> Option<&T> {
        self.entries
            .iter()
            .rev()
            .filter(|e| e.type_id == TypeId::of::<T>())
            .find_map(|e| e.downcast::<T>())
    }

    /// Remove every behavior of type `B`, returning how many were removed
    pub fn remove<B: EndpointBehavior>(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.type_id != TypeId::of::<B>());
        before - self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn EndpointBehavior> {
        self.entries.iter().map(BehaviorEntry::behavior)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(BehaviorEntry::name).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
