use std::any::{type_name, Any, TypeId};
use std::collections::BTreeSet;

use constellation_core::{ContractDescription, ProtectionLevel};

use crate::endpoint::ServiceEndpoint;
use crate::error::{Error, Result};

struct Parameter {
    type_id: TypeId,
    type_name: &'static str,
    value: Box<dyn Any + Send + Sync>,
}

/// Ordered set of typed parameters handed to a binding
///
/// At most one parameter per concrete type.
#[derive(Default)]
pub struct BindingParameterCollection {
    items: Vec<Parameter>,
}

impl BindingParameterCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter, rejecting a second value of the same type
    pub fn add<T: Any + Send + Sync>(&mut self, value: T) -> Result<()> {
        if self.contains::<T>() {
            return Err(Error::DuplicateParameter(type_name::<T>()));
        }
        self.items.push(Parameter {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            value: Box::new(value),
        });
        Ok(())
    }

    pub fn find<T: Any>(&self) -> Option<&T> {
        self.items
            .iter()
            .find(|p| p.type_id == TypeId::of::<T>())
            .and_then(|p| p.value.downcast_ref::<T>())
    }

    pub fn find_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.items
            .iter_mut()
            .find(|p| p.type_id == TypeId::of::<T>())
            .and_then(|p| p.value.downcast_mut::<T>())
    }

    pub fn contains<T: Any>(&self) -> bool {
        self.items.iter().any(|p| p.type_id == TypeId::of::<T>())
    }

    /// Remove and return the parameter of type `T`
    pub fn remove<T: Any>(&mut self) -> Option<T> {
        let index = self
            .items
            .iter()
            .position(|p| p.type_id == TypeId::of::<T>())?;
        self.items
            .remove(index)
            .value
            .downcast::<T>()
            .ok()
            .map(|boxed| *boxed)
    }

    /// Type names in insertion order
    pub fn type_names(&self) -> Vec<&'static str> {
        self.items.iter().map(|p| p.type_name).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl std::fmt::Debug for BindingParameterCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.type_names()).finish()
    }
}

/// Message actions that need signing or encryption, per direction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelProtectionRequirements {
    pub outgoing_signature: BTreeSet<String>,
    pub outgoing_encryption: BTreeSet<String>,
    pub incoming_signature: BTreeSet<String>,
    pub incoming_encryption: BTreeSet<String>,
}

impl ChannelProtectionRequirements {
    /// Derive requirements from a contract's operations
    ///
    /// Requests are outgoing and replies incoming, as seen by a client.
    pub fn from_contract(contract: &ContractDescription) -> Self {
        let mut requirements = Self::default();

        for op in contract.operations() {
            let level = contract.effective_protection_level(op);
            if level == ProtectionLevel::None {
                continue;
            }

            requirements
                .outgoing_signature
                .insert(op.request_action().to_string());
            if level == ProtectionLevel::EncryptAndSign {
                requirements
                    .outgoing_encryption
                    .insert(op.request_action().to_string());
            }

            if let Some(reply) = op.response_action() {
                requirements.incoming_signature.insert(reply.to_string());
                if level == ProtectionLevel::EncryptAndSign {
                    requirements.incoming_encryption.insert(reply.to_string());
                }
            }
        }

        requirements
    }

    /// Strongest protection any message needs
    pub fn required_level(&self) -> ProtectionLevel {
        if !self.outgoing_encryption.is_empty() || !self.incoming_encryption.is_empty() {
            ProtectionLevel::EncryptAndSign
        } else if !self.outgoing_signature.is_empty() || !self.incoming_signature.is_empty() {
            ProtectionLevel::Sign
        } else {
            ProtectionLevel::None
        }
    }
}

/// Build the parameter collection for an endpoint
///
/// Protection requirements come first, followed by whatever each behavior
/// contributes, in behavior order.
pub fn assemble(endpoint: &ServiceEndpoint) -> Result<BindingParameterCollection> {
    let contract = endpoint
        .contract()
        .ok_or(Error::EndpointNotResolved("contract"))?;

    let mut params = BindingParameterCollection::new();
    params.add(ChannelProtectionRequirements::from_contract(contract))?;

    for behavior in endpoint.behaviors().iter() {
        tracing::trace!(behavior = behavior.name(), "Adding behavior binding parameters");
        behavior.add_binding_parameters(endpoint, &mut params)?;
    }

    tracing::debug!(
        contract = contract.name(),
        parameters = ?params.type_names(),
        "Assembled binding parameters"
    );

    Ok(params)
}
