use constellation_core::{ContractDescription, SessionMode};

use crate::binding::{Binding, ChannelFactoryHandle};
use crate::endpoint::ServiceEndpoint;
use crate::error::{Error, Result};
use crate::params::{self, BindingParameterCollection};
use crate::shape::{ChannelShape, ContractShape, ShapeFamily};

/// Which member of a shape family a rule refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyMember {
    Plain,
    Sessioned,
}

impl FamilyMember {
    fn pick(self, family: ShapeFamily) -> ChannelShape {
        match self {
            FamilyMember::Plain => family.plain(),
            FamilyMember::Sessioned => family.sessioned(),
        }
    }
}

/// Members to try, in order, for each session mode
pub fn candidates(mode: SessionMode) -> &'static [FamilyMember] {
    match mode {
        SessionMode::Required => &[FamilyMember::Sessioned],
        SessionMode::Allowed => &[FamilyMember::Plain, FamilyMember::Sessioned],
        SessionMode::NotAllowed => &[FamilyMember::Plain],
    }
}

/// First shape of `family` the binding can build under `mode`
pub fn select_in_family(
    family: ShapeFamily,
    mode: SessionMode,
    binding: &dyn Binding,
    params: &BindingParameterCollection,
) -> Result<ChannelShape> {
    let mut last = family.plain();
    for member in candidates(mode) {
        let shape = member.pick(family);
        let supported = binding.can_build(shape, params);
        tracing::debug!(
            binding = binding.name(),
            %shape,
            supported,
            "Probed binding capability"
        );
        if supported {
            return Ok(shape);
        }
        last = shape;
    }

    Err(Error::ShapeNotSupported {
        shape: last,
        session_mode: mode,
    })
}

/// Decide which shape a contract needs from a binding
pub fn select_shape(
    contract: &ContractDescription,
    binding: &dyn Binding,
    params: &BindingParameterCollection,
) -> Result<ChannelShape> {
    let classification = ContractShape::classify(contract);
    tracing::debug!(
        contract = contract.name(),
        is_duplex = classification.is_duplex,
        is_one_way = classification.is_one_way,
        session_mode = ?contract.session_mode(),
        "Classified contract"
    );
    select_in_family(
        classification.family(),
        contract.session_mode(),
        binding,
        params,
    )
}

/// Result of a successful build
pub struct BuiltFactory {
    pub shape: ChannelShape,
    pub handle: Box<dyn ChannelFactoryHandle>,
    pub params: BindingParameterCollection,
}

/// Assemble parameters, select a shape and have the binding build it
pub fn select_and_build(endpoint: &ServiceEndpoint) -> Result<BuiltFactory> {
    let (contract, binding) = endpoint.resolved()?;

    let params = params::assemble(endpoint)?;
    let shape = select_shape(contract, binding.as_ref(), &params)?;
    let handle = binding.build(shape, &params)?;

    tracing::debug!(
        contract = contract.name(),
        binding = binding.name(),
        %shape,
        "Built channel factory"
    );

    Ok(BuiltFactory {
        shape,
        handle,
        params,
    })
}
