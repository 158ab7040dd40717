use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use constellation_core::ContractDescription;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::behavior::{BehaviorCollection, EndpointBehavior};
use crate::binding::Binding;
use crate::error::{Error, Result};

/// Address of a remote endpoint, `scheme://host[:port][/path]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EndpointAddress {
    url: Url,
}

impl EndpointAddress {
    pub fn parse(uri: impl AsRef<str>) -> Result<Self> {
        let uri = uri.as_ref();
        let url = Url::parse(uri).map_err(|e| Error::InvalidAddress(format!("{uri}: {e}")))?;
        if url.host_str().map_or(true, str::is_empty) {
            return Err(Error::InvalidAddress(format!("{uri}: missing host")));
        }
        Ok(Self { url })
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn port(&self) -> Option<u16> {
        self.url.port()
    }

    /// The `host[:port]` part, without user info or query
    pub fn authority(&self) -> String {
        match self.url.port() {
            Some(port) => format!("{}:{port}", self.host()),
            None => self.host().to_string(),
        }
    }

    /// Path after the authority, without the leading slash
    pub fn path(&self) -> &str {
        self.url.path().trim_start_matches('/')
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

impl FromStr for EndpointAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EndpointAddress {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<EndpointAddress> for String {
    fn from(address: EndpointAddress) -> Self {
        address.url.into()
    }
}

/// Everything a channel factory needs to know about its remote endpoint
///
/// Binding and address may be filled in late (e.g. by an
/// [`EndpointResolver`](crate::config::EndpointResolver)), but contract and
/// binding must be present by the time the factory is opened.
#[derive(Clone, Default)]
pub struct ServiceEndpoint {
    contract: Option<ContractDescription>,
    binding: Option<Arc<dyn Binding>>,
    address: Option<EndpointAddress>,
    behaviors: BehaviorCollection,
}

impl ServiceEndpoint {
    pub fn new(contract: ContractDescription) -> Self {
        Self {
            contract: Some(contract),
            ..Self::default()
        }
    }

    pub fn with_binding(mut self, binding: impl Binding + 'static) -> Self {
        self.binding = Some(Arc::new(binding));
        self
    }

    pub fn with_address(mut self, address: EndpointAddress) -> Self {
        self.address = Some(address);
        self
    }

    pub fn with_behavior<B: EndpointBehavior>(mut self, behavior: B) -> Self {
        self.behaviors.push(behavior);
        self
    }

    pub fn contract(&self) -> Option<&ContractDescription> {
        self.contract.as_ref()
    }

    pub fn set_contract(&mut self, contract: ContractDescription) {
        self.contract = Some(contract);
    }

    pub fn binding(&self) -> Option<&Arc<dyn Binding>> {
        self.binding.as_ref()
    }

    pub fn set_binding(&mut self, binding: Arc<dyn Binding>) {
        self.binding = Some(binding);
    }

    pub fn address(&self) -> Option<&EndpointAddress> {
        self.address.as_ref()
    }

    pub fn set_address(&mut self, address: EndpointAddress) {
        self.address = Some(address);
    }

    pub fn behaviors(&self) -> &BehaviorCollection {
        &self.behaviors
    }

    pub fn behaviors_mut(&mut self) -> &mut BehaviorCollection {
        &mut self.behaviors
    }

    /// Contract and binding, or the first of them that is missing
    pub fn resolved(&self) -> Result<(&ContractDescription, &Arc<dyn Binding>)> {
        let contract = self
            .contract
            .as_ref()
            .ok_or(Error::EndpointNotResolved("contract"))?;
        let binding = self
            .binding
            .as_ref()
            .ok_or(Error::EndpointNotResolved("binding"))?;
        Ok((contract, binding))
    }
}

impl fmt::Debug for ServiceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceEndpoint")
            .field("contract", &self.contract.as_ref().map(|c| c.name()))
            .field("binding", &self.binding.as_ref().map(|b| b.name()))
            .field("address", &self.address)
            .field("behaviors", &self.behaviors)
            .finish()
    }
}
