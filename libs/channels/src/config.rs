//! Named client endpoint configuration
//!
//! Resolution runs before an endpoint reaches a
//! [`ChannelFactory`](crate::factory::ChannelFactory): it fills in the binding
//! and address the caller left out and applies configured behaviors.
//!
//! ```toml
//! [[endpoint]]
//! name = "primary"
//! contract = "Calculator"
//! address = "tcp://127.0.0.1:9000/calc"
//! binding = "tcp"
//! binding_configuration = "fast"
//! behavior_configuration = "audited"
//!
//! [bindings.tcp.fast]
//! open_timeout_ms = 500
//!
//! [[behaviors.audited]]
//! extension = "audit"
//! label = "calc"
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::behavior::{BehaviorEntry, EndpointBehavior};
use crate::binding::{Binding, TcpBinding};
use crate::endpoint::{EndpointAddress, ServiceEndpoint};
use crate::error::{Error, Result};

/// Matches every endpoint entry of the contract
pub const WILDCARD: &str = "*";

/// One `[[endpoint]]` entry
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EndpointElement {
    pub name: String,
    pub contract: String,
    #[serde(default)]
    pub address: Option<EndpointAddress>,
    pub binding: String,
    #[serde(default)]
    pub binding_configuration: Option<String>,
    #[serde(default)]
    pub behavior_configuration: Option<String>,
}

/// One behavior extension inside a `[[behaviors.<name>]]` list
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BehaviorElement {
    pub extension: String,
    #[serde(flatten)]
    pub settings: toml::Table,
}

/// Client section of a configuration file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ClientConfiguration {
    #[serde(default, rename = "endpoint")]
    pub endpoints: Vec<EndpointElement>,
    #[serde(default)]
    pub bindings: BTreeMap<String, BTreeMap<String, toml::Table>>,
    #[serde(default)]
    pub behaviors: BTreeMap<String, Vec<BehaviorElement>>,
}

impl ClientConfiguration {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| Error::Configuration(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// The single entry for `contract` named `name` (or any name for `*`)
    pub fn find_endpoint(&self, contract: &str, name: &str) -> Result<&EndpointElement> {
        let mut found: Option<&EndpointElement> = None;
        for element in &self.endpoints {
            if element.contract != contract || (name != WILDCARD && element.name != name) {
                continue;
            }
            if found.is_some() {
                return Err(Error::Configuration(format!(
                    "more than one endpoint matching contract {contract} was found"
                )));
            }
            found = Some(element);
        }

        found.ok_or_else(|| {
            Error::Configuration(format!(
                "client endpoint configuration '{name}' was not found in {} endpoints",
                self.endpoints.len()
            ))
        })
    }
}

type BindingConstructor = Box<dyn Fn(&toml::Table) -> Result<Arc<dyn Binding>> + Send + Sync>;
type BehaviorConstructor = Box<dyn Fn(&toml::Table) -> Result<BehaviorEntry> + Send + Sync>;

/// Named constructors for bindings and behavior extensions
#[derive(Default)]
pub struct ExtensionRegistry {
    bindings: HashMap<String, BindingConstructor>,
    behaviors: HashMap<String, BehaviorConstructor>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry knowing the built-in `tcp` binding
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_binding("tcp", TcpBinding::from_table);
        registry
    }

    pub fn register_binding<B, F>(&mut self, name: impl Into<String>, constructor: F)
    where
        B: Binding + 'static,
        F: Fn(&toml::Table) -> Result<B> + Send + Sync + 'static,
    {
        let build = move |table: &toml::Table| -> Result<Arc<dyn Binding>> {
            Ok(Arc::new(constructor(table)?))
        };
        self.bindings.insert(name.into(), Box::new(build));
    }

    pub fn register_behavior<B, F>(&mut self, name: impl Into<String>, constructor: F)
    where
        B: EndpointBehavior,
        F: Fn(&toml::Table) -> Result<B> + Send + Sync + 'static,
    {
        let build = move |table: &toml::Table| -> Result<BehaviorEntry> {
            Ok(BehaviorEntry::new(constructor(table)?))
        };
        self.behaviors.insert(name.into(), Box::new(build));
    }

    pub fn create_binding(&self, name: &str, settings: &toml::Table) -> Result<Arc<dyn Binding>> {
        let constructor = self
            .bindings
            .get(name)
            .ok_or_else(|| Error::Configuration(format!("unknown binding '{name}'")))?;
        constructor(settings)
    }

    pub fn create_behavior(&self, name: &str, settings: &toml::Table) -> Result<BehaviorEntry> {
        let constructor = self
            .behaviors
            .get(name)
            .ok_or_else(|| Error::Configuration(format!("unknown behavior extension '{name}'")))?;
        constructor(settings)
    }
}

/// Populates an endpoint from some external source by configuration name
pub trait EndpointResolver {
    fn resolve(&self, endpoint: &mut ServiceEndpoint, configuration_name: &str) -> Result<()>;
}

/// Resolves endpoints from a [`ClientConfiguration`]
pub struct ConfigurationResolver {
    configuration: ClientConfiguration,
    registry: ExtensionRegistry,
}

impl ConfigurationResolver {
    pub fn new(configuration: ClientConfiguration, registry: ExtensionRegistry) -> Self {
        Self {
            configuration,
            registry,
        }
    }

    pub fn configuration(&self) -> &ClientConfiguration {
        &self.configuration
    }

    fn binding_settings(&self, element: &EndpointElement) -> Result<toml::Table> {
        let Some(name) = element.binding_configuration.as_deref() else {
            return Ok(toml::Table::new());
        };
        self.configuration
            .bindings
            .get(&element.binding)
            .and_then(|configs| configs.get(name))
            .cloned()
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "binding configuration '{name}' for '{}' not found",
                    element.binding
                ))
            })
    }

    fn apply_behaviors(&self, endpoint: &mut ServiceEndpoint, name: &str) -> Result<()> {
        let elements = self.configuration.behaviors.get(name).ok_or_else(|| {
            Error::Configuration(format!("behavior configuration '{name}' not found"))
        })?;
        for element in elements {
            let entry = self
                .registry
                .create_behavior(&element.extension, &element.settings)?;
            endpoint.behaviors_mut().replace_entry(entry);
        }
        Ok(())
    }
}

impl EndpointResolver for ConfigurationResolver {
    fn resolve(&self, endpoint: &mut ServiceEndpoint, configuration_name: &str) -> Result<()> {
        let contract = endpoint
            .contract()
            .ok_or(Error::EndpointNotResolved("contract"))?
            .configuration_name()
            .to_string();
        let element = self
            .configuration
            .find_endpoint(&contract, configuration_name)?;

        if endpoint.binding().is_none() {
            let settings = self.binding_settings(element)?;
            let binding = self.registry.create_binding(&element.binding, &settings)?;
            endpoint.set_binding(binding);
        }
        if endpoint.address().is_none() {
            if let Some(address) = &element.address {
                endpoint.set_address(address.clone());
            }
        }
        if let Some(behaviors) = element.behavior_configuration.as_deref() {
            if !behaviors.is_empty() {
                self.apply_behaviors(endpoint, behaviors)?;
            }
        }

        tracing::debug!(
            contract = %contract,
            configuration = configuration_name,
            endpoint = %element.name,
            "Resolved endpoint configuration"
        );
        Ok(())
    }
}
