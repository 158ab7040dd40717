use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Whether a contract's channels must, may, or must not carry a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    #[default]
    NotAllowed,
    Allowed,
    Required,
}

/// Security guarantee requested for the messages of an operation
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionLevel {
    #[default]
    None,
    Sign,
    EncryptAndSign,
}

/// Description of a single contract operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDescription {
    name: String,
    action: Option<String>,
    reply_action: Option<String>,
    is_one_way: bool,
    protection_level: Option<ProtectionLevel>,
}

impl OperationDescription {
    /// Create a request/reply operation
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action: None,
            reply_action: None,
            is_one_way: false,
            protection_level: None,
        }
    }

    /// Mark the operation as one-way (no reply message)
    pub fn one_way(mut self) -> Self {
        self.is_one_way = true;
        self
    }

    /// Set the request action explicitly
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Set the reply action explicitly
    pub fn reply_action(mut self, action: impl Into<String>) -> Self {
        self.reply_action = Some(action.into());
        self
    }

    /// Override the contract's protection level for this operation
    pub fn protection_level(mut self, level: ProtectionLevel) -> Self {
        self.protection_level = Some(level);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_one_way(&self) -> bool {
        self.is_one_way
    }

    /// Action of the request message; falls back to the operation name
    pub fn request_action(&self) -> &str {
        self.action.as_deref().unwrap_or(&self.name)
    }

    /// Action of the reply message, `None` for one-way operations
    pub fn response_action(&self) -> Option<&str> {
        if self.is_one_way {
            None
        } else {
            self.reply_action.as_deref()
        }
    }

    /// Protection level declared on the operation itself, if any
    pub fn declared_protection_level(&self) -> Option<ProtectionLevel> {
        self.protection_level
    }
}

/// Description of a service contract
///
/// Built once through [`ContractBuilder`] and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractDescription {
    name: String,
    configuration_name: String,
    operations: Vec<OperationDescription>,
    callback_contract: Option<String>,
    session_mode: SessionMode,
    protection_level: Option<ProtectionLevel>,
}

impl ContractDescription {
    /// Start describing a contract
    pub fn builder(name: impl Into<String>) -> ContractBuilder {
        ContractBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name used to match client endpoint configuration entries
    pub fn configuration_name(&self) -> &str {
        &self.configuration_name
    }

    pub fn operations(&self) -> &[OperationDescription] {
        &self.operations
    }

    pub fn operation(&self, name: &str) -> Option<&OperationDescription> {
        self.operations.iter().find(|op| op.name == name)
    }

    /// Name of the callback contract, present only for duplex contracts
    pub fn callback_contract(&self) -> Option<&str> {
        self.callback_contract.as_deref()
    }

    pub fn is_duplex(&self) -> bool {
        self.callback_contract.is_some()
    }

    pub fn session_mode(&self) -> SessionMode {
        self.session_mode
    }

    pub fn protection_level(&self) -> Option<ProtectionLevel> {
        self.protection_level
    }

    /// Protection level that applies to an operation's messages
    pub fn effective_protection_level(&self, operation: &OperationDescription) -> ProtectionLevel {
        operation
            .declared_protection_level()
            .or(self.protection_level)
            .unwrap_or_default()
    }
}

/// Builder for [`ContractDescription`]
#[derive(Debug, Clone)]
pub struct ContractBuilder {
    name: String,
    configuration_name: Option<String>,
    operations: Vec<OperationDescription>,
    callback_contract: Option<String>,
    session_mode: SessionMode,
    protection_level: Option<ProtectionLevel>,
}

impl ContractBuilder {
    /// Create a new builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            configuration_name: None,
            operations: Vec::new(),
            callback_contract: None,
            session_mode: SessionMode::default(),
            protection_level: None,
        }
    }

    /// Set the configuration name (defaults to the contract name)
    pub fn configuration_name(mut self, name: impl Into<String>) -> Self {
        self.configuration_name = Some(name.into());
        self
    }

    /// Append an operation; declaration order is preserved
    pub fn operation(mut self, operation: OperationDescription) -> Self {
        self.operations.push(operation);
        self
    }

    /// Declare a callback contract, making the contract duplex
    pub fn callback_contract(mut self, name: impl Into<String>) -> Self {
        self.callback_contract = Some(name.into());
        self
    }

    /// Set the session requirement
    pub fn session_mode(mut self, mode: SessionMode) -> Self {
        self.session_mode = mode;
        self
    }

    /// Set the contract-wide protection level
    pub fn protection_level(mut self, level: ProtectionLevel) -> Self {
        self.protection_level = Some(level);
        self
    }

    /// Finish the description
    ///
    /// Missing actions are filled in as `{contract}/{operation}` and
    /// `{action}Response`.
    pub fn build(self) -> Result<ContractDescription> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidDescription(
                "contract name must not be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut operations = Vec::with_capacity(self.operations.len());
        for mut op in self.operations {
            if !seen.insert(op.name.clone()) {
                return Err(Error::DuplicateOperation {
                    contract: self.name,
                    operation: op.name,
                });
            }

            let action = op
                .action
                .take()
                .unwrap_or_else(|| format!("{}/{}", self.name, op.name));
            if !op.is_one_way && op.reply_action.is_none() {
                op.reply_action = Some(format!("{action}Response"));
            }
            op.action = Some(action);
            operations.push(op);
        }

        Ok(ContractDescription {
            configuration_name: self.configuration_name.unwrap_or_else(|| self.name.clone()),
            name: self.name,
            operations,
            callback_contract: self.callback_contract,
            session_mode: self.session_mode,
            protection_level: self.protection_level,
        })
    }
}
