//! Constellation Core - Shared service descriptions
//!
//! Plain, ahead-of-time descriptor values for service contracts and their
//! operations. Everything downstream (channel factories, bindings, behaviors)
//! reads these descriptors; nothing here inspects types at runtime.
//!
//! # Example
//!
//! ```
//! use constellation_core::{ContractDescription, OperationDescription, SessionMode};
//!
//! let contract = ContractDescription::builder("Calculator")
//!     .operation(OperationDescription::new("Add"))
//!     .operation(OperationDescription::new("Reset").one_way())
//!     .session_mode(SessionMode::Allowed)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(contract.operations().len(), 2);
//! assert!(!contract.is_duplex());
//! ```

pub mod description;
pub mod error;

// Re-exports for convenience
pub use description::{
    ContractBuilder, ContractDescription, OperationDescription, ProtectionLevel, SessionMode,
};
pub use error::{Error, Result};
