//! Constellation Channels - Client channel factories
//!
//! Turns a service contract description and a transport binding into an
//! opened channel factory. The contract decides which channel shape is
//! needed (duplex, one-way output, or request/reply, each with or without a
//! session), the binding reports which shapes it can build, and
//! [`ChannelFactory`] owns the built handle through its open/close lifecycle.
//!
//! # Example
//!
//! ```no_run
//! use constellation_channels::{Channel, ChannelFactory, EndpointAddress, TcpBinding};
//! use constellation_core::{ContractDescription, OperationDescription, SessionMode};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let contract = ContractDescription::builder("Notifications")
//!     .operation(OperationDescription::new("Publish").one_way())
//!     .session_mode(SessionMode::Allowed)
//!     .build()?;
//! let address: EndpointAddress = "tcp://127.0.0.1:7100/notify".parse()?;
//!
//! let mut factory = ChannelFactory::with_binding(contract, TcpBinding::default(), address);
//! factory.open().await?;
//! let mut channel = factory.create_channel().await?;
//! channel.send(b"hello").await?;
//! channel.close().await?;
//! factory.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod behavior;
pub mod binding;
pub mod channel;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod factory;
pub mod params;
pub mod selector;
pub mod shape;

// Re-exports for convenience
pub use behavior::{BehaviorCollection, EndpointBehavior};
pub use binding::{Binding, ChannelFactoryHandle, TcpBinding};
pub use channel::Channel;
pub use config::{ClientConfiguration, ConfigurationResolver, EndpointResolver, ExtensionRegistry};
pub use endpoint::{EndpointAddress, ServiceEndpoint};
pub use error::{Error, Result};
pub use factory::{ChannelFactory, CommunicationState};
pub use params::{BindingParameterCollection, ChannelProtectionRequirements};
pub use shape::{ChannelShape, ContractShape, ShapeFamily};
