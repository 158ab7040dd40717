use std::any::Any;
use std::sync::Arc;

use constellation_core::ContractDescription;

use crate::binding::{Binding, ChannelFactoryHandle};
use crate::channel::Channel;
use crate::config::EndpointResolver;
use crate::endpoint::{EndpointAddress, ServiceEndpoint};
use crate::error::{Error, Result};
use crate::params::BindingParameterCollection;
use crate::selector::{self, BuiltFactory};
use crate::shape::ChannelShape;

/// Lifecycle state of a [`ChannelFactory`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CommunicationState {
    #[default]
    Created,
    Opening,
    Opened,
    Closing,
    Closed,
    Faulted,
}

impl CommunicationState {
    /// `Closed` and `Faulted` are never left
    pub fn is_terminal(self) -> bool {
        matches!(self, CommunicationState::Closed | CommunicationState::Faulted)
    }
}

/// Client-side channel factory for one service endpoint
///
/// The underlying binding factory is built lazily, at most once, on the first
/// open. Transitions take `&mut self`; callers sharing an instance must
/// serialize them.
///
/// ```no_run
/// use constellation_channels::{Channel, ChannelFactory, EndpointAddress, TcpBinding};
/// use constellation_core::{ContractDescription, OperationDescription};
///
/// # async fn example() -> constellation_channels::Result<()> {
/// let contract = ContractDescription::builder("Echo")
///     .operation(OperationDescription::new("Echo"))
///     .build()?;
/// let address = EndpointAddress::parse("tcp://127.0.0.1:7000/echo")?;
///
/// let mut factory = ChannelFactory::with_binding(contract, TcpBinding::default(), address);
/// let mut channel = factory.create_channel().await?;
/// channel.send(b"ping").await?;
/// let _reply = channel.receive().await?;
/// factory.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct ChannelFactory {
    endpoint: ServiceEndpoint,
    state: CommunicationState,
    handle: Option<Box<dyn ChannelFactoryHandle>>,
    shape: Option<ChannelShape>,
    params: Option<BindingParameterCollection>,
}

impl ChannelFactory {
    /// Create a factory for an already populated endpoint
    pub fn new(endpoint: ServiceEndpoint) -> Self {
        Self {
            endpoint,
            state: CommunicationState::Created,
            handle: None,
            shape: None,
            params: None,
        }
    }

    /// Create a factory from a contract, binding and address
    pub fn with_binding(
        contract: ContractDescription,
        binding: impl Binding + 'static,
        address: EndpointAddress,
    ) -> Self {
        Self::new(
            ServiceEndpoint::new(contract)
                .with_binding(binding)
                .with_address(address),
        )
    }

    /// Create a factory whose binding (and address, unless given) come from
    /// named endpoint configuration
    pub fn from_configuration(
        contract: ContractDescription,
        configuration_name: &str,
        address: Option<EndpointAddress>,
        resolver: &dyn EndpointResolver,
    ) -> Result<Self> {
        let mut endpoint = ServiceEndpoint::new(contract);
        if let Some(address) = address {
            endpoint.set_address(address);
        }
        resolver.resolve(&mut endpoint, configuration_name)?;
        Ok(Self::new(endpoint))
    }

    pub fn endpoint(&self) -> &ServiceEndpoint {
        &self.endpoint
    }

    /// Mutable endpoint access, only while nothing has been built yet
    pub fn endpoint_mut(&mut self) -> Option<&mut ServiceEndpoint> {
        if self.state == CommunicationState::Created && self.handle.is_none() {
            Some(&mut self.endpoint)
        } else {
            None
        }
    }

    pub fn state(&self) -> CommunicationState {
        self.state
    }

    /// Shape of the built factory, once built
    pub fn shape(&self) -> Option<ChannelShape> {
        self.shape
    }

    /// Open the factory unless it is already open
    pub async fn ensure_opened(&mut self) -> Result<()> {
        if self.state != CommunicationState::Opened {
            self.open().await?;
        }
        Ok(())
    }

    /// Build (first call only) and open the underlying factory
    ///
    /// Any failure leaves the instance `Faulted` and is returned unchanged.
    pub async fn open(&mut self) -> Result<()> {
        match self.state {
            CommunicationState::Opened => return Ok(()),
            CommunicationState::Created => {}
            CommunicationState::Opening | CommunicationState::Closing => {
                // A previous transition was dropped before it finished.
                self.fault(&"interrupted transition");
                return Err(Error::AlreadyTerminal(self.state));
            }
            state @ (CommunicationState::Closed | CommunicationState::Faulted) => {
                return Err(Error::AlreadyTerminal(state));
            }
        }

        self.state = CommunicationState::Opening;

        if self.handle.is_none() {
            match selector::select_and_build(&self.endpoint) {
                Ok(BuiltFactory {
                    shape,
                    handle,
                    params,
                }) => {
                    self.shape = Some(shape);
                    self.handle = Some(handle);
                    self.params = Some(params);
                }
                Err(e) => {
                    self.fault(&e);
                    return Err(e);
                }
            }
        }

        let timeout = self.open_timeout();
        if let Some(handle) = self.handle.as_mut() {
            if let Err(e) = handle.open(timeout).await {
                self.fault(&e);
                return Err(e);
            }
        }

        self.state = CommunicationState::Opened;
        tracing::info!(
            contract = self.contract_name(),
            shape = ?self.shape,
            "Channel factory opened"
        );
        Ok(())
    }

    /// Gracefully close the factory
    ///
    /// The instance ends up `Closed` even when the underlying close fails;
    /// that error is still returned. Closing a `Faulted` instance aborts the
    /// handle and leaves it `Faulted`.
    pub async fn close(&mut self) -> Result<()> {
        match self.state {
            CommunicationState::Closed => return Ok(()),
            CommunicationState::Faulted => {
                self.abort_handle();
                return Ok(());
            }
            _ => {}
        }

        self.state = CommunicationState::Closing;

        let timeout = self.close_timeout();
        let result = match self.handle.as_mut() {
            Some(handle) => handle.close(timeout).await,
            None => Ok(()),
        };
        if result.is_err() {
            self.abort_handle();
        }
        self.handle = None;
        self.state = CommunicationState::Closed;

        match &result {
            Ok(()) => tracing::info!(contract = self.contract_name(), "Channel factory closed"),
            Err(e) => tracing::warn!(
                contract = self.contract_name(),
                error = %e,
                "Underlying close failed; factory closed anyway"
            ),
        }
        result
    }

    /// Same as [`close`](Self::close)
    pub async fn dispose(&mut self) -> Result<()> {
        self.close().await
    }

    /// Tear the factory down immediately without a graceful close
    pub fn abort(&mut self) {
        self.abort_handle();
        if self.state != CommunicationState::Faulted {
            self.state = CommunicationState::Closed;
        }
    }

    /// Open if needed, then create a channel to the endpoint address
    pub async fn create_channel(&mut self) -> Result<Box<dyn Channel>> {
        self.ensure_opened().await?;

        let address = self
            .endpoint
            .address()
            .ok_or(Error::EndpointNotResolved("address"))?;
        let handle = self
            .handle
            .as_mut()
            .ok_or(Error::AlreadyTerminal(self.state))?;
        handle.create_channel(address).await
    }

    /// Typed extension lookup
    ///
    /// Behaviors are searched first (latest wins), then the parameters the
    /// binding was built with.
    pub fn property<T: Any>(&self) -> Option<&T> {
        self.endpoint
            .behaviors()
            .find_any::<T>()
            .or_else(|| self.params.as_ref().and_then(|p| p.find::<T>()))
    }

    /// Parameters the handle was built with
    pub fn binding_parameters(&self) -> Option<&BindingParameterCollection> {
        self.params.as_ref()
    }

    fn open_timeout(&self) -> std::time::Duration {
        self.binding()
            .map(|b| b.open_timeout())
            .unwrap_or(crate::binding::DEFAULT_OPEN_TIMEOUT)
    }

    fn close_timeout(&self) -> std::time::Duration {
        self.binding()
            .map(|b| b.close_timeout())
            .unwrap_or(crate::binding::DEFAULT_CLOSE_TIMEOUT)
    }

    fn binding(&self) -> Option<&Arc<dyn Binding>> {
        self.endpoint.binding()
    }

    fn contract_name(&self) -> &str {
        self.endpoint.contract().map(|c| c.name()).unwrap_or("")
    }

    fn fault(&mut self, cause: &dyn std::fmt::Display) {
        self.state = CommunicationState::Faulted;
        tracing::warn!(
            contract = self.contract_name(),
            error = %cause,
            "Channel factory faulted"
        );
    }

    fn abort_handle(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.abort();
            tracing::debug!(contract = self.contract_name(), "Channel factory aborted");
        }
    }
}

impl Drop for ChannelFactory {
    fn drop(&mut self) {
        if self.handle.is_some() && !self.state.is_terminal() {
            tracing::warn!(
                contract = self.contract_name(),
                "Channel factory dropped without close; aborting"
            );
        }
        self.abort_handle();
    }
}

impl std::fmt::Debug for ChannelFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelFactory")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state)
            .field("shape", &self.shape)
            .finish()
    }
}
