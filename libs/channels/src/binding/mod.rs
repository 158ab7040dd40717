use std::time::Duration;

use crate::channel::Channel;
use crate::endpoint::EndpointAddress;
use crate::error::Result;
use crate::params::BindingParameterCollection;
use crate::shape::ChannelShape;

pub mod tcp;

pub use self::tcp::{
    TcpBinding, TcpBindingBuilder, TcpBindingConfig, TcpChannel, TcpChannelFactory,
    TcpChannelListener,
};

pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(60);

/// A transport binding able to build channel factories of various shapes
pub trait Binding: Send + Sync {
    /// Short name used in logs and configuration
    fn name(&self) -> &str;

    /// Timeout handed to a factory handle's `open`
    fn open_timeout(&self) -> Duration {
        DEFAULT_OPEN_TIMEOUT
    }

    /// Timeout handed to a factory handle's `close`
    fn close_timeout(&self) -> Duration {
        DEFAULT_CLOSE_TIMEOUT
    }

    /// Whether `build` would succeed for this shape and parameter set
    ///
    /// Must be free of side effects.
    fn can_build(&self, shape: ChannelShape, params: &BindingParameterCollection) -> bool;

    /// Construct a factory handle for the shape
    ///
    /// No network activity may happen before the handle is opened.
    fn build(
        &self,
        shape: ChannelShape,
        params: &BindingParameterCollection,
    ) -> Result<Box<dyn ChannelFactoryHandle>>;
}

/// Binding-specific channel factory, owned by a
/// [`ChannelFactory`](crate::factory::ChannelFactory) once built
#[async_trait::async_trait]
pub trait ChannelFactoryHandle: Send + Sync {
    fn shape(&self) -> ChannelShape;

    async fn open(&mut self, timeout: Duration) -> Result<()>;

    async fn close(&mut self, timeout: Duration) -> Result<()>;

    /// Forced teardown; must not block
    fn abort(&mut self) {}

    /// Create a channel to the remote address
    async fn create_channel(&mut self, address: &EndpointAddress) -> Result<Box<dyn Channel>>;
}
