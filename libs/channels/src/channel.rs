use crate::error::Result;
use crate::shape::ChannelShape;

/// A live channel produced by an opened channel factory
///
/// Channels move opaque byte frames; encoding messages is left to the layer
/// above. Each instance represents a single connection.
#[async_trait::async_trait]
pub trait Channel: Send + Sync {
    /// Shape of the factory that produced this channel
    fn shape(&self) -> ChannelShape;

    /// Send one frame
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Receive one frame
    async fn receive(&mut self) -> Result<Vec<u8>>;

    /// Close the channel connection
    async fn close(&mut self) -> Result<()>;
}
