#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use constellation_channels::{
    error::Error, Binding, BindingParameterCollection, Channel, ChannelFactoryHandle,
    ChannelShape, EndpointAddress, Result,
};
use constellation_core::{ContractDescription, OperationDescription, SessionMode};

/// Everything the mock binding and its handles were asked to do
#[derive(Debug, Default)]
pub struct Calls {
    pub probes: Vec<ChannelShape>,
    pub builds: Vec<ChannelShape>,
    pub build_params: Vec<Vec<&'static str>>,
    pub opens: Vec<Duration>,
    pub closes: Vec<Duration>,
    pub aborts: usize,
    pub channels: usize,
}

/// Binding answering capability queries from a fixed set of shapes
#[derive(Clone)]
pub struct MockBinding {
    supported: HashSet<ChannelShape>,
    fail_build: bool,
    fail_open: bool,
    fail_close: bool,
    open_delay: Option<Duration>,
    open_timeout: Duration,
    close_timeout: Duration,
    calls: Arc<Mutex<Calls>>,
}

impl MockBinding {
    pub fn supporting(shapes: &[ChannelShape]) -> Self {
        Self {
            supported: shapes.iter().copied().collect(),
            fail_build: false,
            fail_open: false,
            fail_close: false,
            open_delay: None,
            open_timeout: Duration::from_secs(5),
            close_timeout: Duration::from_secs(3),
            calls: Arc::default(),
        }
    }

    pub fn everything() -> Self {
        Self::supporting(&ChannelShape::ALL)
    }

    pub fn failing_build(mut self) -> Self {
        self.fail_build = true;
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Handles take this long to open
    pub fn slow_open(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    pub fn timeouts(mut self, open: Duration, close: Duration) -> Self {
        self.open_timeout = open;
        self.close_timeout = close;
        self
    }

    /// Shared view of the recorded calls
    pub fn calls(&self) -> Arc<Mutex<Calls>> {
        self.calls.clone()
    }
}

impl Binding for MockBinding {
    fn name(&self) -> &str {
        "mock"
    }

    fn open_timeout(&self) -> Duration {
        self.open_timeout
    }

    fn close_timeout(&self) -> Duration {
        self.close_timeout
    }

    fn can_build(&self, shape: ChannelShape, _params: &BindingParameterCollection) -> bool {
        self.calls.lock().unwrap().probes.push(shape);
        self.supported.contains(&shape)
    }

    fn build(
        &self,
        shape: ChannelShape,
        params: &BindingParameterCollection,
    ) -> Result<Box<dyn ChannelFactoryHandle>> {
        {
            let mut calls = self.calls.lock().unwrap();
            calls.builds.push(shape);
            calls.build_params.push(params.type_names());
        }
        if self.fail_build {
            return Err(Error::custom("build refused"));
        }
        Ok(Box::new(MockHandle {
            shape,
            fail_open: self.fail_open,
            fail_close: self.fail_close,
            open_delay: self.open_delay,
            calls: self.calls.clone(),
        }))
    }
}

pub struct MockHandle {
    shape: ChannelShape,
    fail_open: bool,
    fail_close: bool,
    open_delay: Option<Duration>,
    calls: Arc<Mutex<Calls>>,
}

#[async_trait::async_trait]
impl ChannelFactoryHandle for MockHandle {
    fn shape(&self) -> ChannelShape {
        self.shape
    }

    async fn open(&mut self, timeout: Duration) -> Result<()> {
        self.calls.lock().unwrap().opens.push(timeout);
        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_open {
            return Err(Error::ConnectionClosed);
        }
        Ok(())
    }

    async fn close(&mut self, timeout: Duration) -> Result<()> {
        self.calls.lock().unwrap().closes.push(timeout);
        if self.fail_close {
            return Err(Error::Timeout("Close"));
        }
        Ok(())
    }

    fn abort(&mut self) {
        self.calls.lock().unwrap().aborts += 1;
    }

    async fn create_channel(&mut self, _address: &EndpointAddress) -> Result<Box<dyn Channel>> {
        self.calls.lock().unwrap().channels += 1;
        Ok(Box::new(LoopbackChannel {
            shape: self.shape,
            queue: VecDeque::new(),
        }))
    }
}

/// Channel that hands back whatever was sent to it
pub struct LoopbackChannel {
    shape: ChannelShape,
    queue: VecDeque<Vec<u8>>,
}

#[async_trait::async_trait]
impl Channel for LoopbackChannel {
    fn shape(&self) -> ChannelShape {
        self.shape
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.queue.push_back(bytes.to_vec());
        Ok(())
    }

    async fn receive(&mut self) -> Result<Vec<u8>> {
        self.queue.pop_front().ok_or(Error::ConnectionClosed)
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

pub fn request_reply(mode: SessionMode) -> ContractDescription {
    ContractDescription::builder("Calculator")
        .operation(OperationDescription::new("Add"))
        .operation(OperationDescription::new("Reset").one_way())
        .session_mode(mode)
        .build()
        .unwrap()
}

pub fn one_way(mode: SessionMode) -> ContractDescription {
    ContractDescription::builder("Telemetry")
        .operation(OperationDescription::new("Record").one_way())
        .operation(OperationDescription::new("Flush").one_way())
        .session_mode(mode)
        .build()
        .unwrap()
}

pub fn duplex(mode: SessionMode) -> ContractDescription {
    ContractDescription::builder("Chat")
        .operation(OperationDescription::new("Join"))
        .operation(OperationDescription::new("Say").one_way())
        .callback_contract("ChatCallback")
        .session_mode(mode)
        .build()
        .unwrap()
}

pub fn address() -> EndpointAddress {
    EndpointAddress::parse("mock://localhost/service").unwrap()
}
