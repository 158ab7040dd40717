mod common;

use std::time::Duration;

use common::{address, duplex, one_way, request_reply, MockBinding};
use constellation_channels::{
    error::Error, Binding, BindingParameterCollection, ChannelFactory,
    ChannelProtectionRequirements, ChannelShape, CommunicationState, EndpointBehavior, Result,
    ServiceEndpoint,
};
use constellation_core::{ContractDescription, SessionMode};

fn factory_for(binding: &MockBinding, contract: ContractDescription) -> ChannelFactory {
    ChannelFactory::new(
        ServiceEndpoint::new(contract)
            .with_binding(binding.clone())
            .with_address(address()),
    )
}

#[tokio::test]
async fn duplex_session_contract_opens() {
    let binding = MockBinding::supporting(&[ChannelShape::DuplexSession]);
    let mut factory = factory_for(&binding, duplex(SessionMode::Required));
    assert_eq!(factory.state(), CommunicationState::Created);

    factory.open().await.unwrap();

    assert_eq!(factory.state(), CommunicationState::Opened);
    assert_eq!(factory.shape(), Some(ChannelShape::DuplexSession));
    assert_eq!(binding.calls().lock().unwrap().opens.len(), 1);
}

#[tokio::test]
async fn second_open_does_not_rebuild() {
    let binding = MockBinding::everything();
    let mut factory = factory_for(&binding, request_reply(SessionMode::NotAllowed));

    factory.open().await.unwrap();
    factory.open().await.unwrap();
    factory.ensure_opened().await.unwrap();

    let calls = binding.calls();
    let calls = calls.lock().unwrap();
    assert_eq!(calls.builds, vec![ChannelShape::Request]);
    assert_eq!(calls.opens.len(), 1);
}

#[tokio::test]
async fn ensure_opened_opens_lazily() {
    let binding = MockBinding::everything();
    let mut factory = factory_for(&binding, one_way(SessionMode::NotAllowed));

    factory.ensure_opened().await.unwrap();

    assert_eq!(factory.state(), CommunicationState::Opened);
    assert_eq!(factory.shape(), Some(ChannelShape::Output));
}

#[tokio::test]
async fn timeouts_come_from_binding() {
    let binding = MockBinding::everything()
        .timeouts(Duration::from_millis(1500), Duration::from_millis(250));
    let mut factory = factory_for(&binding, request_reply(SessionMode::NotAllowed));

    factory.open().await.unwrap();
    factory.close().await.unwrap();

    let calls = binding.calls();
    let calls = calls.lock().unwrap();
    assert_eq!(calls.opens, vec![Duration::from_millis(1500)]);
    assert_eq!(calls.closes, vec![Duration::from_millis(250)]);
}

#[tokio::test]
async fn close_without_open_skips_handle() {
    let binding = MockBinding::everything();
    let mut factory = factory_for(&binding, request_reply(SessionMode::NotAllowed));

    factory.close().await.unwrap();

    assert_eq!(factory.state(), CommunicationState::Closed);
    let calls = binding.calls();
    let calls = calls.lock().unwrap();
    assert!(calls.builds.is_empty());
    assert!(calls.closes.is_empty());
}

#[tokio::test]
async fn close_after_open_closes_handle() {
    let binding = MockBinding::everything();
    let mut factory = factory_for(&binding, request_reply(SessionMode::NotAllowed));

    factory.open().await.unwrap();
    factory.dispose().await.unwrap();

    assert_eq!(factory.state(), CommunicationState::Closed);
    assert_eq!(binding.calls().lock().unwrap().closes.len(), 1);

    // Closing again is a no-op
    factory.close().await.unwrap();
    assert_eq!(binding.calls().lock().unwrap().closes.len(), 1);
}

#[tokio::test]
async fn open_after_close_is_rejected() {
    let binding = MockBinding::everything();
    let mut factory = factory_for(&binding, request_reply(SessionMode::NotAllowed));

    factory.close().await.unwrap();
    let err = factory.open().await.unwrap_err();

    assert!(matches!(
        err,
        Error::AlreadyTerminal(CommunicationState::Closed)
    ));
    assert!(binding.calls().lock().unwrap().builds.is_empty());
}

#[tokio::test]
async fn underlying_open_failure_faults() {
    let binding = MockBinding::everything().failing_open();
    let mut factory = factory_for(&binding, request_reply(SessionMode::NotAllowed));

    let err = factory.open().await.unwrap_err();
    assert!(matches!(err, Error::ConnectionClosed));
    assert_eq!(factory.state(), CommunicationState::Faulted);

    let err = factory.open().await.unwrap_err();
    assert!(matches!(
        err,
        Error::AlreadyTerminal(CommunicationState::Faulted)
    ));

    let calls = binding.calls();
    let calls = calls.lock().unwrap();
    assert_eq!(calls.builds.len(), 1);
    assert_eq!(calls.opens.len(), 1);
}

#[tokio::test]
async fn unsupported_shape_faults() {
    let binding = MockBinding::supporting(&[ChannelShape::Request]);
    let mut factory = factory_for(&binding, request_reply(SessionMode::Required));

    let err = factory.open().await.unwrap_err();

    assert!(matches!(err, Error::ShapeNotSupported { .. }));
    assert_eq!(factory.state(), CommunicationState::Faulted);
    assert_eq!(factory.shape(), None);
}

#[tokio::test]
async fn build_failure_faults() {
    let binding = MockBinding::everything().failing_build();
    let mut factory = factory_for(&binding, request_reply(SessionMode::NotAllowed));

    let err = factory.open().await.unwrap_err();

    assert!(matches!(err, Error::Custom(_)));
    assert_eq!(factory.state(), CommunicationState::Faulted);
    assert!(binding.calls().lock().unwrap().opens.is_empty());
}

#[tokio::test]
async fn unresolved_endpoint_faults() {
    let mut factory = ChannelFactory::new(ServiceEndpoint::new(request_reply(
        SessionMode::NotAllowed,
    )));

    let err = factory.open().await.unwrap_err();

    assert!(matches!(err, Error::EndpointNotResolved("binding")));
    assert_eq!(factory.state(), CommunicationState::Faulted);
}

#[tokio::test]
async fn close_failure_still_closes() {
    let binding = MockBinding::everything().failing_close();
    let mut factory = factory_for(&binding, request_reply(SessionMode::NotAllowed));

    factory.open().await.unwrap();
    let err = factory.close().await.unwrap_err();

    assert!(matches!(err, Error::Timeout("Close")));
    assert_eq!(factory.state(), CommunicationState::Closed);

    // The handle that refused to close gracefully is torn down
    let calls = binding.calls();
    let calls = calls.lock().unwrap();
    assert_eq!(calls.closes.len(), 1);
    assert_eq!(calls.aborts, 1);
}

#[tokio::test]
async fn close_on_faulted_aborts_handle() {
    let binding = MockBinding::everything().failing_open();
    let mut factory = factory_for(&binding, request_reply(SessionMode::NotAllowed));

    factory.open().await.unwrap_err();
    factory.close().await.unwrap();

    assert_eq!(factory.state(), CommunicationState::Faulted);
    let calls = binding.calls();
    let calls = calls.lock().unwrap();
    assert!(calls.closes.is_empty());
    assert_eq!(calls.aborts, 1);
}

#[tokio::test]
async fn abort_tears_down_without_close() {
    let binding = MockBinding::everything();
    let mut factory = factory_for(&binding, request_reply(SessionMode::NotAllowed));

    factory.open().await.unwrap();
    factory.abort();

    assert_eq!(factory.state(), CommunicationState::Closed);
    let calls = binding.calls();
    let calls = calls.lock().unwrap();
    assert!(calls.closes.is_empty());
    assert_eq!(calls.aborts, 1);
}

#[tokio::test]
async fn dropping_open_factory_aborts_handle() {
    let binding = MockBinding::everything();
    {
        let mut factory = factory_for(&binding, request_reply(SessionMode::NotAllowed));
        factory.open().await.unwrap();
    }
    assert_eq!(binding.calls().lock().unwrap().aborts, 1);
}

#[tokio::test]
async fn create_channel_opens_implicitly() {
    let binding = MockBinding::everything();
    let mut factory = factory_for(&binding, duplex(SessionMode::Allowed));

    let mut channel = factory.create_channel().await.unwrap();

    assert_eq!(factory.state(), CommunicationState::Opened);
    assert_eq!(channel.shape(), ChannelShape::Duplex);
    channel.send(b"ping").await.unwrap();
    assert_eq!(channel.receive().await.unwrap(), b"ping");
    assert_eq!(binding.calls().lock().unwrap().channels, 1);
}

#[tokio::test]
async fn create_channel_needs_address() {
    let binding = MockBinding::everything();
    let mut factory = ChannelFactory::new(
        ServiceEndpoint::new(request_reply(SessionMode::NotAllowed)).with_binding(binding.clone()),
    );

    let err = factory.create_channel().await.err().unwrap();

    assert!(matches!(err, Error::EndpointNotResolved("address")));
    assert_eq!(factory.state(), CommunicationState::Opened);
}

#[derive(Debug, PartialEq)]
struct ClientTag(&'static str);

struct Tagging;

impl EndpointBehavior for Tagging {
    fn add_binding_parameters(
        &self,
        _endpoint: &ServiceEndpoint,
        params: &mut BindingParameterCollection,
    ) -> Result<()> {
        params.add(ClientTag("tagged"))
    }
}

struct Credentials {
    user: &'static str,
}

impl EndpointBehavior for Credentials {}

#[tokio::test]
async fn property_resolves_behaviors_and_parameters() {
    let binding = MockBinding::everything();
    let mut factory = ChannelFactory::new(
        ServiceEndpoint::new(request_reply(SessionMode::NotAllowed))
            .with_binding(binding)
            .with_behavior(Credentials { user: "first" })
            .with_behavior(Tagging)
            .with_behavior(Credentials { user: "second" }),
    );

    assert_eq!(factory.property::<Credentials>().map(|c| c.user), Some("second"));
    assert!(factory.property::<ClientTag>().is_none());

    factory.open().await.unwrap();

    assert_eq!(factory.property::<ClientTag>(), Some(&ClientTag("tagged")));
    assert!(factory
        .property::<ChannelProtectionRequirements>()
        .is_some());
    assert!(factory.property::<String>().is_none());
}

#[tokio::test]
async fn endpoint_is_frozen_once_built() {
    let binding = MockBinding::everything();
    let mut factory = factory_for(&binding, request_reply(SessionMode::NotAllowed));

    assert!(factory.endpoint_mut().is_some());
    factory.open().await.unwrap();
    assert!(factory.endpoint_mut().is_none());
    assert_eq!(factory.endpoint().binding().map(|b| b.name()), Some("mock"));
}

#[tokio::test]
async fn cancelled_open_faults_on_next_open() {
    let binding = MockBinding::everything().slow_open(Duration::from_secs(30));
    let mut factory = factory_for(&binding, request_reply(SessionMode::NotAllowed));

    let cancelled = tokio::time::timeout(Duration::from_millis(20), factory.open()).await;
    assert!(cancelled.is_err());
    assert_eq!(factory.state(), CommunicationState::Opening);

    let err = factory.open().await.unwrap_err();
    assert!(matches!(
        err,
        Error::AlreadyTerminal(CommunicationState::Faulted)
    ));
    assert_eq!(factory.state(), CommunicationState::Faulted);

    let calls = binding.calls();
    let calls = calls.lock().unwrap();
    assert_eq!(calls.builds.len(), 1);
    assert_eq!(calls.opens.len(), 1);
}

#[tokio::test]
async fn close_after_cancelled_open_closes_handle() {
    let binding = MockBinding::everything().slow_open(Duration::from_secs(30));
    let mut factory = factory_for(&binding, request_reply(SessionMode::NotAllowed));

    let cancelled = tokio::time::timeout(Duration::from_millis(20), factory.open()).await;
    assert!(cancelled.is_err());
    assert_eq!(factory.state(), CommunicationState::Opening);

    factory.close().await.unwrap();
    assert_eq!(factory.state(), CommunicationState::Closed);

    let err = factory.open().await.unwrap_err();
    assert!(matches!(
        err,
        Error::AlreadyTerminal(CommunicationState::Closed)
    ));

    let calls = binding.calls();
    let calls = calls.lock().unwrap();
    assert_eq!(calls.closes.len(), 1);
    assert_eq!(calls.aborts, 0);
}
