//! Workflow actions against scripted transports.

use proptest::prelude::*;
use tlsmith_core::{
    TlsConfig, TlsContext, WorkflowError,
    pipeline,
    workflow::{ActionState, State, TlsAction, WorkflowExecutor, WorkflowTrace},
};
use tlsmith_harness::{ScriptedTransport, SentLog, SimEnv};
use tlsmith_proto::{
    ApplicationData, Certificate, ChangeCipherSpec, ClientHello, MessageKind, ProtocolMessage,
    RecordLayer, ServerHello, ServerHelloDone,
};

fn state_with(alias: &str, config: TlsConfig, transport: ScriptedTransport) -> State {
    let mut state = State::new();
    let context = TlsContext::with_environment(alias, config, Box::new(SimEnv::with_seed(7)));
    state.add_connection(context, Box::new(transport));
    state
}

fn silent_client() -> (State, SentLog) {
    let (transport, sent) = ScriptedTransport::new(Vec::<Vec<u8>>::new());
    (state_with("client", TlsConfig::default(), transport), sent)
}

/// Server flight as it would appear on the wire, fragmented into small
/// records.
fn server_flight(max_fragment_length: usize) -> Vec<u8> {
    let config = TlsConfig { max_fragment_length, ..TlsConfig::server() };
    let mut server = TlsContext::with_environment("server", config, Box::new(SimEnv::with_seed(3)));
    server.params_mut().client_random = Some(vec![0x11; 32]);

    let mut handshake = Vec::new();
    let flight: Vec<ProtocolMessage> = vec![
        ServerHello::default().into(),
        Certificate::default().into(),
        ServerHelloDone::default().into(),
    ];
    for mut message in flight {
        let bytes = pipeline::prepare_message(&mut message, &mut server, true).expect("prepare");
        handshake.extend_from_slice(&bytes);
    }

    let layer = RecordLayer::new(server.config().record_version, max_fragment_length);
    layer.encode(&layer.frame(22, &handshake)).to_vec()
}

const FLIGHT: [MessageKind; 3] =
    [MessageKind::ServerHello, MessageKind::Certificate, MessageKind::ServerHelloDone];

fn received_kinds(action: &TlsAction) -> Vec<MessageKind> {
    match action {
        TlsAction::Receive(receive) => {
            receive.received_messages().iter().map(ProtocolMessage::kind).collect()
        },
        other => panic!("not a receive: {}", other.name()),
    }
}

#[test]
fn executing_twice_fails_and_keeps_first_outcome() {
    let (mut state, sent) = silent_client();
    let mut action = TlsAction::send("client", vec![ClientHello::default().into()]);

    let first = action.execute(&mut state).expect("first run");
    assert!(first.executed_as_planned);

    let again = action.execute(&mut state);
    assert_eq!(
        again,
        Err(WorkflowError::AlreadyExecuted { action: "Send", alias: "client".to_string() })
    );
    assert_eq!(action.outcome(), Some(&first));
    assert_eq!(sent.writes().len(), 1);
}

#[test]
fn reset_allows_execution_again() {
    let (mut state, sent) = silent_client();
    let mut action = TlsAction::send("client", vec![ChangeCipherSpec::default().into()]);

    action.execute(&mut state).expect("first run");
    action.reset();
    assert_eq!(action.state(), &ActionState::NotExecuted);
    action.execute(&mut state).expect("second run");

    assert_eq!(sent.writes().len(), 2);
    assert_eq!(state.context("client").expect("client").params().ccs_count, 2);
}

#[test]
fn unknown_connection_leaves_action_untouched() {
    let (mut state, _sent) = silent_client();
    let mut action = TlsAction::renegotiation("nobody");

    assert_eq!(
        action.execute(&mut state),
        Err(WorkflowError::UnknownConnection("nobody".to_string()))
    );
    assert_eq!(action.state(), &ActionState::NotExecuted);
}

#[test]
fn send_coalesces_handshake_messages_into_one_record() {
    let (mut state, sent) = silent_client();
    let mut action = TlsAction::send(
        "client",
        vec![
            ClientHello::default().into(),
            ClientHello::default().into(),
            ChangeCipherSpec::default().into(),
        ],
    );
    action.execute(&mut state).expect("send");

    let wire = sent.concatenated();
    let records = RecordLayer::default().parse_records(&wire).records;
    let types: Vec<u8> = records.iter().map(|r| r.content_type).collect();
    assert_eq!(types, vec![22, 20]);
}

#[test]
fn receive_assembles_fragmented_flight() {
    let wire = server_flight(7);
    let (transport, _) = ScriptedTransport::new(vec![wire]);
    let mut state = state_with("client", TlsConfig::default(), transport);

    let mut action = TlsAction::receive("client", FLIGHT.to_vec());
    let outcome = action.execute(&mut state).expect("receive");

    assert!(outcome.executed_as_planned, "{outcome:?}");
    assert_eq!(received_kinds(&action), FLIGHT.to_vec());
    assert!(state.context("client").expect("client").params().server_random.is_some());
}

#[test]
fn receive_reports_mismatch() {
    let wire = server_flight(16_384);
    let (transport, _) = ScriptedTransport::new(vec![wire]);
    let mut state = state_with("client", TlsConfig::default(), transport);

    let expected = vec![MessageKind::ServerHello, MessageKind::Finished];
    let mut action = TlsAction::receive("client", expected);
    let outcome = action.execute(&mut state).expect("receive");

    assert!(!outcome.executed_as_planned);
    assert!(outcome.detail.is_some());
}

#[test]
fn buffered_messages_apply_later() {
    let (transport, _) = ScriptedTransport::new(vec![server_flight(16_384)]);
    let mut state = state_with("client", TlsConfig::default(), transport);

    let mut trace: WorkflowTrace = [
        TlsAction::receive_buffered("client", FLIGHT.to_vec()),
        TlsAction::apply_buffered_messages("client"),
        TlsAction::clear_buffer("client"),
    ]
    .into_iter()
    .collect();

    let mut executor = WorkflowExecutor::new(&mut trace, &mut state);
    executor.step().expect("receive");
    let client = executor.state().context("client").expect("client");
    assert_eq!(client.buffered_len(), 3);
    assert_eq!(client.params().server_random, None);
    let digest = client.digest().raw().to_vec();
    assert!(!digest.is_empty());

    executor.step().expect("apply");
    let client = executor.state().context("client").expect("client");
    assert!(client.params().server_random.is_some());
    assert_eq!(client.buffered_len(), 3);
    assert_eq!(client.digest().raw(), digest.as_slice());

    executor.step().expect("clear");
    assert_eq!(executor.state().context("client").expect("client").buffered_len(), 0);
    assert!(trace.all_executed_as_planned());
}

#[test]
fn apply_buffered_adjusts_every_message_and_counts_failures() {
    let mut server =
        TlsContext::with_environment("server", TlsConfig::server(), Box::new(SimEnv::with_seed(3)));
    let mut hello = ProtocolMessage::from(ServerHello::default());
    pipeline::prepare_message(&mut hello, &mut server, true).expect("prepare");
    hello.meta_mut().adjust_context = false;

    let mut client =
        TlsContext::with_environment("client", TlsConfig::default(), Box::new(SimEnv::with_seed(7)));
    client.enqueue_message(hello);
    // No data to adjust from
    client.enqueue_message(ApplicationData::default().into());

    let (transport, _) = ScriptedTransport::new(Vec::<Vec<u8>>::new());
    let mut state = State::new();
    state.add_connection(client, Box::new(transport));

    let mut action = TlsAction::apply_buffered_messages("client");
    let outcome = action.execute(&mut state).expect("apply");

    assert!(outcome.executed_as_planned);
    assert_eq!(outcome.detail.as_deref(), Some("1 of 2 adjustments failed"));
    let client = state.context("client").expect("client");
    assert!(client.params().server_random.is_some());
    assert_eq!(client.diagnostics().adjustment_failures().count(), 1);
    assert_eq!(client.buffered_len(), 2);
}

#[test]
fn reverse_flag_is_set_by_action() {
    let (mut state, _) = silent_client();
    let mut trace: WorkflowTrace = [
        TlsAction::set_reverse_prepare_after_parse("client", true),
    ]
    .into_iter()
    .collect();

    WorkflowExecutor::new(&mut trace, &mut state).execute_all().expect("run");
    assert!(state.context("client").expect("client").reverse_prepare_after_parse());
}

#[test]
fn execute_until_stops_at_index() {
    let (mut state, sent) = silent_client();
    let mut trace: WorkflowTrace = (0..3)
        .map(|_| TlsAction::send("client", vec![ChangeCipherSpec::default().into()]))
        .collect();

    let mut executor = WorkflowExecutor::new(&mut trace, &mut state);
    executor.execute_until(1).expect("run");
    assert_eq!(executor.execute_until(5), Err(WorkflowError::NoSuchAction(5)));

    assert_eq!(sent.writes().len(), 2);
    assert_eq!(trace.next_pending(), Some(2));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn receive_is_independent_of_read_boundaries(
        fragment in 4usize..64,
        cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..8),
    ) {
        let wire = server_flight(fragment);
        let mut cuts: Vec<usize> = cuts.iter().map(|i| i.index(wire.len() + 1)).collect();
        cuts.sort_unstable();

        let (transport, _) = ScriptedTransport::split(&wire, &cuts);
        let mut state = state_with("client", TlsConfig::default(), transport);
        let mut action = TlsAction::receive("client", FLIGHT.to_vec());
        let outcome = action.execute(&mut state).expect("receive");

        prop_assert!(outcome.executed_as_planned, "{:?}", outcome);
        prop_assert_eq!(received_kinds(&action), FLIGHT.to_vec());
    }

    #[test]
    fn renegotiation_restarts_the_transcript(before in 0usize..4, after in 0usize..4) {
        let (mut state, _) = silent_client();
        let hellos = |n: usize| -> Vec<ProtocolMessage> {
            (0..n).map(|_| ClientHello::default().into()).collect()
        };

        let mut trace: WorkflowTrace = [
            TlsAction::send("client", hellos(before)),
            TlsAction::renegotiation("client"),
            TlsAction::send("client", hellos(after)),
        ]
        .into_iter()
        .collect();
        WorkflowExecutor::new(&mut trace, &mut state).execute_all().expect("run");

        let expected: Vec<u8> = match trace.get(2) {
            Some(TlsAction::Send(send)) => send
                .sent_messages()
                .iter()
                .filter_map(ProtocolMessage::complete_resulting_message)
                .flat_map(|b| b.iter().copied())
                .collect(),
            _ => unreachable!(),
        };
        let client = state.context("client").expect("client");
        prop_assert_eq!(client.digest().raw(), expected.as_slice());
        prop_assert!(trace.all_executed_as_planned());
    }
}
