//! Message pipeline laws: round trip, digest ordering, forced fields.

use proptest::prelude::*;
use bytes::Bytes;
use tlsmith_core::{
    ConnectionEnd, Diagnostic, DigestAlgorithm, PipelineError, TlsConfig, TlsContext,
    digest::hash,
    pipeline::{self, AdjustOutcome, Adjustment},
};
use tlsmith_harness::SimEnv;
use tlsmith_proto::{
    Alert, ApplicationData, Certificate, ChangeCipherSpec, ClientHello, ClientKeyExchange,
    FieldValue, Finished, HelloRequest, HelloVerifyRequest, MessageKind, ProtocolMessage,
    ServerHello, ServerHelloDone,
};

fn context(alias: &str, config: TlsConfig, seed: u64) -> TlsContext {
    TlsContext::with_environment(alias, config, Box::new(SimEnv::with_seed(seed)))
}

fn with_randoms(mut ctx: TlsContext) -> TlsContext {
    ctx.params_mut().client_random = Some(vec![0x11; 32]);
    ctx.params_mut().server_random = Some(vec![0x22; 32]);
    ctx
}

/// Client context that has seen both hellos, so every preparator can run.
fn negotiated_client() -> TlsContext {
    with_randoms(context("client", TlsConfig::default(), 1))
}

fn negotiated_server() -> TlsContext {
    with_randoms(context("server", TlsConfig::server(), 2))
}

fn every_preparable_message() -> Vec<ProtocolMessage> {
    vec![
        HelloRequest::default().into(),
        ClientHello::default().into(),
        ServerHello::default().into(),
        Certificate::default().into(),
        ServerHelloDone::default().into(),
        ClientKeyExchange::default().into(),
        Finished::default().into(),
        ChangeCipherSpec::default().into(),
        Alert::default().into(),
        ApplicationData::default().into(),
    ]
}

fn field_values(message: &ProtocolMessage) -> Vec<(&'static str, Option<FieldValue>)> {
    let fields = message.fields();
    fields
        .descriptors()
        .iter()
        .map(|d| (d.name, fields.field(d.name).expect("declared field")))
        .collect()
}

#[test]
fn parse_of_prepared_bytes_yields_prepared_fields() {
    for template in every_preparable_message() {
        let mut sender = negotiated_client();
        let mut message = template.clone();
        let bytes = pipeline::prepare_message(&mut message, &mut sender, true)
            .unwrap_or_else(|e| panic!("{}: {e}", template.kind()));

        let mut receiver = negotiated_server();
        let content_type = message.content_type();
        let parsed = pipeline::parse_content(content_type, &bytes, &mut receiver, Adjustment::Apply);

        assert_eq!(parsed.len(), 1, "{}", template.kind());
        assert_eq!(parsed[0].kind(), message.kind());
        assert_eq!(field_values(&parsed[0]), field_values(&message), "{}", template.kind());
        assert_eq!(parsed[0].complete_resulting_message(), Some(&bytes));
    }
}

#[test]
fn forced_fields_survive_preparation() {
    let mut ctx = negotiated_client();
    let mut hello = ClientHello::default();
    hello.cipher_suite_length.force(0xffff);
    hello.header.length.force(3);
    let mut message = ProtocolMessage::from(hello);

    let bytes = pipeline::prepare_message(&mut message, &mut ctx, true).expect("prepare");

    assert_eq!(&bytes[1..4], &[0, 0, 3]);
    assert_eq!(
        message.fields().field("cipher_suite_length").expect("field"),
        Some(FieldValue::U16(0xffff))
    );
    assert!(message.fields().is_forced("cipher_suite_length").expect("field"));
    assert!(!message.fields().is_forced("cipher_suites").expect("field"));
}

#[test]
fn forced_length_produces_unparseable_but_captured_bytes() {
    let mut sender = negotiated_client();
    let mut finished = Finished::default();
    finished.header.length.force(200);
    let mut message = ProtocolMessage::from(finished);
    let bytes = pipeline::prepare_message(&mut message, &mut sender, true).expect("prepare");

    let mut receiver = context("server", TlsConfig::server(), 2);
    let parsed = pipeline::parse_content(22, &bytes, &mut receiver, Adjustment::Apply);

    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0].kind(), MessageKind::Unknown);
    assert_eq!(parsed[0].complete_resulting_message(), Some(&bytes));
    assert!(receiver.digest().is_empty());
}

#[test]
fn hello_verify_request_is_unsupported_in_every_role() {
    let mut ctx = negotiated_client();
    let mut message = ProtocolMessage::from(HelloVerifyRequest::default());

    assert_eq!(
        pipeline::prepare_message(&mut message, &mut ctx, true),
        Err(PipelineError::Unsupported { kind: MessageKind::HelloVerifyRequest })
    );

    // type 3, empty body
    let parsed = pipeline::parse_content(22, &[3, 0, 0, 0], &mut ctx, Adjustment::Apply);
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0].kind(), MessageKind::Unknown);
    assert!(matches!(
        pipeline::adjust_message(&message, &mut ctx),
        AdjustOutcome::Failed(tlsmith_core::AdjustmentError::Unsupported { .. })
    ));
}

#[test]
fn reverse_prepare_after_parse_swaps_randoms() {
    let mut sender = negotiated_client();
    let mut message = ProtocolMessage::from(ClientKeyExchange::default());
    let bytes = pipeline::prepare_message(&mut message, &mut sender, true).expect("prepare");

    let received = |reverse: bool| {
        let mut receiver = negotiated_server();
        receiver.set_reverse_prepare_after_parse(reverse);
        pipeline::parse_content(22, &bytes, &mut receiver, Adjustment::Apply);
        receiver.params().master_secret.clone()
    };

    assert_eq!(received(false), sender.params().master_secret);
    assert_ne!(received(true), sender.params().master_secret);
    assert!(received(true).is_some());
}

#[test]
fn incomplete_context_records_completion_failure() {
    let mut sender = negotiated_client();
    let mut message = ProtocolMessage::from(ClientKeyExchange::default());
    let bytes = pipeline::prepare_message(&mut message, &mut sender, true).expect("prepare");

    let mut receiver = context("server", TlsConfig::server(), 2);
    let parsed = pipeline::parse_content(22, &bytes, &mut receiver, Adjustment::Apply);

    assert_eq!(parsed[0].kind(), MessageKind::ClientKeyExchange);
    assert!(matches!(
        receiver.diagnostics().entries(),
        [Diagnostic::CompletionFailed { kind: MessageKind::ClientKeyExchange, .. }]
    ));
    assert_eq!(receiver.params().master_secret, None);
    // The digest still covers the message.
    assert_eq!(receiver.digest().raw(), bytes.as_ref());
}

#[test]
fn talking_end_tracks_direction() {
    let mut ctx = negotiated_client();
    let mut message = ProtocolMessage::from(Alert::forced(2, 10));
    pipeline::prepare_message(&mut message, &mut ctx, true).expect("prepare");
    assert_eq!(ctx.talking_end(), ConnectionEnd::Client);
    assert!(!ctx.params().received_fatal_alert);

    pipeline::parse_content(21, &[2, 10], &mut ctx, Adjustment::Apply);
    assert_eq!(ctx.talking_end(), ConnectionEnd::Server);
    assert!(ctx.params().received_fatal_alert);
}

#[test]
fn unprepared_resend_leaves_transcript_alone() {
    let mut ctx = negotiated_client();
    let mut done = ProtocolMessage::from(ServerHelloDone::default());
    let first = pipeline::prepare_message(&mut done, &mut ctx, true).expect("prepare");
    assert_eq!(ctx.digest().raw(), first.as_ref());

    let mut resent = ProtocolMessage::from(ServerHelloDone::default());
    resent.meta_mut().set_complete_resulting_message(first.clone()).expect("fresh message");
    let again = pipeline::prepare_message(&mut resent, &mut ctx, false).expect("send as is");

    assert_eq!(again, first);
    assert_eq!(ctx.digest().raw(), first.as_ref());
}

#[test]
fn handshake_type_without_handler_enters_transcript() {
    // ServerKeyExchange (12) has no handler.
    let stream = [12, 0, 0, 2, 0xaa, 0xbb, 14, 0, 0, 0];
    let mut ctx = negotiated_client();
    let parsed = pipeline::parse_content(22, &stream, &mut ctx, Adjustment::Apply);

    let kinds: Vec<_> = parsed.iter().map(ProtocolMessage::kind).collect();
    assert_eq!(kinds, vec![MessageKind::Unknown, MessageKind::ServerHelloDone]);
    assert_eq!(ctx.digest().raw(), &stream);
}

#[test]
fn selected_sha384_suite_drives_transcript_hash() {
    let config = TlsConfig {
        cipher_suites: vec![tlsmith_proto::CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384],
        ..TlsConfig::server()
    };
    let mut server = with_randoms(context("server", config, 2));
    let mut hello = ProtocolMessage::from(ServerHello::default());
    let bytes = pipeline::prepare_message(&mut hello, &mut server, true).expect("prepare");
    assert_eq!(server.prf_algorithm(), DigestAlgorithm::Sha384);

    let mut client = negotiated_client();
    pipeline::parse_content(22, &bytes, &mut client, Adjustment::Apply);
    assert_eq!(client.prf_algorithm(), DigestAlgorithm::Sha384);
    assert_eq!(client.digest().current_hash().len(), 48);
    assert_eq!(client.digest().current_hash(), hash(DigestAlgorithm::Sha384, &bytes));
}

/// One outbound step of the digest law.
struct Step {
    message: ProtocolMessage,
    with_prepare: bool,
    fails_adjustment: bool,
}

fn prepared(message: ProtocolMessage) -> Step {
    Step { message, with_prepare: true, fails_adjustment: false }
}

fn preset(mut message: ProtocolMessage, bytes: &'static [u8]) -> Step {
    message
        .meta_mut()
        .set_complete_resulting_message(Bytes::from_static(bytes))
        .expect("fresh message");
    Step { message, with_prepare: false, fails_adjustment: true }
}

fn step_for(choice: u8) -> Step {
    match choice % 8 {
        0 => prepared(ClientHello::default().into()),
        1 => prepared(ServerHelloDone::default().into()),
        2 => prepared(Certificate::default().into()),
        3 => prepared(Alert::default().into()),
        4 => prepared(ChangeCipherSpec::default().into()),
        5 => prepared(Finished::default().into()),
        // Sent as raw bytes: no data field to adjust from
        6 => preset(ApplicationData::default().into(), b"raw"),
        // Sent as raw bytes: secrets were never computed
        _ => preset(ClientKeyExchange::default().into(), &[16, 0, 0, 2, 0, 0]),
    }
}

/// Handshake flight sent by a negotiated client, as one stream.
fn handshake_stream(choices: &[u8]) -> (Vec<u8>, Vec<MessageKind>) {
    let mut sender = negotiated_client();
    let mut stream = Vec::new();
    let mut kinds = Vec::new();

    for choice in choices {
        let mut message: ProtocolMessage = match choice % 6 {
            0 => ClientHello::default().into(),
            1 => Certificate::default().into(),
            2 => ServerHelloDone::default().into(),
            3 => Finished::default().into(),
            4 => ClientKeyExchange::default().into(),
            _ => {
                stream.extend_from_slice(&[12, 0, 0, 2, 0xaa, 0xbb]);
                kinds.push(MessageKind::Unknown);
                continue;
            },
        };
        let bytes = pipeline::prepare_message(&mut message, &mut sender, true).expect("prepare");
        stream.extend_from_slice(&bytes);
        kinds.push(message.kind());
    }

    (stream, kinds)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn digest_is_hash_of_flagged_handshake_bytes_in_order(
        plan in prop::collection::vec((any::<u8>(), any::<bool>(), any::<bool>()), 0..12)
    ) {
        let mut ctx = negotiated_client();
        let mut expected = Vec::new();
        let mut expected_failures = 0;

        for (choice, include, adjust) in plan {
            let Step { mut message, with_prepare, fails_adjustment } = step_for(choice);
            message.meta_mut().include_in_digest = include;
            message.meta_mut().adjust_context = adjust;

            let bytes = pipeline::prepare_message(&mut message, &mut ctx, with_prepare)
                .expect("failed adjustment never fails the send");
            if with_prepare && include && message.is_handshake() {
                expected.extend_from_slice(&bytes);
            }
            if fails_adjustment && adjust {
                expected_failures += 1;
            }
        }

        prop_assert_eq!(ctx.digest().raw(), expected.as_slice());
        prop_assert_eq!(ctx.digest().current_hash(), hash(ctx.prf_algorithm(), &expected));
        prop_assert_eq!(ctx.diagnostics().adjustment_failures().count(), expected_failures);
    }

    #[test]
    fn received_handshake_stream_is_digested_whole(
        choices in prop::collection::vec(any::<u8>(), 1..10),
        randoms in any::<bool>(),
    ) {
        let (stream, kinds) = handshake_stream(&choices);
        let mut receiver = if randoms {
            negotiated_server()
        } else {
            context("server", TlsConfig::server(), 2)
        };

        let parsed = pipeline::parse_content(22, &stream, &mut receiver, Adjustment::Apply);

        let parsed_kinds: Vec<_> = parsed.iter().map(ProtocolMessage::kind).collect();
        prop_assert_eq!(parsed_kinds, kinds.clone());
        prop_assert_eq!(receiver.digest().raw(), stream.as_slice());

        let exchange = MessageKind::ClientKeyExchange;
        let incomplete = receiver
            .diagnostics()
            .entries()
            .iter()
            .filter(|entry| matches!(entry, Diagnostic::CompletionFailed { kind, .. } if *kind == exchange))
            .count();
        let exchanges = kinds.iter().filter(|kind| **kind == exchange).count();
        prop_assert_eq!(incomplete, if randoms { 0 } else { exchanges });
    }
}
