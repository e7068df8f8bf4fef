//! Per-connection state.
//!
//! [`TlsContext`] is the only state handlers touch. Handlers read negotiated
//! parameters during preparation and write them while adjusting; the pipeline
//! appends to the transcript digest. Nothing here blocks or performs I/O.
//!
//! Reading a parameter that was never set is a caller error and surfaces as
//! [`ContextError::UnsetParameter`]; preparators that can fall back on the
//! configuration use the `chosen_*` accessors instead.

use std::{collections::VecDeque, fmt};

use tlsmith_proto::{
    CipherSuite, CompressionMethod, MessageKind, ProtocolMessage, ProtocolVersion,
};

use crate::{
    config::{ConnectionEnd, DigestAlgorithm, TlsConfig},
    digest::TranscriptDigest,
    env::{Environment, SystemEnv},
    error::{AdjustmentError, ContextError, PipelineError},
};

/// Parameters learned from exchanged messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NegotiatedParameters {
    /// Version from ServerHello
    pub selected_protocol_version: Option<ProtocolVersion>,
    /// Version offered in ClientHello
    pub offered_protocol_version: Option<ProtocolVersion>,
    /// Suite from ServerHello
    pub selected_cipher_suite: Option<CipherSuite>,
    /// Compression from ServerHello
    pub selected_compression: Option<CompressionMethod>,
    /// Suites offered in ClientHello
    pub offered_cipher_suites: Vec<CipherSuite>,
    /// ClientHello timestamp and random, 32 bytes
    pub client_random: Option<Vec<u8>>,
    /// ServerHello timestamp and random, 32 bytes
    pub server_random: Option<Vec<u8>>,
    /// Session id from the last hello
    pub session_id: Option<Vec<u8>>,
    /// Certificate list sent by the server
    pub server_certificate: Option<Vec<u8>>,
    /// Certificate list sent by the client
    pub client_certificate: Option<Vec<u8>>,
    /// Premaster secret of the last ClientKeyExchange
    pub premaster_secret: Option<Vec<u8>>,
    /// Master secret of the last ClientKeyExchange
    pub master_secret: Option<Vec<u8>>,
    /// Verify data of the client's Finished
    pub client_verify_data: Option<Vec<u8>>,
    /// Verify data of the server's Finished
    pub server_verify_data: Option<Vec<u8>>,
    /// Level and description of the last alert
    pub last_alert: Option<(u8, u8)>,
    /// A fatal alert arrived from the peer
    pub received_fatal_alert: bool,
    /// Payload of the last application data
    pub last_application_data: Option<Vec<u8>>,
    /// ChangeCipherSpec messages processed
    pub ccs_count: u32,
}

/// One recorded non-fatal pipeline failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Context adjustment failed or is unsupported
    AdjustmentFailed {
        /// Message variant
        kind: MessageKind,
        /// Cause
        error: AdjustmentError,
    },
    /// Prepare-after-parse could not complete a received message
    CompletionFailed {
        /// Message variant
        kind: MessageKind,
        /// Cause
        error: PipelineError,
    },
}

/// Diagnostic sink owned by one connection.
///
/// Lives as long as the context, so a run's diagnostics never mix with
/// another connection's.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Record an entry.
    pub fn record(&mut self, entry: Diagnostic) {
        self.entries.push(entry);
    }

    /// Entries in the order they were recorded.
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Adjustment failures only.
    pub fn adjustment_failures(&self) -> impl Iterator<Item = (MessageKind, &AdjustmentError)> {
        self.entries.iter().filter_map(|entry| match entry {
            Diagnostic::AdjustmentFailed { kind, error } => Some((*kind, error)),
            Diagnostic::CompletionFailed { .. } => None,
        })
    }

    /// True if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Mutable state of one connection.
pub struct TlsContext {
    alias: String,
    config: TlsConfig,
    digest: TranscriptDigest,
    params: NegotiatedParameters,
    message_buffer: VecDeque<ProtocolMessage>,
    dtls_cookie: Option<Vec<u8>>,
    reverse_prepare_after_parse: bool,
    talking_end: ConnectionEnd,
    diagnostics: Diagnostics,
    env: Box<dyn Environment>,
}

impl fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsContext")
            .field("alias", &self.alias)
            .field("connection_end", &self.config.connection_end)
            .field("talking_end", &self.talking_end)
            .field("digest_len", &self.digest.raw().len())
            .field("buffered", &self.message_buffer.len())
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl TlsContext {
    /// Context using the system clock and RNG.
    pub fn new(alias: impl Into<String>, config: TlsConfig) -> Self {
        Self::with_environment(alias, config, Box::new(SystemEnv))
    }

    /// Context using a caller-supplied environment.
    pub fn with_environment(
        alias: impl Into<String>,
        config: TlsConfig,
        env: Box<dyn Environment>,
    ) -> Self {
        Self {
            alias: alias.into(),
            digest: TranscriptDigest::new(config.digest_algorithm),
            reverse_prepare_after_parse: config.reverse_prepare_after_parse,
            talking_end: config.connection_end,
            params: NegotiatedParameters::default(),
            message_buffer: VecDeque::new(),
            dtls_cookie: None,
            diagnostics: Diagnostics::default(),
            config,
            env,
        }
    }

    /// Connection alias.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Configuration.
    pub fn config(&self) -> &TlsConfig {
        &self.config
    }

    /// Configuration, mutably.
    pub fn config_mut(&mut self) -> &mut TlsConfig {
        &mut self.config
    }

    /// Side played by the engine.
    pub fn connection_end(&self) -> ConnectionEnd {
        self.config.connection_end
    }

    /// Side that produced the message currently being processed.
    pub fn talking_end(&self) -> ConnectionEnd {
        self.talking_end
    }

    /// Set the side producing the current message.
    pub fn set_talking_end(&mut self, end: ConnectionEnd) {
        self.talking_end = end;
    }

    /// Transcript digest.
    pub fn digest(&self) -> &TranscriptDigest {
        &self.digest
    }

    /// Append message bytes to the transcript digest.
    pub fn append_digest(&mut self, bytes: &[u8]) {
        self.digest.append(bytes);
    }

    /// Return the transcript digest to its empty state.
    pub fn reset_digest(&mut self) {
        self.digest.reset();
    }

    /// Switch the transcript and PRF hash, keeping the appended bytes.
    pub fn set_digest_algorithm(&mut self, algorithm: DigestAlgorithm) {
        self.digest.set_algorithm(algorithm);
    }

    /// Hash behind the PRF: the one the transcript currently uses.
    pub fn prf_algorithm(&self) -> DigestAlgorithm {
        self.digest.algorithm()
    }

    /// Negotiated parameters.
    pub fn params(&self) -> &NegotiatedParameters {
        &self.params
    }

    /// Negotiated parameters, mutably.
    pub fn params_mut(&mut self) -> &mut NegotiatedParameters {
        &mut self.params
    }

    /// Selected version, or the configured one before ServerHello.
    pub fn chosen_protocol_version(&self) -> ProtocolVersion {
        self.params.selected_protocol_version.unwrap_or(self.config.highest_protocol_version)
    }

    /// Selected suite, or the first configured one before ServerHello.
    pub fn chosen_cipher_suite(&self) -> CipherSuite {
        self.params
            .selected_cipher_suite
            .or_else(|| self.config.cipher_suites.first().copied())
            .unwrap_or(CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA)
    }

    /// Selected compression, or the first configured one.
    pub fn chosen_compression(&self) -> CompressionMethod {
        self.params
            .selected_compression
            .or_else(|| self.config.compression_methods.first().copied())
            .unwrap_or(CompressionMethod::NULL)
    }

    /// Negotiated master secret, or the configured default.
    pub fn chosen_master_secret(&self) -> &[u8] {
        self.params.master_secret.as_deref().unwrap_or(&self.config.default_master_secret)
    }

    /// Client random, which must have been set.
    pub fn client_random(&self) -> Result<&[u8], ContextError> {
        required(self.params.client_random.as_deref(), "client_random")
    }

    /// Server random, which must have been set.
    pub fn server_random(&self) -> Result<&[u8], ContextError> {
        required(self.params.server_random.as_deref(), "server_random")
    }

    /// Queue a received message without applying it.
    pub fn enqueue_message(&mut self, message: ProtocolMessage) {
        self.message_buffer.push_back(message);
    }

    /// Buffered messages, oldest first.
    pub fn buffered_messages(&self) -> impl Iterator<Item = &ProtocolMessage> {
        self.message_buffer.iter()
    }

    /// Number of buffered messages.
    pub fn buffered_len(&self) -> usize {
        self.message_buffer.len()
    }

    /// Remove and return all buffered messages, oldest first.
    pub fn drain_buffer(&mut self) -> Vec<ProtocolMessage> {
        self.message_buffer.drain(..).collect()
    }

    /// Drop all buffered messages.
    pub fn clear_buffer(&mut self) {
        self.message_buffer.clear();
    }

    /// DTLS cookie.
    pub fn dtls_cookie(&self) -> Option<&[u8]> {
        self.dtls_cookie.as_deref()
    }

    /// Set the DTLS cookie.
    pub fn set_dtls_cookie(&mut self, cookie: Option<Vec<u8>>) {
        self.dtls_cookie = cookie;
    }

    /// Order of randoms in prepare-after-parse computations.
    pub fn reverse_prepare_after_parse(&self) -> bool {
        self.reverse_prepare_after_parse
    }

    /// Flip the prepare-after-parse order.
    pub fn set_reverse_prepare_after_parse(&mut self, reverse: bool) {
        self.reverse_prepare_after_parse = reverse;
    }

    /// Recorded non-fatal failures.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Recorded non-fatal failures, mutably.
    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    /// Current time from the environment.
    pub fn unix_time(&self) -> u32 {
        self.env.unix_time()
    }

    /// `len` random bytes from the environment.
    pub fn random_bytes(&mut self, len: usize) -> Vec<u8> {
        let mut out = vec![0u8; len];
        self.env.fill_random(&mut out);
        out
    }

    /// Discard everything learned since creation. Configuration, alias and
    /// environment are kept.
    pub fn reset(&mut self) {
        self.digest = TranscriptDigest::new(self.config.digest_algorithm);
        self.params = NegotiatedParameters::default();
        self.message_buffer.clear();
        self.dtls_cookie = None;
        self.reverse_prepare_after_parse = self.config.reverse_prepare_after_parse;
        self.talking_end = self.config.connection_end;
        self.diagnostics.clear();
    }
}

fn required<'a, T: ?Sized>(
    value: Option<&'a T>,
    name: &'static str,
) -> Result<&'a T, ContextError> {
    value.ok_or(ContextError::UnsetParameter(name))
}

#[cfg(test)]
mod tests {
    use tlsmith_proto::Alert;

    use super::*;

    #[test]
    fn unset_parameter_is_reported_by_name() {
        let context = TlsContext::new("client", TlsConfig::default());
        assert_eq!(context.client_random(), Err(ContextError::UnsetParameter("client_random")));
    }

    #[test]
    fn chosen_values_fall_back_on_config() {
        let mut context = TlsContext::new("client", TlsConfig::default());
        assert_eq!(context.chosen_cipher_suite(), CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA);
        assert_eq!(context.chosen_master_secret(), &[0u8; 48][..]);

        context.params_mut().selected_cipher_suite = Some(CipherSuite(0x1301));
        assert_eq!(context.chosen_cipher_suite(), CipherSuite(0x1301));
    }

    #[test]
    fn buffer_is_fifo() {
        let mut context = TlsContext::new("client", TlsConfig::default());
        context.enqueue_message(Alert::forced(1, 0).into());
        context.enqueue_message(Alert::forced(2, 40).into());

        let drained = context.drain_buffer();
        assert_eq!(drained[0], ProtocolMessage::from(Alert::forced(1, 0)));
        assert_eq!(drained[1], ProtocolMessage::from(Alert::forced(2, 40)));
        assert_eq!(context.buffered_len(), 0);
    }

    #[test]
    fn reset_keeps_configuration() {
        let mut context = TlsContext::new("server", TlsConfig::server());
        context.append_digest(&[1, 2, 3]);
        context.params_mut().ccs_count = 2;
        context.set_reverse_prepare_after_parse(true);

        context.reset();

        assert!(context.digest().is_empty());
        assert_eq!(context.params(), &NegotiatedParameters::default());
        assert!(!context.reverse_prepare_after_parse());
        assert_eq!(context.connection_end(), ConnectionEnd::Server);
    }
}
