//! External signal routing: inbound resume calls matched to suspended
//! executions by exact routing key.

use crate::error::{Result, WaitpointError};
use crate::result::CompletionResult;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::oneshot;
use tracing::{debug, info};
use uuid::Uuid;

/// When the router answers the matched inbound call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckMode {
    /// Acknowledge as soon as the signal is handed to the suspended job
    OnReceived,
    /// Hold the inbound call open until the resumed continuation finishes,
    /// producing its final result as the response
    AfterCompletion,
}

/// Acknowledgment policy a suspended job configures for its resume call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckPolicy {
    pub mode: AckMode,
    /// Response code the transport should return for a matched call
    pub response_code: u16,
}

impl Default for AckPolicy {
    fn default() -> Self {
        Self {
            mode: AckMode::OnReceived,
            response_code: 200,
        }
    }
}

impl AckPolicy {
    /// Acknowledge immediately with the default response code
    pub fn on_received() -> Self {
        Self::default()
    }

    /// Hold the call open for the continuation's final result
    pub fn after_completion() -> Self {
        Self {
            mode: AckMode::AfterCompletion,
            ..Self::default()
        }
    }

    /// Override the response code
    pub fn with_response_code(mut self, code: u16) -> Self {
        self.response_code = code;
        self
    }
}

/// An inbound resume call. Headers, query, and body are opaque to the
/// router; it matches only on the routing key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundSignal {
    /// Generated token or provided absolute address this call targets
    pub token_or_address: String,
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Value,
}

impl InboundSignal {
    /// A signal for the given routing key with an empty payload
    pub fn new(token_or_address: impl Into<String>) -> Self {
        Self {
            token_or_address: token_or_address.into(),
            headers: HashMap::new(),
            query: HashMap::new(),
            body: Value::Null,
        }
    }

    /// Attach a body payload
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Attach a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Attach a query parameter
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }
}

/// Router's answer to an inbound call
#[derive(Debug)]
pub enum Acknowledgment {
    /// Signal matched a suspended execution; respond right away
    Received { response_code: u16 },
    /// Signal matched; the transport should hold the call open and respond
    /// with the completion result once the receiver yields it
    Deferred {
        response_code: u16,
        result: oneshot::Receiver<CompletionResult>,
    },
    /// No suspended execution is watching this key. Expected for stale,
    /// duplicate, or forged calls; the caller is rejected cleanly.
    NoMatchingSuspension,
}

impl Acknowledgment {
    /// Whether the signal reached a suspended execution
    pub fn matched(&self) -> bool {
        !matches!(self, Acknowledgment::NoMatchingSuspension)
    }

    /// Convert a rejection into the error taxonomy, for transports that
    /// answer unmatched calls with an error response. The rejection never
    /// propagates to any suspended job.
    pub fn require_match(self, key: &str) -> Result<Acknowledgment> {
        match self {
            Acknowledgment::NoMatchingSuspension => {
                Err(WaitpointError::NoMatchingSuspension(key.to_string()))
            }
            ack => Ok(ack),
        }
    }
}

/// What the suspension controller holds while suspended on a signal
#[derive(Debug)]
pub struct WaitRegistration {
    /// Resolves with the matched inbound signal; at most once
    pub signal_rx: oneshot::Receiver<InboundSignal>,
    /// Present for [`AckMode::AfterCompletion`]: the controller sends the
    /// final completion result here so the held-open call can answer with it
    pub result_tx: Option<oneshot::Sender<CompletionResult>>,
}

struct RegisteredWait {
    record_id: Uuid,
    ack: AckPolicy,
    signal_tx: oneshot::Sender<InboundSignal>,
    result_rx: Option<oneshot::Receiver<CompletionResult>>,
}

/// Matches inbound calls to suspended executions.
///
/// The registry is the only shared mutable structure in the crate: insert on
/// suspend, lookup-and-remove on signal match, remove on cancellation or
/// deadline expiry. Removing the entry before completing the oneshot sender
/// makes resume at-most-once even under concurrent duplicate delivery.
///
/// Each router instance owns its registry; controllers under test get their
/// own and do not interfere.
#[derive(Default)]
pub struct SignalRouter {
    pending: Mutex<HashMap<String, RegisteredWait>>,
}

impl SignalRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start watching a routing key for one suspended execution.
    ///
    /// Key uniqueness is the correlation builder's responsibility; the
    /// router only refuses to silently replace a live registration.
    pub fn register(
        &self,
        key: impl Into<String>,
        record_id: Uuid,
        ack: AckPolicy,
    ) -> Result<WaitRegistration> {
        let key = key.into();
        let (signal_tx, signal_rx) = oneshot::channel();
        let (result_tx, result_rx) = if ack.mode == AckMode::AfterCompletion {
            let (tx, rx) = oneshot::channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let mut pending = self.pending.lock();
        if pending.contains_key(&key) {
            return Err(WaitpointError::Other(format!(
                "correlation key '{}' is already awaiting resume",
                key
            )));
        }
        pending.insert(
            key,
            RegisteredWait {
                record_id,
                ack,
                signal_tx,
                result_rx,
            },
        );

        Ok(WaitRegistration {
            signal_rx,
            result_tx,
        })
    }

    /// Single entry point for inbound calls.
    ///
    /// Exact-match lookup with remove-then-send semantics: the first call for
    /// a key consumes the registration, every later call gets
    /// [`Acknowledgment::NoMatchingSuspension`] without touching any record.
    pub fn deliver(&self, signal: InboundSignal) -> Acknowledgment {
        let entry = self.pending.lock().remove(&signal.token_or_address);
        let Some(wait) = entry else {
            debug!(
                key = %signal.token_or_address,
                "no matching suspension for inbound signal"
            );
            return Acknowledgment::NoMatchingSuspension;
        };

        let key = signal.token_or_address.clone();
        let response_code = wait.ack.response_code;
        if wait.signal_tx.send(signal).is_err() {
            // The suspended side stopped listening between lookup and send;
            // same outcome as an unknown key.
            debug!(key = %key, "suspension already left its waiting state");
            return Acknowledgment::NoMatchingSuspension;
        }

        info!(key = %key, record_id = %wait.record_id, "inbound signal matched");
        match wait.result_rx {
            Some(result) => Acknowledgment::Deferred {
                response_code,
                result,
            },
            None => Acknowledgment::Received { response_code },
        }
    }

    /// Stop watching a key. Idempotent; returns whether a registration was
    /// removed.
    pub fn deregister(&self, key: &str) -> bool {
        self.pending.lock().remove(key).is_some()
    }

    /// Whether a key is currently awaiting resume
    pub fn is_registered(&self, key: &str) -> bool {
        self.pending.lock().contains_key(key)
    }

    /// Number of keys currently awaiting resume
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl std::fmt::Debug for SignalRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalRouter")
            .field("pending", &self.pending_count())
            .finish()
    }
}
