//! Correlation descriptors: how a future inbound signal maps back to a
//! suspended execution.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Prefix for generated correlation tokens
pub const TOKEN_PREFIX: &str = "wp";

/// Identifies how an inbound resume signal is matched to a suspended
/// execution. Exactly one variant is active per suspended job; immutable
/// once chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CorrelationDescriptor {
    /// Freshly minted path token plus the address at which the host will
    /// receive the inbound call
    Generated { token: String, resume_url: String },
    /// Caller-supplied absolute resume address, used verbatim; no token is
    /// minted
    Provided { address: String },
}

impl CorrelationDescriptor {
    /// Build a descriptor from an optional caller-supplied resume address.
    ///
    /// A present, non-blank address (after trimming) yields
    /// [`CorrelationDescriptor::Provided`] with that address unchanged.
    /// Otherwise a `Generated` descriptor is minted: the token combines a
    /// high-resolution timestamp with random bits, and the resume URL is
    /// `<callback_base>/<token>`, with an optional suffix segment appended
    /// so multiple waits in one workflow get distinct addresses.
    ///
    /// Total function, no side effects: the token is not registered with the
    /// signal router until the controller suspends on it.
    pub fn build(supplied: Option<&str>, callback_base: &str, suffix: Option<&str>) -> Self {
        if let Some(address) = supplied {
            let trimmed = address.trim();
            if !trimmed.is_empty() {
                return Self::Provided {
                    address: trimmed.to_string(),
                };
            }
        }

        let token = mint_token();
        let base = callback_base.trim_end_matches('/');
        let resume_url = match suffix.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => format!("{}/{}/{}", base, token, s.trim_matches('/')),
            None => format!("{}/{}", base, token),
        };
        Self::Generated { token, resume_url }
    }

    /// The exact-match key the signal router watches for: the token for
    /// generated descriptors, the full address for provided ones.
    pub fn routing_key(&self) -> &str {
        match self {
            Self::Generated { token, .. } => token,
            Self::Provided { address } => address,
        }
    }

    /// The address an external party must call to resume the execution
    pub fn resume_address(&self) -> &str {
        match self {
            Self::Generated { resume_url, .. } => resume_url,
            Self::Provided { address } => address,
        }
    }

    /// Whether this descriptor was minted rather than caller-supplied
    pub fn is_generated(&self) -> bool {
        matches!(self, Self::Generated { .. })
    }
}

/// Mint a globally unique path token: `<prefix>-<high-res-timestamp>-<random>`.
///
/// Collision requires two mints in the same nanosecond to also draw the same
/// 64 random bits, which is negligible at any realistic submission rate.
fn mint_token() -> String {
    let now = Utc::now();
    let nanos = now
        .timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_millis());
    let salt: u64 = rand::random();
    format!("{}-{}-{:016x}", TOKEN_PREFIX, nanos, salt)
}
