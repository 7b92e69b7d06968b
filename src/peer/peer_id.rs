use std::fmt;

use rand::Rng as _;

use crate::constants::CLIENT_PREFIX;
use crate::metainfo::hex_encode;

/// A 20-byte peer identifier.
///
/// Generated IDs follow the Azureus-style format `-LE0001-<12 random bytes>`,
/// where `LE` identifies this client and `0001` is the version.
///
/// # Examples
///
/// ```
/// use leech::peer::PeerId;
///
/// let peer_id = PeerId::generate();
/// assert_eq!(peer_id.as_bytes().len(), 20);
/// assert_eq!(peer_id.client_id(), Some("LE0001"));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(pub [u8; 20]);

impl PeerId {
    /// Generates a new random peer ID with the client prefix.
    pub fn generate() -> Self {
        let mut id = [0u8; 20];
        id[..8].copy_from_slice(CLIENT_PREFIX.as_bytes());
        rand::rng().fill(&mut id[8..]);
        Self(id)
    }

    /// Returns `None` if the slice is not exactly 20 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex_encode(&self.0)
    }

    /// The 6-character client ID (e.g. "UT3500") of an Azureus-style ID.
    pub fn client_id(&self) -> Option<&str> {
        if self.0[0] == b'-' && self.0[7] == b'-' {
            std::str::from_utf8(&self.0[1..7]).ok()
        } else {
            None
        }
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(client) = self.client_id() {
            write!(f, "PeerId({})", client)
        } else {
            write!(f, "PeerId({:02x?})", &self.0[..8])
        }
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            if byte.is_ascii_alphanumeric() || *byte == b'-' {
                write!(f, "{}", *byte as char)?;
            } else {
                write!(f, "%{:02x}", byte)?;
            }
        }
        Ok(())
    }
}

/// Source of local peer IDs.
///
/// Sessions never reach for ambient randomness; the pool asks its generator
/// for an ID per connection, so tests can pin IDs down.
pub trait IdentityGenerator: Send + Sync {
    fn generate(&self) -> PeerId;
}

/// Fresh random ID for every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdentity;

impl IdentityGenerator for RandomIdentity {
    fn generate(&self) -> PeerId {
        PeerId::generate()
    }
}

/// Always hands out the same ID.
#[derive(Debug, Clone, Copy)]
pub struct FixedIdentity(pub PeerId);

impl IdentityGenerator for FixedIdentity {
    fn generate(&self) -> PeerId {
        self.0
    }
}
