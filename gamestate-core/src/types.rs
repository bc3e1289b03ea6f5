//! Identity types shared by every record in the game-state model.
//!
//! All identifiers are UUID newtypes so a `PlayerId` can never be passed
//! where a `PartyId` is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{GameStateError, Result};

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parse an identifier from its hyphenated string form.
            ///
            /// # Errors
            /// Returns [`GameStateError::InvalidInput`] if `s` is not a UUID.
            pub fn parse(s: &str) -> Result<Self> {
                Uuid::parse_str(s).map(Self).map_err(|e| {
                    GameStateError::InvalidInput(format!(
                        "{} is not a valid {}: {e}",
                        s,
                        stringify!($name)
                    ))
                })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Internal, stable identifier of a player.
    PlayerId
);
uuid_id!(
    /// Identifier of a party.
    PartyId
);
uuid_id!(
    /// Identifier of a single equipment record.
    EquipmentId
);

// ---------------------------------------------------------------------------
// Wallet
// ---------------------------------------------------------------------------

/// External lookup key for a player.
///
/// Wallet addresses are case-sensitive and stored verbatim; the only
/// validation is that they are not blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Validate and wrap a wallet address.
    ///
    /// # Errors
    /// Returns [`GameStateError::InvalidInput`] if `raw` is empty or only
    /// whitespace.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(GameStateError::InvalidInput(
                "wallet address is required".to_string(),
            ));
        }
        Ok(Self(raw))
    }

    /// The address exactly as supplied.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for WalletAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
