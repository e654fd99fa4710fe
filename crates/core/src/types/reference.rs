//! The dual client/server cart item reference.
//!
//! A cart item is addressable by two identifiers with different lifecycles:
//! the [`ClientRef`] it was born with, and the [`ServerId`] the remote store
//! assigns once a create succeeds. Callers hold whichever one they last saw.
//! `CartRef` is the tagged union they hand back to the cart, and
//! [`CartItem::matches`](crate::types::CartItem::matches) is the single place
//! that knows how to compare it against an item - call sites never re-implement
//! the match-by-either-identifier rule.

use uuid::Uuid;

use super::id::{ClientRef, ServerId};

/// A reference to a cart item by either of its identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CartRef {
    /// The locally-minted identifier, present from creation.
    Client(ClientRef),
    /// The remote store's identifier, present once a create has succeeded.
    Server(ServerId),
}

impl CartRef {
    /// Parse a raw reference string, as received over HTTP.
    ///
    /// Client references are UUIDs, so a UUID-shaped string is taken as a
    /// client reference and anything else as a server identifier. Parsing
    /// never fails: the worst case is a reference that matches no item.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if Uuid::parse_str(raw).is_ok() {
            Self::Client(ClientRef::from(raw))
        } else {
            Self::Server(ServerId::new(raw))
        }
    }
}

impl std::fmt::Display for CartRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Client(client_ref) => write!(f, "{client_ref}"),
            Self::Server(server_id) => write!(f, "{server_id}"),
        }
    }
}

impl From<ClientRef> for CartRef {
    fn from(client_ref: ClientRef) -> Self {
        Self::Client(client_ref)
    }
}

impl From<ServerId> for CartRef {
    fn from(server_id: ServerId) -> Self {
        Self::Server(server_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uuid_is_client_ref() {
        let client_ref = ClientRef::generate();
        let parsed = CartRef::parse(client_ref.as_str());
        assert_eq!(parsed, CartRef::Client(client_ref));
    }

    #[test]
    fn test_parse_non_uuid_is_server_id() {
        assert_eq!(CartRef::parse("17"), CartRef::Server(ServerId::new("17")));
        assert_eq!(
            CartRef::parse("a1b2c3"),
            CartRef::Server(ServerId::new("a1b2c3"))
        );
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        let server_ref = CartRef::Server(ServerId::new("abc123"));
        assert_eq!(CartRef::parse(&server_ref.to_string()), server_ref);

        let client_ref = CartRef::from(ClientRef::generate());
        assert_eq!(CartRef::parse(&client_ref.to_string()), client_ref);
    }
}
