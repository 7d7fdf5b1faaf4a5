//! Channel classification for the Ripple protocol.
//!
//! A channel's kind is derived deterministically from its name prefix.
//! Detection is case-sensitive, matches at the start of the name only,
//! and is checked once at channel creation.

/// Name prefix for private channels.
pub const PRIVATE_PREFIX: &str = "private-";

/// Name prefix for end-to-end encrypted private channels.
pub const PRIVATE_ENCRYPTED_PREFIX: &str = "private-encrypted-";

/// Name prefix for presence channels.
pub const PRESENCE_PREFIX: &str = "presence-";

/// The kind of a channel, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// No recognized prefix; open to any client, no authorization.
    Public,
    /// `private-` prefix; subscription requires an authorization token.
    Private,
    /// `private-encrypted-` prefix; authorized and end-to-end encrypted.
    PrivateEncrypted,
    /// `presence-` prefix; authorized, with member tracking.
    Presence,
}

impl ChannelKind {
    /// Classify a channel name by its prefix.
    ///
    /// The `private-encrypted-` prefix is checked before `private-` since
    /// the former is a strict extension of the latter.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        if name.starts_with(PRIVATE_ENCRYPTED_PREFIX) {
            ChannelKind::PrivateEncrypted
        } else if name.starts_with(PRIVATE_PREFIX) {
            ChannelKind::Private
        } else if name.starts_with(PRESENCE_PREFIX) {
            ChannelKind::Presence
        } else {
            ChannelKind::Public
        }
    }

    /// Whether subscribing to this kind requires an authorization token.
    #[must_use]
    pub fn requires_authorization(&self) -> bool {
        !matches!(self, ChannelKind::Public)
    }

    /// Whether client-originated events may be triggered on this kind.
    ///
    /// Public channels forbid client events entirely; encrypted channels
    /// forbid them because the client cannot produce valid ciphertext.
    #[must_use]
    pub fn allows_client_events(&self) -> bool {
        matches!(self, ChannelKind::Private | ChannelKind::Presence)
    }

    /// Whether inbound payloads on this kind must be decrypted.
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        matches!(self, ChannelKind::PrivateEncrypted)
    }

    /// Whether this kind tracks channel membership.
    #[must_use]
    pub fn is_presence(&self) -> bool {
        matches!(self, ChannelKind::Presence)
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChannelKind::Public => "public",
            ChannelKind::Private => "private",
            ChannelKind::PrivateEncrypted => "private-encrypted",
            ChannelKind::Presence => "presence",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_detection() {
        assert_eq!(ChannelKind::from_name("chat"), ChannelKind::Public);
        assert_eq!(ChannelKind::from_name("private-chat"), ChannelKind::Private);
        assert_eq!(
            ChannelKind::from_name("private-encrypted-chat"),
            ChannelKind::PrivateEncrypted
        );
        assert_eq!(
            ChannelKind::from_name("presence-lobby"),
            ChannelKind::Presence
        );
    }

    #[test]
    fn test_prefix_must_start_the_name() {
        assert_eq!(
            ChannelKind::from_name("my-private-chat"),
            ChannelKind::Public
        );
        assert_eq!(ChannelKind::from_name("xpresence-a"), ChannelKind::Public);
    }

    #[test]
    fn test_detection_is_case_sensitive() {
        assert_eq!(ChannelKind::from_name("Private-chat"), ChannelKind::Public);
        assert_eq!(ChannelKind::from_name("PRESENCE-a"), ChannelKind::Public);
    }

    #[test]
    fn test_encrypted_wins_over_private() {
        let kind = ChannelKind::from_name("private-encrypted-secrets");
        assert_eq!(kind, ChannelKind::PrivateEncrypted);
        assert!(kind.requires_authorization());
        assert!(!kind.allows_client_events());
        assert!(kind.is_encrypted());
    }

    #[test]
    fn test_capabilities() {
        assert!(!ChannelKind::Public.requires_authorization());
        assert!(!ChannelKind::Public.allows_client_events());
        assert!(ChannelKind::Private.allows_client_events());
        assert!(ChannelKind::Presence.allows_client_events());
        assert!(ChannelKind::Presence.is_presence());
        assert!(!ChannelKind::Private.is_presence());
    }
}
