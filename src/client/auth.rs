//! Authentication configuration for SNMP clients.
//!
//! [`Auth`] covers all three versions: community strings for v1/v2c,
//! USM credentials for v3 via the [`UsmBuilder`].

use bytes::Bytes;

use crate::v3::{AuthProtocol, PrivProtocol};

/// SNMP version for community-based authentication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommunityVersion {
    /// SNMPv1
    V1,
    /// SNMPv2c
    #[default]
    V2c,
}

/// Authentication configuration.
#[derive(Debug, Clone)]
pub enum Auth {
    /// Community string authentication (SNMPv1 or v2c).
    Community {
        /// SNMP version (V1 or V2c)
        version: CommunityVersion,
        /// Community string
        community: String,
    },
    /// User-based Security Model (SNMPv3).
    Usm(UsmAuth),
}

impl Default for Auth {
    fn default() -> Self {
        Auth::v2c("public")
    }
}

impl Auth {
    /// SNMPv1 community authentication.
    pub fn v1(community: impl Into<String>) -> Self {
        Auth::Community {
            version: CommunityVersion::V1,
            community: community.into(),
        }
    }

    /// SNMPv2c community authentication.
    pub fn v2c(community: impl Into<String>) -> Self {
        Auth::Community {
            version: CommunityVersion::V2c,
            community: community.into(),
        }
    }

    /// Start building SNMPv3 USM credentials.
    ///
    /// ```
    /// use usnmp::{Auth, AuthProtocol, PrivProtocol};
    ///
    /// // noAuthNoPriv
    /// let auth: Auth = Auth::usm("readonly").into();
    ///
    /// // authPriv
    /// let auth: Auth = Auth::usm("admin")
    ///     .auth(AuthProtocol::Sha1, "authpassword")
    ///     .privacy(PrivProtocol::Aes128, "privpassword")
    ///     .into();
    /// ```
    pub fn usm(username: impl Into<String>) -> UsmBuilder {
        UsmBuilder::new(username)
    }
}

/// SNMPv3 USM credentials.
#[derive(Clone)]
pub struct UsmAuth {
    /// User name (securityName)
    pub username: String,
    /// Authentication protocol and password
    pub auth: Option<(AuthProtocol, Vec<u8>)>,
    /// Privacy protocol and password
    pub privacy: Option<(PrivProtocol, Vec<u8>)>,
    /// Context name; empty in most deployments
    pub context_name: Bytes,
}

impl std::fmt::Debug for UsmAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsmAuth")
            .field("username", &self.username)
            .field("auth", &self.auth.as_ref().map(|(p, _)| p))
            .field("privacy", &self.privacy.as_ref().map(|(p, _)| p))
            .field("context_name", &self.context_name)
            .finish()
    }
}

/// Builder for SNMPv3 USM credentials.
pub struct UsmBuilder {
    username: String,
    auth: Option<(AuthProtocol, Vec<u8>)>,
    privacy: Option<(PrivProtocol, Vec<u8>)>,
    context_name: Bytes,
}

impl UsmBuilder {
    /// Create a builder with the given username (noAuthNoPriv so far).
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            auth: None,
            privacy: None,
            context_name: Bytes::new(),
        }
    }

    /// Add authentication (authNoPriv, or authPriv with
    /// [`privacy`](Self::privacy)).
    pub fn auth(mut self, protocol: AuthProtocol, password: impl Into<Vec<u8>>) -> Self {
        self.auth = Some((protocol, password.into()));
        self
    }

    /// Add privacy (requires [`auth`](Self::auth) too; noAuthPriv is
    /// rejected at connect time).
    pub fn privacy(mut self, protocol: PrivProtocol, password: impl Into<Vec<u8>>) -> Self {
        self.privacy = Some((protocol, password.into()));
        self
    }

    /// Set the context name (default empty).
    pub fn context_name(mut self, name: impl Into<Bytes>) -> Self {
        self.context_name = name.into();
        self
    }

    /// Finish into [`UsmAuth`].
    pub fn build(self) -> UsmAuth {
        UsmAuth {
            username: self.username,
            auth: self.auth,
            privacy: self.privacy,
            context_name: self.context_name,
        }
    }
}

impl From<UsmBuilder> for Auth {
    fn from(builder: UsmBuilder) -> Self {
        Auth::Usm(builder.build())
    }
}

impl From<UsmAuth> for Auth {
    fn from(auth: UsmAuth) -> Self {
        Auth::Usm(auth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_community_constructors() {
        match Auth::v1("private") {
            Auth::Community { version, community } => {
                assert_eq!(version, CommunityVersion::V1);
                assert_eq!(community, "private");
            }
            _ => panic!("expected community auth"),
        }

        match Auth::default() {
            Auth::Community { version, community } => {
                assert_eq!(version, CommunityVersion::V2c);
                assert_eq!(community, "public");
            }
            _ => panic!("expected community auth"),
        }
    }

    #[test]
    fn test_usm_builder() {
        let auth: Auth = Auth::usm("admin")
            .auth(AuthProtocol::Sha1, "authpass123")
            .privacy(PrivProtocol::Aes128, "privpass123")
            .into();

        match auth {
            Auth::Usm(usm) => {
                assert_eq!(usm.username, "admin");
                assert_eq!(usm.auth.as_ref().unwrap().0, AuthProtocol::Sha1);
                assert_eq!(usm.privacy.as_ref().unwrap().0, PrivProtocol::Aes128);
                assert!(usm.context_name.is_empty());
            }
            _ => panic!("expected USM auth"),
        }
    }

    #[test]
    fn test_usm_debug_hides_passwords() {
        let usm = Auth::usm("admin")
            .auth(AuthProtocol::Md5, "supersecret")
            .build();
        let dbg = format!("{:?}", usm);
        assert!(!dbg.contains("supersecret"));
    }
}
