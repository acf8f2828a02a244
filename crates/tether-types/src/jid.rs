//! Addresses of users, devices and groups.
//!
//! Text form: `user@server` for a user, `user:device@server` for one of its
//! devices and `user.agent:device@server` when an agent is set. A bare
//! `server` (no `@`) is a server address.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Server of regular user addresses.
pub const DEFAULT_USER_SERVER: &str = "s.whatsapp.net";

/// Server of group addresses.
pub const GROUP_SERVER: &str = "g.us";

/// Parse failures for [`Jid`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JidError {
    #[error("empty address")]
    Empty,

    #[error("invalid device part in {0:?}")]
    InvalidDevice(String),

    #[error("invalid agent part in {0:?}")]
    InvalidAgent(String),
}

/// A user, device or group address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Jid {
    pub user: String,
    pub agent: u8,
    pub device: u16,
    pub server: String,
}

impl Jid {
    /// A user address with no device component.
    pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            agent: 0,
            device: 0,
            server: server.into(),
        }
    }

    /// A device address on the default user server.
    pub fn device(user: impl Into<String>, device: u16) -> Self {
        Self {
            user: user.into(),
            agent: 0,
            device,
            server: DEFAULT_USER_SERVER.to_string(),
        }
    }

    /// The same address without agent and device.
    pub fn to_non_ad(&self) -> Self {
        Self::new(self.user.clone(), self.server.clone())
    }

    /// True if this address carries a device or agent component.
    pub fn is_ad(&self) -> bool {
        self.agent > 0 || self.device > 0
    }

    /// Peer address used as the key of identity and session records.
    pub fn signal_address(&self) -> String {
        if self.agent > 0 {
            format!("{}_{}:{}", self.user, self.agent, self.device)
        } else {
            format!("{}:{}", self.user, self.device)
        }
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.agent > 0 {
            write!(f, "{}.{}:{}@{}", self.user, self.agent, self.device, self.server)
        } else if self.device > 0 {
            write!(f, "{}:{}@{}", self.user, self.device, self.server)
        } else if self.user.is_empty() {
            write!(f, "{}", self.server)
        } else {
            write!(f, "{}@{}", self.user, self.server)
        }
    }
}

impl FromStr for Jid {
    type Err = JidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(JidError::Empty);
        }
        let Some((user_part, server)) = s.split_once('@') else {
            return Ok(Self::new("", s));
        };

        let (user_agent, device) = match user_part.split_once(':') {
            Some((ua, dev)) => (
                ua,
                dev.parse::<u16>()
                    .map_err(|_| JidError::InvalidDevice(s.to_string()))?,
            ),
            None => (user_part, 0),
        };
        let (user, agent) = match user_agent.split_once('.') {
            Some((user, agent)) => (
                user,
                agent
                    .parse::<u8>()
                    .map_err(|_| JidError::InvalidAgent(s.to_string()))?,
            ),
            None => (user_agent, 0),
        };

        Ok(Self {
            user: user.to_string(),
            agent,
            device,
            server: server.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_forms() {
        assert_eq!(Jid::new("123", DEFAULT_USER_SERVER).to_string(), "123@s.whatsapp.net");
        assert_eq!(Jid::device("123", 4).to_string(), "123:4@s.whatsapp.net");
        let agent = Jid {
            user: "123".into(),
            agent: 1,
            device: 4,
            server: DEFAULT_USER_SERVER.into(),
        };
        assert_eq!(agent.to_string(), "123.1:4@s.whatsapp.net");
        assert_eq!(Jid::new("", GROUP_SERVER).to_string(), "g.us");
    }

    #[test]
    fn test_parse_roundtrip() {
        for text in [
            "123@s.whatsapp.net",
            "123:4@s.whatsapp.net",
            "123.1:4@s.whatsapp.net",
            "g.us",
        ] {
            let jid: Jid = text.parse().expect("parse");
            assert_eq!(jid.to_string(), text);
        }
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<Jid>(), Err(JidError::Empty));
        assert!(matches!("1:x@s".parse::<Jid>(), Err(JidError::InvalidDevice(_))));
        assert!(matches!("1.x:2@s".parse::<Jid>(), Err(JidError::InvalidAgent(_))));
    }

    #[test]
    fn test_non_ad_and_signal_address() {
        let jid = Jid::device("555", 7);
        assert!(jid.is_ad());
        assert!(!jid.to_non_ad().is_ad());
        assert_eq!(jid.signal_address(), "555:7");
    }

    #[test]
    fn test_serde_roundtrip() {
        let jid = Jid::device("555", 7);
        let json = serde_json::to_string(&jid).expect("serialize");
        let back: Jid = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, jid);
    }
}
