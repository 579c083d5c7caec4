//! WebSocket close codes
//!
//! Codes the gateway sends when it closes the connection.

/// Gateway WebSocket close codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CloseCode {
    UnknownError = 4000,
    UnknownOpcode = 4001,
    DecodeError = 4002,
    /// Sent a payload before Identify
    NotAuthenticated = 4003,
    /// The token in Identify was rejected
    AuthenticationFailed = 4004,
    /// Sent Identify twice
    AlreadyAuthenticated = 4005,
    SessionNoLongerValid = 4006,
    /// Resume carried a sequence the server does not know
    InvalidSequence = 4007,
    RateLimited = 4008,
    SessionTimeout = 4009,
    InvalidShard = 4010,
    ShardingRequired = 4011,
    InvalidApiVersion = 4012,
    InvalidIntents = 4013,
    DisallowedIntents = 4014,
}

impl CloseCode {
    /// Create a `CloseCode` from a raw u16 value
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            4000 => Some(Self::UnknownError),
            4001 => Some(Self::UnknownOpcode),
            4002 => Some(Self::DecodeError),
            4003 => Some(Self::NotAuthenticated),
            4004 => Some(Self::AuthenticationFailed),
            4005 => Some(Self::AlreadyAuthenticated),
            4006 => Some(Self::SessionNoLongerValid),
            4007 => Some(Self::InvalidSequence),
            4008 => Some(Self::RateLimited),
            4009 => Some(Self::SessionTimeout),
            4010 => Some(Self::InvalidShard),
            4011 => Some(Self::ShardingRequired),
            4012 => Some(Self::InvalidApiVersion),
            4013 => Some(Self::InvalidIntents),
            4014 => Some(Self::DisallowedIntents),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Whether reconnecting can succeed after the server closed with this code
    ///
    /// Credentials, shard layout, version and intents are fixed for the
    /// lifetime of a session, so retrying after those is pointless.
    #[must_use]
    pub const fn should_reconnect(self) -> bool {
        !matches!(
            self,
            Self::AuthenticationFailed
                | Self::InvalidShard
                | Self::ShardingRequired
                | Self::InvalidApiVersion
                | Self::InvalidIntents
                | Self::DisallowedIntents
        )
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::UnknownError => "Unknown error occurred",
            Self::UnknownOpcode => "Invalid opcode sent",
            Self::DecodeError => "Invalid payload encoding",
            Self::NotAuthenticated => "Not authenticated",
            Self::AuthenticationFailed => "Authentication failed",
            Self::AlreadyAuthenticated => "Already authenticated",
            Self::SessionNoLongerValid => "Session no longer valid",
            Self::InvalidSequence => "Invalid sequence number",
            Self::RateLimited => "Rate limited",
            Self::SessionTimeout => "Session timeout",
            Self::InvalidShard => "Invalid shard configuration",
            Self::ShardingRequired => "Sharding required",
            Self::InvalidApiVersion => "Invalid API version",
            Self::InvalidIntents => "Invalid intents",
            Self::DisallowedIntents => "Disallowed intents",
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_u16())
    }
}
