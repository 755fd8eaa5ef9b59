use std::fmt;

/// RADIUS packet code (RFC 2865 Section 3)
///
/// Any byte value is representable; the IANA-assigned ones have constants
/// and names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Code(pub u8);

impl Code {
    /// Access-Request (1)
    pub const ACCESS_REQUEST: Code = Code(1);
    /// Access-Accept (2)
    pub const ACCESS_ACCEPT: Code = Code(2);
    /// Access-Reject (3)
    pub const ACCESS_REJECT: Code = Code(3);
    /// Accounting-Request (4) - RFC 2866
    pub const ACCOUNTING_REQUEST: Code = Code(4);
    /// Accounting-Response (5) - RFC 2866
    pub const ACCOUNTING_RESPONSE: Code = Code(5);
    /// Access-Challenge (11)
    pub const ACCESS_CHALLENGE: Code = Code(11);
    /// Status-Server (12) - RFC 5997
    pub const STATUS_SERVER: Code = Code(12);
    /// Status-Client (13) - RFC 5997
    pub const STATUS_CLIENT: Code = Code(13);
    /// Disconnect-Request (40) - RFC 5176
    pub const DISCONNECT_REQUEST: Code = Code(40);
    /// CoA-Request (43) - RFC 5176
    pub const COA_REQUEST: Code = Code(43);

    pub fn as_u8(self) -> u8 {
        self.0
    }

    /// Registered name, e.g. `"Access-Accept"`
    pub fn name(self) -> Option<&'static str> {
        NAMES
            .iter()
            .find(|(code, _)| *code == self.0)
            .map(|(_, name)| *name)
    }

    /// Look up a code by its registered name
    pub fn from_name(name: &str) -> Option<Self> {
        NAMES
            .iter()
            .find(|(_, candidate)| *candidate == name)
            .map(|(code, _)| Code(*code))
    }
}

impl From<u8> for Code {
    fn from(value: u8) -> Self {
        Code(value)
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "Code-{}", self.0),
        }
    }
}

const NAMES: &[(u8, &str)] = &[
    (1, "Access-Request"),
    (2, "Access-Accept"),
    (3, "Access-Reject"),
    (4, "Accounting-Request"),
    (5, "Accounting-Response"),
    (6, "Accounting-Status"),
    (7, "Password-Request"),
    (8, "Password-Ack"),
    (9, "Password-Reject"),
    (10, "Accounting-Message"),
    (11, "Access-Challenge"),
    (12, "Status-Server"),
    (13, "Status-Client"),
    (21, "Resource-Free-Request"),
    (22, "Resource-Free-Response"),
    (23, "Resource-Query-Request"),
    (24, "Resource-Query-Response"),
    (25, "Alternate-Resource-Reclaim-Request"),
    (26, "NAS-Reboot-Request"),
    (27, "NAS-Reboot-Response"),
    (29, "Next-Passcode"),
    (30, "New-Pin"),
    (31, "Terminate-Session"),
    (32, "Password-Expired"),
    (33, "Event-Request"),
    (34, "Event-Response"),
    (40, "Disconnect-Request"),
    (41, "Disconnect-ACK"),
    (42, "Disconnect-NAK"),
    (43, "CoA-Request"),
    (44, "CoA-ACK"),
    (45, "CoA-NAK"),
    (50, "IP-Address-Allocate"),
    (51, "IP-Address-Release"),
];
