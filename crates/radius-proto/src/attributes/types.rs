//! Compiled-in attribute registry
//!
//! Every attribute type the codec understands has a fixed [`AttributeRecord`]
//! describing its name, value length bounds and wire transform. The table is
//! indexed directly by type byte; unassigned slots are `None`.

/// Largest value an attribute can carry (255 minus type and length bytes)
pub const MAX_ATTRIBUTE_SIZE: usize = 253;

/// Wire transform applied to an attribute value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Value is sent as-is
    Plain,
    /// RFC 2865 Section 5.2 User-Password hiding
    UserPassword,
}

/// Static description of one attribute type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeRecord {
    pub name: &'static str,
    /// Minimum decoded value length
    pub min_length: usize,
    /// Maximum decoded value length
    pub max_length: usize,
    pub transform: Transform,
}

/// RADIUS Attribute Types as defined in RFC 2865 and related RFCs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AttributeType {
    /// User-Name (1) - RFC 2865
    UserName = 1,
    /// User-Password (2) - RFC 2865
    UserPassword = 2,
    /// CHAP-Password (3) - RFC 2865
    ChapPassword = 3,
    /// NAS-IP-Address (4) - RFC 2865
    NasIpAddress = 4,
    /// NAS-Port (5) - RFC 2865
    NasPort = 5,
    /// Service-Type (6) - RFC 2865
    ServiceType = 6,
    /// Framed-Protocol (7) - RFC 2865
    FramedProtocol = 7,
    /// Framed-IP-Address (8) - RFC 2865
    FramedIpAddress = 8,
    /// Framed-IP-Netmask (9) - RFC 2865
    FramedIpNetmask = 9,
    /// Framed-Routing (10) - RFC 2865
    FramedRouting = 10,
    /// Filter-Id (11) - RFC 2865
    FilterId = 11,
    /// Framed-MTU (12) - RFC 2865
    FramedMtu = 12,
    /// Framed-Compression (13) - RFC 2865
    FramedCompression = 13,
    /// Login-IP-Host (14) - RFC 2865
    LoginIpHost = 14,
    /// Login-Service (15) - RFC 2865
    LoginService = 15,
    /// Login-TCP-Port (16) - RFC 2865
    LoginTcpPort = 16,
    /// Reply-Message (18) - RFC 2865
    ReplyMessage = 18,
    /// Callback-Number (19) - RFC 2865
    CallbackNumber = 19,
    /// Callback-Id (20) - RFC 2865
    CallbackId = 20,
    /// Framed-Route (22) - RFC 2865
    FramedRoute = 22,
    /// Framed-IPX-Network (23) - RFC 2865
    FramedIpxNetwork = 23,
    /// State (24) - RFC 2865
    State = 24,
    /// Class (25) - RFC 2865
    Class = 25,
    /// Vendor-Specific (26) - RFC 2865
    VendorSpecific = 26,
    /// Session-Timeout (27) - RFC 2865
    SessionTimeout = 27,
    /// Idle-Timeout (28) - RFC 2865
    IdleTimeout = 28,
    /// Termination-Action (29) - RFC 2865
    TerminationAction = 29,
    /// Called-Station-Id (30) - RFC 2865
    CalledStationId = 30,
    /// Calling-Station-Id (31) - RFC 2865
    CallingStationId = 31,
    /// NAS-Identifier (32) - RFC 2865
    NasIdentifier = 32,
    /// Proxy-State (33) - RFC 2865
    ProxyState = 33,
    /// Login-LAT-Service (34) - RFC 2865
    LoginLatService = 34,
    /// Login-LAT-Node (35) - RFC 2865
    LoginLatNode = 35,
    /// Login-LAT-Group (36) - RFC 2865
    LoginLatGroup = 36,
    /// Framed-AppleTalk-Link (37) - RFC 2865
    FramedAppleTalkLink = 37,
    /// Framed-AppleTalk-Network (38) - RFC 2865
    FramedAppleTalkNetwork = 38,
    /// Framed-AppleTalk-Zone (39) - RFC 2865
    FramedAppleTalkZone = 39,
    /// Acct-Status-Type (40) - RFC 2866
    AcctStatusType = 40,
    /// Acct-Delay-Time (41) - RFC 2866
    AcctDelayTime = 41,
    /// Acct-Input-Octets (42) - RFC 2866
    AcctInputOctets = 42,
    /// Acct-Output-Octets (43) - RFC 2866
    AcctOutputOctets = 43,
    /// Acct-Session-Id (44) - RFC 2866
    AcctSessionId = 44,
    /// Acct-Authentic (45) - RFC 2866
    AcctAuthentic = 45,
    /// Acct-Session-Time (46) - RFC 2866
    AcctSessionTime = 46,
    /// Acct-Input-Packets (47) - RFC 2866
    AcctInputPackets = 47,
    /// Acct-Output-Packets (48) - RFC 2866
    AcctOutputPackets = 48,
    /// Acct-Terminate-Cause (49) - RFC 2866
    AcctTerminateCause = 49,
    /// Acct-Multi-Session-Id (50) - RFC 2866
    AcctMultiSessionId = 50,
    /// Acct-Link-Count (51) - RFC 2866
    AcctLinkCount = 51,
    /// CHAP-Challenge (60) - RFC 2865
    ChapChallenge = 60,
    /// NAS-Port-Type (61) - RFC 2865
    NasPortType = 61,
    /// Port-Limit (62) - RFC 2865
    PortLimit = 62,
    /// Login-LAT-Port (63) - RFC 2865
    LoginLatPort = 63,
    /// EAP-Message (79) - RFC 3579
    EapMessage = 79,
    /// Message-Authenticator (80) - RFC 2869
    MessageAuthenticator = 80,
}

impl AttributeType {
    pub fn from_u8(value: u8) -> Option<Self> {
        use AttributeType::*;
        const KNOWN: &[AttributeType] = &[
            UserName, UserPassword, ChapPassword, NasIpAddress, NasPort, ServiceType,
            FramedProtocol, FramedIpAddress, FramedIpNetmask, FramedRouting, FilterId,
            FramedMtu, FramedCompression, LoginIpHost, LoginService, LoginTcpPort,
            ReplyMessage, CallbackNumber, CallbackId, FramedRoute, FramedIpxNetwork, State,
            Class, VendorSpecific, SessionTimeout, IdleTimeout, TerminationAction,
            CalledStationId, CallingStationId, NasIdentifier, ProxyState, LoginLatService,
            LoginLatNode, LoginLatGroup, FramedAppleTalkLink, FramedAppleTalkNetwork,
            FramedAppleTalkZone, AcctStatusType, AcctDelayTime, AcctInputOctets,
            AcctOutputOctets, AcctSessionId, AcctAuthentic, AcctSessionTime,
            AcctInputPackets, AcctOutputPackets, AcctTerminateCause, AcctMultiSessionId,
            AcctLinkCount, ChapChallenge, NasPortType, PortLimit, LoginLatPort, EapMessage,
            MessageAuthenticator,
        ];
        KNOWN.iter().copied().find(|t| t.as_u8() == value)
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Registry entry for this type
    pub fn record(self) -> &'static AttributeRecord {
        // Every enum variant has a registry slot.
        match lookup(self.as_u8()) {
            Some(record) => record,
            None => unreachable!("attribute type {} missing from registry", self.as_u8()),
        }
    }
}

const fn plain(name: &'static str, min_length: usize, max_length: usize) -> Option<AttributeRecord> {
    Some(AttributeRecord {
        name,
        min_length,
        max_length,
        transform: Transform::Plain,
    })
}

const MAX: usize = MAX_ATTRIBUTE_SIZE;

static REGISTRY: [Option<AttributeRecord>; 256] = {
    let mut table: [Option<AttributeRecord>; 256] = [None; 256];
    table[1] = plain("User-Name", 1, MAX);
    table[2] = Some(AttributeRecord {
        name: "User-Password",
        min_length: 1,
        max_length: 128,
        transform: Transform::UserPassword,
    });
    table[3] = plain("CHAP-Password", 17, 17);
    table[4] = plain("NAS-IP-Address", 4, 4);
    table[5] = plain("NAS-Port", 4, 4);
    table[6] = plain("Service-Type", 4, 4);
    table[7] = plain("Framed-Protocol", 4, 4);
    table[8] = plain("Framed-IP-Address", 4, 4);
    table[9] = plain("Framed-IP-Netmask", 4, 4);
    table[10] = plain("Framed-Routing", 4, 4);
    table[11] = plain("Filter-Id", 1, MAX);
    table[12] = plain("Framed-MTU", 4, 4);
    table[13] = plain("Framed-Compression", 4, 4);
    table[14] = plain("Login-IP-Host", 4, 4);
    table[15] = plain("Login-Service", 4, 4);
    table[16] = plain("Login-TCP-Port", 4, 4);
    table[18] = plain("Reply-Message", 1, MAX);
    table[19] = plain("Callback-Number", 1, MAX);
    table[20] = plain("Callback-Id", 1, MAX);
    table[22] = plain("Framed-Route", 1, MAX);
    table[23] = plain("Framed-IPX-Network", 4, 4);
    table[24] = plain("State", 1, MAX);
    table[25] = plain("Class", 1, MAX);
    table[26] = plain("Vendor-Specific", 5, MAX);
    table[27] = plain("Session-Timeout", 4, 4);
    table[28] = plain("Idle-Timeout", 4, 4);
    table[29] = plain("Termination-Action", 4, 4);
    table[30] = plain("Called-Station-Id", 1, MAX);
    table[31] = plain("Calling-Station-Id", 1, MAX);
    table[32] = plain("NAS-Identifier", 1, MAX);
    table[33] = plain("Proxy-State", 1, MAX);
    table[34] = plain("Login-LAT-Service", 1, MAX);
    table[35] = plain("Login-LAT-Node", 1, MAX);
    table[36] = plain("Login-LAT-Group", 32, 32);
    table[37] = plain("Framed-AppleTalk-Link", 4, 4);
    table[38] = plain("Framed-AppleTalk-Network", 4, 4);
    table[39] = plain("Framed-AppleTalk-Zone", 1, MAX);
    table[40] = plain("Acct-Status-Type", 4, 4);
    table[41] = plain("Acct-Delay-Time", 4, 4);
    table[42] = plain("Acct-Input-Octets", 4, 4);
    table[43] = plain("Acct-Output-Octets", 4, 4);
    table[44] = plain("Acct-Session-Id", 1, MAX);
    table[45] = plain("Acct-Authentic", 4, 4);
    table[46] = plain("Acct-Session-Time", 4, 4);
    table[47] = plain("Acct-Input-Packets", 4, 4);
    table[48] = plain("Acct-Output-Packets", 4, 4);
    table[49] = plain("Acct-Terminate-Cause", 4, 4);
    table[50] = plain("Acct-Multi-Session-Id", 1, MAX);
    table[51] = plain("Acct-Link-Count", 4, 4);
    table[60] = plain("CHAP-Challenge", 5, MAX);
    table[61] = plain("NAS-Port-Type", 4, 4);
    table[62] = plain("Port-Limit", 4, 4);
    table[63] = plain("Login-LAT-Port", 1, MAX);
    table[79] = plain("EAP-Message", 1, MAX);
    table[80] = plain("Message-Authenticator", 16, 16);
    table
};

/// Look up the registry entry for a type byte
///
/// Type 0 is reserved and never registered.
pub fn lookup(attr_type: u8) -> Option<&'static AttributeRecord> {
    REGISTRY[attr_type as usize].as_ref()
}

/// Convert an attribute name to its type number
///
/// Returns 0 (never a valid type) when the name is unknown.
pub fn attribute_name_to_number(name: &str) -> u8 {
    REGISTRY
        .iter()
        .position(|slot| slot.is_some_and(|record| record.name == name))
        .map(|index| index as u8)
        .unwrap_or(0)
}

/// Convert an attribute type number to its registered name
pub fn attribute_number_to_name(attr_type: u8) -> Option<&'static str> {
    lookup(attr_type).map(|record| record.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_number_bijection() {
        assert_eq!(attribute_name_to_number("User-Name"), 1);
        assert_eq!(attribute_number_to_name(2), Some("User-Password"));
        assert_eq!(attribute_name_to_number("Not-An-Attribute"), 0);
        assert_eq!(attribute_number_to_name(0), None);
        assert_eq!(attribute_number_to_name(17), None);

        for attr_type in 1..=255u8 {
            if let Some(name) = attribute_number_to_name(attr_type) {
                assert_eq!(attribute_name_to_number(name), attr_type);
            }
        }
    }

    #[test]
    fn test_enum_matches_registry() {
        for attr_type in 0..=255u8 {
            if let Some(known) = AttributeType::from_u8(attr_type) {
                assert_eq!(known.record().name, attribute_number_to_name(attr_type).unwrap());
            }
        }
        assert_eq!(AttributeType::UserPassword.record().transform, Transform::UserPassword);
        assert_eq!(AttributeType::MessageAuthenticator.record().min_length, 16);
    }
}
