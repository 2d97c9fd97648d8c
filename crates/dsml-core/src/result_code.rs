//! LDAP result codes as carried in DSML `resultCode` elements (RFC 4511 section 4.1.9).

use std::fmt;

macro_rules! result_codes {
    ($($variant:ident = $code:literal => $name:literal),+ $(,)?) => {
        /// Result codes a directory server may report for an operation.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ResultCode {
            $(
                #[doc = concat!("`", $name, "` (", stringify!($code), ")")]
                $variant,
            )+
        }

        impl ResultCode {
            /// Looks up the result code for a numeric value.
            #[must_use]
            pub const fn from_code(code: u32) -> Option<Self> {
                match code {
                    $($code => Some(Self::$variant),)+
                    _ => None,
                }
            }

            /// Numeric value of the result code.
            #[must_use]
            pub const fn code(self) -> u32 {
                match self {
                    $(Self::$variant => $code,)+
                }
            }

            /// Name of the result code as used in the DSML `descr` attribute.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }
    };
}

result_codes! {
    Success = 0 => "success",
    OperationsError = 1 => "operationsError",
    ProtocolError = 2 => "protocolError",
    TimeLimitExceeded = 3 => "timeLimitExceeded",
    SizeLimitExceeded = 4 => "sizeLimitExceeded",
    CompareFalse = 5 => "compareFalse",
    CompareTrue = 6 => "compareTrue",
    AuthMethodNotSupported = 7 => "authMethodNotSupported",
    StrongerAuthRequired = 8 => "strongerAuthRequired",
    Referral = 10 => "referral",
    AdminLimitExceeded = 11 => "adminLimitExceeded",
    UnavailableCriticalExtension = 12 => "unavailableCriticalExtension",
    ConfidentialityRequired = 13 => "confidentialityRequired",
    SaslBindInProgress = 14 => "saslBindInProgress",
    NoSuchAttribute = 16 => "noSuchAttribute",
    UndefinedAttributeType = 17 => "undefinedAttributeType",
    InappropriateMatching = 18 => "inappropriateMatching",
    ConstraintViolation = 19 => "constraintViolation",
    AttributeOrValueExists = 20 => "attributeOrValueExists",
    InvalidAttributeSyntax = 21 => "invalidAttributeSyntax",
    NoSuchObject = 32 => "noSuchObject",
    AliasProblem = 33 => "aliasProblem",
    InvalidDnSyntax = 34 => "invalidDNSyntax",
    AliasDereferencingProblem = 36 => "aliasDereferencingProblem",
    InappropriateAuthentication = 48 => "inappropriateAuthentication",
    InvalidCredentials = 49 => "invalidCredentials",
    InsufficientAccessRights = 50 => "insufficientAccessRights",
    Busy = 51 => "busy",
    Unavailable = 52 => "unavailable",
    UnwillingToPerform = 53 => "unwillingToPerform",
    LoopDetect = 54 => "loopDetect",
    NamingViolation = 64 => "namingViolation",
    ObjectClassViolation = 65 => "objectClassViolation",
    NotAllowedOnNonLeaf = 66 => "notAllowedOnNonLeaf",
    NotAllowedOnRdn = 67 => "notAllowedOnRDN",
    EntryAlreadyExists = 68 => "entryAlreadyExists",
    ObjectClassModsProhibited = 69 => "objectClassModsProhibited",
    AffectsMultipleDsas = 71 => "affectsMultipleDSAs",
    Other = 80 => "other",
}

impl ResultCode {
    /// Returns true only for `success`. Referrals are not chased, so `referral` is an error.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true for codes caused by failed authentication or authorization.
    #[must_use]
    pub const fn is_security_error(self) -> bool {
        matches!(
            self,
            Self::AuthMethodNotSupported
                | Self::StrongerAuthRequired
                | Self::ConfidentialityRequired
                | Self::InappropriateAuthentication
                | Self::InvalidCredentials
                | Self::InsufficientAccessRights
        )
    }

    /// Returns true for codes indicating the server refused or could not service the
    /// request at this time.
    #[must_use]
    pub const fn is_service_unavailable(self) -> bool {
        matches!(self, Self::Busy | Self::Unavailable | Self::UnwillingToPerform)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}
