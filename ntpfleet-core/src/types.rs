//! Core type definitions with strong typing and validation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Instance identifier
///
/// The id doubles as the final octet of the instance's address, so it is
/// bounded to 0..=254 at construction rather than failing later inside an
/// `ip addr add` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(try_from = "u32", into = "u32")]
pub struct InstanceId(u32);

impl InstanceId {
    /// Largest usable id (the derived address must fit one octet)
    pub const MAX: u32 = 254;

    /// Create a new `InstanceId` with validation
    ///
    /// # Errors
    /// Returns `Error::Validation` if the id exceeds [`Self::MAX`]
    pub fn new(id: u32) -> Result<Self> {
        if id > Self::MAX {
            return Err(Error::Validation {
                message: format!("instance id {id} out of range (max {})", Self::MAX),
            });
        }
        Ok(Self(id))
    }

    /// Get the raw id value
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InstanceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let id = s.parse::<u32>().map_err(|_| Error::Validation {
            message: format!("instance id must be a non-negative integer, got '{s}'"),
        })?;
        Self::new(id)
    }
}

impl TryFrom<u32> for InstanceId {
    type Error = Error;

    fn try_from(id: u32) -> Result<Self> {
        Self::new(id)
    }
}

impl From<InstanceId> for u32 {
    fn from(id: InstanceId) -> Self {
        id.0
    }
}

/// Process identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct ProcessId(i32);

impl ProcessId {
    /// Create from raw PID
    #[must_use]
    pub const fn from_raw(pid: i32) -> Self {
        Self(pid)
    }

    /// Get raw PID value
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self.0
    }

    /// Convert to `nix::unistd::Pid`
    #[must_use]
    pub const fn as_nix_pid(self) -> nix::unistd::Pid {
        nix::unistd::Pid::from_raw(self.0)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<nix::unistd::Pid> for ProcessId {
    fn from(pid: nix::unistd::Pid) -> Self {
        Self(pid.as_raw())
    }
}

/// NTP leap indicator flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeapIndicator {
    /// No warning
    NoWarning,
    /// Last minute has 61 seconds
    ExtraSecond,
    /// Last minute has 59 seconds
    MissingSecond,
    /// Alarm condition (clock not synchronized)
    Unsynchronized,
}

impl LeapIndicator {
    /// Wire value as passed to the server process
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::NoWarning => 0,
            Self::ExtraSecond => 1,
            Self::MissingSecond => 2,
            Self::Unsynchronized => 3,
        }
    }

    /// Human description, matching the NTP leap table
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::NoWarning => "no warning",
            Self::ExtraSecond => "last minute has 61 seconds",
            Self::MissingSecond => "last minute has 59 seconds",
            Self::Unsynchronized => "alarm condition (clock not synchronized)",
        }
    }
}

impl TryFrom<u8> for LeapIndicator {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::NoWarning),
            1 => Ok(Self::ExtraSecond),
            2 => Ok(Self::MissingSecond),
            3 => Ok(Self::Unsynchronized),
            other => Err(Error::Validation {
                message: format!("leap indicator must be 0..=3, got {other}"),
            }),
        }
    }
}

impl fmt::Display for LeapIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_u8(), self.description())
    }
}

/// Three-octet IPv4 subnet prefix, e.g. `192.168.100`
///
/// Instance addresses are derived by appending the instance id as the final
/// octet; the bridge host address uses octet 254.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(try_from = "String", into = "String")]
pub struct SubnetBase(String);

impl SubnetBase {
    /// Final octet reserved for the bridge host address
    pub const HOST_OCTET: u8 = 254;

    /// Create a new `SubnetBase` with validation
    ///
    /// # Errors
    /// Returns `Error::Validation` unless the value is exactly three
    /// dot-separated octets in 0..=255
    pub fn new(prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        let octets: Vec<&str> = prefix.split('.').collect();

        if octets.len() != 3 || octets.iter().any(|o| o.parse::<u8>().is_err()) {
            return Err(Error::Validation {
                message: format!("subnet must be a 3-octet prefix like '192.168.100', got '{prefix}'"),
            });
        }

        Ok(Self(prefix))
    }

    /// Get the prefix as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Address of an instance within this subnet
    #[must_use]
    pub fn instance_address(&self, id: InstanceId) -> String {
        format!("{}.{}", self.0, id.as_u32())
    }

    /// Bridge host address within this subnet
    #[must_use]
    pub fn host_address(&self) -> String {
        format!("{}.{}", self.0, Self::HOST_OCTET)
    }

    /// Bridge host address in CIDR notation (/24)
    #[must_use]
    pub fn host_cidr(&self) -> String {
        format!("{}/24", self.host_address())
    }
}

impl fmt::Display for SubnetBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SubnetBase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for SubnetBase {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<SubnetBase> for String {
    fn from(subnet: SubnetBase) -> Self {
        subnet.0
    }
}

/// Immutable per-invocation server parameters
///
/// Constructed once from the command line and passed by value through the
/// call chain; there is no process-wide mutable default state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerParams {
    /// Subnet prefix for instance addressing
    pub subnet: SubnetBase,
    /// Clock offset in seconds (signed)
    pub offset: i64,
    /// Reported stratum level
    pub stratum: u8,
    /// Leap indicator flag
    pub leap: LeapIndicator,
}

impl fmt::Display for ServerParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "subnet={} offset={}s stratum={} leap={}",
            self.subnet,
            self.offset,
            self.stratum,
            self.leap.as_u8()
        )
    }
}
