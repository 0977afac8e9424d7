//! The closed set of recipient groups.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ContactsError;

/// A recipient segment. [`Group::All`] is the union of the named groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Group {
    /// Union of every named group.
    All,
    /// Named group `INC`.
    Inc,
    /// Named group `BJP`.
    Bjp,
    /// Named group `BRS`.
    Brs,
}

impl Group {
    /// Every group, `ALL` first. This is also the load order.
    pub const EVERY: [Group; 4] = [Group::All, Group::Inc, Group::Bjp, Group::Brs];

    /// The named groups whose union forms `ALL`, in rebuild order.
    pub const NAMED: [Group; 3] = [Group::Inc, Group::Bjp, Group::Brs];

    /// Canonical upper-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::Inc => "INC",
            Self::Bjp => "BJP",
            Self::Brs => "BRS",
        }
    }

    /// Whether this is the derived union group.
    pub fn is_all(self) -> bool {
        self == Self::All
    }

    /// File name of the group's persisted contact list.
    pub fn file_name(self) -> String {
        format!("{}.txt", self.as_str())
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Group {
    type Err = ContactsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALL" => Ok(Self::All),
            "INC" => Ok(Self::Inc),
            "BJP" => Ok(Self::Bjp),
            "BRS" => Ok(Self::Brs),
            _ => Err(ContactsError::UnknownGroup(s.to_owned())),
        }
    }
}
