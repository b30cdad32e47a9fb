use std::fmt;

use serde::Serialize;

use super::family::ReportFamily;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Branch {
    Executive,
    Legislative,
    Judiciary,
    PublicMinistry,
    CourtOfAccounts,
}

impl Branch {
    pub const ALL: [Branch; 5] = [
        Branch::Executive,
        Branch::Legislative,
        Branch::Judiciary,
        Branch::PublicMinistry,
        Branch::CourtOfAccounts,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Branch::Executive => "E",
            Branch::Legislative => "L",
            Branch::Judiciary => "J",
            Branch::PublicMinistry => "M",
            Branch::CourtOfAccounts => "D",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Branch::Executive => "Executive",
            Branch::Legislative => "Legislative",
            Branch::Judiciary => "Judiciary",
            Branch::PublicMinistry => "Public-Ministry",
            Branch::CourtOfAccounts => "Court-of-Accounts",
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Periodicity {
    Quarterly,
    Semiannual,
}

impl Periodicity {
    pub const ALL: [Periodicity; 2] = [Periodicity::Quarterly, Periodicity::Semiannual];

    pub fn code(self) -> &'static str {
        match self {
            Periodicity::Quarterly => "Q",
            Periodicity::Semiannual => "S",
        }
    }

    pub fn periods(self) -> u8 {
        match self {
            Periodicity::Quarterly => 3,
            Periodicity::Semiannual => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Periodicity::Quarterly => "Quarterly",
            Periodicity::Semiannual => "Semiannual",
        }
    }
}

impl fmt::Display for Periodicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct QueryKey {
    pub entity_code: i64,
    pub fiscal_year: u16,
    pub periodicity: Option<Periodicity>,
    pub period_index: u8,
    pub branch: Option<Branch>,
    pub family: ReportFamily,
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.family, self.entity_code, self.fiscal_year)?;
        if let Some(branch) = self.branch {
            write!(f, " {branch}")?;
        }
        if let Some(periodicity) = self.periodicity {
            write!(f, " {periodicity}")?;
        }
        write!(f, " P{}", self.period_index)
    }
}
