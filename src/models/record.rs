use std::fmt;

use serde_json::{Map, Value};

use super::dimension::QueryKey;
use super::entity::{Entity, Sphere};
use super::family::Variant;

pub type Row = Map<String, Value>;

pub const TAG_COLUMNS: [&str; 9] = [
    "entity_code",
    "display_name",
    "fiscal_year",
    "sphere_of_government",
    "periodicity",
    "period_index",
    "report_family",
    "variant",
    "branch_of_power",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub key: QueryKey,
    pub display_name: String,
    pub sphere: Sphere,
    pub variant: Variant,
    pub rows: Vec<Row>,
}

impl ResultRecord {
    pub fn new(entity: &Entity, key: QueryKey, variant: Variant, rows: Vec<Row>) -> Self {
        Self {
            key,
            display_name: entity.display_name.clone(),
            sphere: entity.sphere.clone(),
            variant,
            rows,
        }
    }

    fn tags(&self) -> [(&'static str, Value); 9] {
        let key = &self.key;
        let optional = |v: Option<&'static str>| v.map_or(Value::Null, Value::from);
        [
            ("entity_code", Value::from(key.entity_code)),
            ("display_name", Value::from(self.display_name.as_str())),
            ("fiscal_year", Value::from(key.fiscal_year)),
            ("sphere_of_government", Value::from(self.sphere.code())),
            ("periodicity", optional(key.periodicity.map(|p| p.code()))),
            ("period_index", Value::from(key.period_index)),
            ("report_family", Value::from(key.family.code())),
            (
                "variant",
                Value::from(key.family.variant_label(self.variant)),
            ),
            ("branch_of_power", optional(key.branch.map(|b| b.code()))),
        ]
    }

    // Raw rows with the key's dimensions merged in. Tags win on name clashes.
    pub fn tagged_rows(&self) -> impl Iterator<Item = Row> + '_ {
        let tags = self.tags();
        self.rows.iter().map(move |row| {
            let mut tagged = row.clone();
            for (name, value) in &tags {
                tagged.insert((*name).to_string(), value.clone());
            }
            tagged
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailureEntry {
    pub key: QueryKey,
    pub display_name: String,
    pub sphere: Sphere,
    pub reason: String,
}

impl FailureEntry {
    pub fn new(entity: &Entity, key: QueryKey, reason: impl Into<String>) -> Self {
        Self {
            key,
            display_name: entity.display_name.clone(),
            sphere: entity.sphere.clone(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FailureEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} - {}",
            self.key.entity_code, self.display_name, self.sphere
        )?;
        if let Some(branch) = self.key.branch {
            write!(f, " {branch}")?;
        }
        if let Some(periodicity) = self.key.periodicity {
            write!(f, " {periodicity}")?;
        }
        write!(f, " P{}", self.key.period_index)
    }
}
