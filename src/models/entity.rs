use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Sphere {
    Municipal,
    State,
    Federal,
    District,
    Consortium,
    Other(String),
}

impl Sphere {
    pub fn code(&self) -> &str {
        match self {
            Sphere::Municipal => "M",
            Sphere::State => "E",
            Sphere::Federal => "U",
            Sphere::District => "D",
            Sphere::Consortium => "C",
            Sphere::Other(code) => code,
        }
    }

    pub fn is_regional(&self) -> bool {
        matches!(self, Sphere::Municipal | Sphere::State)
    }

    fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "M" | "MUNICIPAL" => Some(Sphere::Municipal),
            "E" | "STATE" => Some(Sphere::State),
            "U" | "FEDERAL" => Some(Sphere::Federal),
            "D" | "DISTRICT" => Some(Sphere::District),
            "C" | "CONSORTIUM" => Some(Sphere::Consortium),
            _ => None,
        }
    }
}

impl From<String> for Sphere {
    fn from(code: String) -> Self {
        Sphere::from_code(&code).unwrap_or(Sphere::Other(code))
    }
}

impl From<Sphere> for String {
    fn from(sphere: Sphere) -> Self {
        sphere.code().to_string()
    }
}

impl FromStr for Sphere {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Sphere::from_code(s).ok_or_else(|| format!("unknown sphere of government: {s:?}"))
    }
}

impl fmt::Display for Sphere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "cod_ibge")]
    pub entity_code: i64,
    #[serde(rename = "ente")]
    pub display_name: String,
    #[serde(rename = "esfera")]
    pub sphere: Sphere,
    #[serde(rename = "uf", default)]
    pub region_code: Option<String>,
    #[serde(rename = "populacao", default)]
    pub population: Option<u64>,
}

impl Entity {
    pub fn region(&self) -> Option<&str> {
        if self.sphere.is_regional() {
            self.region_code.as_deref().filter(|r| !r.is_empty())
        } else {
            None
        }
    }
}
