use super::entity::{Entity, Sphere};
use super::family::ReportFamily;

pub const UNKNOWN_REGION: &str = "SEM_UF";

#[derive(Debug, Clone)]
pub struct Group<'a> {
    pub sphere: Sphere,
    pub region: Option<String>,
    pub entities: Vec<&'a Entity>,
}

impl Group<'_> {
    pub fn name(&self) -> String {
        match &self.region {
            Some(region) => format!("{}-{}", self.sphere, region),
            None => self.sphere.to_string(),
        }
    }

    pub fn export_stem(&self, family: ReportFamily, fiscal_year: u16) -> String {
        match &self.region {
            Some(region) => format!("{family}_{}_{region}_{fiscal_year}", self.sphere),
            None => format!("{family}_{}_{fiscal_year}", self.sphere),
        }
    }
}
