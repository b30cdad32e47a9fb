use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use super::dimension::Branch;
use super::entity::Sphere;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
pub enum ReportFamily {
    Rgf,
    Rreo,
}

impl ReportFamily {
    pub fn code(self) -> &'static str {
        match self {
            ReportFamily::Rgf => "RGF",
            ReportFamily::Rreo => "RREO",
        }
    }

    pub fn resource(self) -> &'static str {
        match self {
            ReportFamily::Rgf => "rgf",
            ReportFamily::Rreo => "rreo",
        }
    }

    pub fn schema(self) -> DimensionSchema {
        match self {
            ReportFamily::Rgf => DimensionSchema::BranchPeriodicity,
            ReportFamily::Rreo => DimensionSchema::Bimonthly { periods: 6 },
        }
    }

    pub fn variant_label(self, variant: Variant) -> &'static str {
        match (self, variant) {
            (ReportFamily::Rgf, Variant::Full) => "RGF",
            (ReportFamily::Rgf, Variant::Simplified) => "RGF Simplificado",
            (ReportFamily::Rreo, Variant::Full) => "RREO",
            (ReportFamily::Rreo, Variant::Simplified) => "RREO Simplificado",
        }
    }

    pub fn scoped_by_sphere(self) -> bool {
        matches!(self.schema(), DimensionSchema::BranchPeriodicity)
    }

    pub fn default_spheres(self) -> Vec<Sphere> {
        match self {
            ReportFamily::Rgf => vec![
                Sphere::Municipal,
                Sphere::State,
                Sphere::Federal,
                Sphere::Consortium,
            ],
            ReportFamily::Rreo => vec![
                Sphere::State,
                Sphere::Municipal,
                Sphere::Federal,
                Sphere::District,
            ],
        }
    }
}

impl fmt::Display for ReportFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionSchema {
    // branch × {Quarterly 1..=3, Semiannual 1..=2}
    BranchPeriodicity,
    // flat 1..=periods, no branch or periodicity
    Bimonthly { periods: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Variant {
    Full,
    Simplified,
}

impl Variant {
    pub const PRIORITY: [Variant; 2] = [Variant::Full, Variant::Simplified];
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Full => f.write_str("Full"),
            Variant::Simplified => f.write_str("Simplified"),
        }
    }
}

const FALLBACK_BRANCHES: &[Branch] = &[Branch::Executive];

#[derive(Debug, Clone)]
pub struct SphereRules {
    branches: HashMap<Sphere, Vec<Branch>>,
    single_variant: HashSet<Sphere>,
}

impl SphereRules {
    pub fn new(single_variant_spheres: &[Sphere]) -> Self {
        let branches = HashMap::from([
            (
                Sphere::Municipal,
                vec![Branch::Executive, Branch::Legislative],
            ),
            (Sphere::State, Branch::ALL.to_vec()),
            (Sphere::Federal, Branch::ALL.to_vec()),
            (Sphere::Consortium, vec![Branch::Executive]),
        ]);

        Self {
            branches,
            single_variant: single_variant_spheres.iter().cloned().collect(),
        }
    }

    // Unknown spheres fall back to the Executive branch only.
    pub fn branches_for(&self, sphere: &Sphere) -> &[Branch] {
        self.branches
            .get(sphere)
            .map(Vec::as_slice)
            .unwrap_or(FALLBACK_BRANCHES)
    }

    pub fn is_single_variant(&self, sphere: &Sphere) -> bool {
        self.single_variant.contains(sphere)
    }
}

impl Default for SphereRules {
    fn default() -> Self {
        Self::new(&[Sphere::Federal, Sphere::State, Sphere::District])
    }
}

#[derive(Debug, Clone)]
pub struct FamilyDescriptor {
    pub family: ReportFamily,
    pub schema: DimensionSchema,
    pub variants: Vec<Variant>,
    pub rules: SphereRules,
}

impl FamilyDescriptor {
    pub fn new(family: ReportFamily, rules: SphereRules) -> Self {
        Self {
            family,
            schema: family.schema(),
            variants: Variant::PRIORITY.to_vec(),
            rules,
        }
    }

    pub fn probe_order(&self, sphere: &Sphere) -> &[Variant] {
        if self.rules.is_single_variant(sphere) {
            &self.variants[..self.variants.len().min(1)]
        } else {
            &self.variants
        }
    }
}
