use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;

use crate::models::{ReportFamily, Sphere};
use crate::pipeline::ExtractionRequest;

/// Downloads SICONFI fiscal reports into one archive per group.
#[derive(Debug, Parser)]
#[command(name = "extractor", version, about)]
pub struct Cli {
    /// Report family to extract.
    #[arg(long, value_enum, default_value_t = ReportFamily::Rgf)]
    pub family: ReportFamily,

    /// Fiscal year.
    #[arg(long, value_parser = clap::value_parser!(u16).range(1000..=9999))]
    pub year: u16,

    /// Spheres of government (M, E, U, D, C). Defaults depend on the family.
    #[arg(long = "sphere", value_delimiter = ',', value_parser = Sphere::from_str)]
    pub spheres: Vec<Sphere>,

    /// Restrict municipal and state entities to one UF.
    #[arg(long)]
    pub region: Option<String>,

    /// Explicit entity codes; overrides --sphere.
    #[arg(long = "entities", value_delimiter = ',')]
    pub entity_codes: Vec<i64>,

    /// Overrides SICONFI_OUTPUT_DIR.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

impl Cli {
    pub fn into_request(self) -> ExtractionRequest {
        ExtractionRequest {
            family: self.family,
            fiscal_year: self.year,
            spheres: self.spheres,
            region: self
                .region
                .map(|r| r.trim().to_ascii_uppercase())
                .filter(|r| !r.is_empty()),
            entity_codes: self.entity_codes,
        }
    }
}
