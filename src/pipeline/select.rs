use std::collections::{BTreeMap, HashSet};

use crate::error::{AppError, AppResult};
use crate::models::{Entity, Group, ReportFamily, Sphere, UNKNOWN_REGION};
use crate::siconfi::EntityDirectory;

#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub family: ReportFamily,
    pub fiscal_year: u16,
    pub spheres: Vec<Sphere>,
    pub region: Option<String>,
    pub entity_codes: Vec<i64>,
}

impl ExtractionRequest {
    pub fn new(family: ReportFamily, fiscal_year: u16) -> Self {
        Self {
            family,
            fiscal_year,
            spheres: Vec::new(),
            region: None,
            entity_codes: Vec::new(),
        }
    }

    fn spheres(&self) -> Vec<Sphere> {
        if self.spheres.is_empty() {
            self.family.default_spheres()
        } else {
            self.spheres.clone()
        }
    }
}

pub fn validate_region(directory: &EntityDirectory, request: &ExtractionRequest) -> AppResult<()> {
    let Some(region) = &request.region else {
        return Ok(());
    };
    if !request.entity_codes.is_empty() {
        return Ok(());
    }

    let regional: Vec<Sphere> = request
        .spheres()
        .into_iter()
        .filter(Sphere::is_regional)
        .collect();
    let known = regional.iter().any(|sphere| {
        directory
            .available_regions(sphere)
            .iter()
            .any(|r| r.eq_ignore_ascii_case(region))
    });

    if regional.is_empty() || known {
        Ok(())
    } else {
        Err(AppError::Config(format!(
            "unknown region {region:?} for spheres {}",
            regional
                .iter()
                .map(Sphere::code)
                .collect::<Vec<_>>()
                .join(",")
        )))
    }
}

pub fn build_groups<'a>(
    directory: &'a EntityDirectory,
    request: &ExtractionRequest,
) -> Vec<Group<'a>> {
    let selected: Vec<&Entity> = if request.entity_codes.is_empty() {
        let spheres = request.spheres();
        spheres
            .iter()
            .flat_map(|sphere| {
                directory.entities().iter().filter(move |e| &e.sphere == sphere)
            })
            .filter(|e| match (&request.region, e.sphere.is_regional()) {
                (Some(region), true) => e.region().is_some_and(|r| r.eq_ignore_ascii_case(region)),
                _ => true,
            })
            .collect()
    } else {
        directory.by_codes(&request.entity_codes).collect()
    };

    let mut seen = HashSet::new();
    let mut sphere_order: Vec<Sphere> = Vec::new();
    let mut partitions: BTreeMap<(usize, Option<String>), Vec<&'a Entity>> = BTreeMap::new();

    for entity in selected {
        if !seen.insert(entity.entity_code) {
            continue;
        }
        let sphere_idx = match sphere_order.iter().position(|s| s == &entity.sphere) {
            Some(idx) => idx,
            None => {
                sphere_order.push(entity.sphere.clone());
                sphere_order.len() - 1
            }
        };
        let region = entity.sphere.is_regional().then(|| {
            entity
                .region()
                .map(str::to_ascii_uppercase)
                .unwrap_or_else(|| UNKNOWN_REGION.to_string())
        });
        partitions
            .entry((sphere_idx, region))
            .or_default()
            .push(entity);
    }

    partitions
        .into_iter()
        .map(|((sphere_idx, region), entities)| Group {
            sphere: sphere_order[sphere_idx].clone(),
            region,
            entities,
        })
        .collect()
}
