use crate::models::{DimensionSchema, Entity, FamilyDescriptor, Periodicity, QueryKey};

pub fn enumerate_keys<'a>(
    descriptor: &'a FamilyDescriptor,
    entity: &'a Entity,
    fiscal_year: u16,
) -> Box<dyn Iterator<Item = QueryKey> + 'a> {
    let family = descriptor.family;
    let entity_code = entity.entity_code;

    match descriptor.schema {
        DimensionSchema::BranchPeriodicity => Box::new(
            descriptor
                .rules
                .branches_for(&entity.sphere)
                .iter()
                .flat_map(move |&branch| {
                    Periodicity::ALL.into_iter().flat_map(move |periodicity| {
                        (1..=periodicity.periods()).map(move |period_index| QueryKey {
                            entity_code,
                            fiscal_year,
                            periodicity: Some(periodicity),
                            period_index,
                            branch: Some(branch),
                            family,
                        })
                    })
                }),
        ),
        DimensionSchema::Bimonthly { periods } => {
            Box::new((1..=periods).map(move |period_index| QueryKey {
                entity_code,
                fiscal_year,
                periodicity: None,
                period_index,
                branch: None,
                family,
            }))
        }
    }
}

pub fn key_count(descriptor: &FamilyDescriptor, entity: &Entity) -> usize {
    match descriptor.schema {
        DimensionSchema::BranchPeriodicity => {
            let per_branch: usize = Periodicity::ALL
                .iter()
                .map(|p| usize::from(p.periods()))
                .sum();
            descriptor.rules.branches_for(&entity.sphere).len() * per_branch
        }
        DimensionSchema::Bimonthly { periods } => usize::from(periods),
    }
}
