use crate::models::{Entity, FamilyDescriptor, QueryKey, Row, Variant};
use crate::siconfi::{QueryOutcome, ReportQueryClient};

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved {
        variant: Variant,
        rows: Vec<Row>,
        probes: usize,
    },
    NoData {
        probes: usize,
    },
}

// Per-key state. Transitions only move forward; a variant is never
// queried twice for the same key.
enum ProbeState {
    Pending,
    Probing(usize),
    Resolved(Variant, Vec<Row>),
    Exhausted,
}

pub struct VariantResolver<'a> {
    client: &'a ReportQueryClient,
    descriptor: &'a FamilyDescriptor,
}

impl<'a> VariantResolver<'a> {
    pub fn new(client: &'a ReportQueryClient, descriptor: &'a FamilyDescriptor) -> Self {
        Self { client, descriptor }
    }

    #[tracing::instrument(
        name = "resolve key",
        level = "debug",
        skip(self, entity, key),
        fields(key = %key, resolve.variant, resolve.probes)
    )]
    pub async fn resolve(&self, entity: &Entity, key: &QueryKey) -> Resolution {
        let order = self.descriptor.probe_order(&entity.sphere);
        let mut probes = 0;
        let mut state = ProbeState::Pending;

        loop {
            state = match state {
                ProbeState::Pending if order.is_empty() => ProbeState::Exhausted,
                ProbeState::Pending => ProbeState::Probing(0),
                ProbeState::Probing(i) => {
                    let variant = order[i];
                    probes += 1;
                    match self.client.query(key, &entity.sphere, variant).await {
                        QueryOutcome::Data(rows) => ProbeState::Resolved(variant, rows),
                        QueryOutcome::NoData if i + 1 < order.len() => ProbeState::Probing(i + 1),
                        QueryOutcome::NoData => ProbeState::Exhausted,
                    }
                }
                ProbeState::Resolved(variant, rows) => {
                    let span = tracing::Span::current();
                    span.record("resolve.variant", tracing::field::display(variant));
                    span.record("resolve.probes", probes);
                    return Resolution::Resolved {
                        variant,
                        rows,
                        probes,
                    };
                }
                ProbeState::Exhausted => {
                    tracing::Span::current().record("resolve.probes", probes);
                    return Resolution::NoData { probes };
                }
            };
        }
    }
}
