//! Sectors - schedulers and resource owners grouping related agents
//!
//! Each sector owns its agents, its local stocks, and its backlog queues.
//! Sectors talk to each other only through the event bus and the stock flow
//! ledger, both reachable through the per-step [`StepContext`].

pub mod backlog;
pub mod construction;
pub mod drr;
pub mod energy;
pub mod equipment;
pub mod manufacturing;
pub mod science;
pub mod transportation;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::rng::StepRng;
use crate::core::types::Step;
use crate::events::EventBus;
use crate::ledger::Ledger;

pub use backlog::Backlog;
pub use construction::ConstructionSector;
pub use drr::DrrScheduler;
pub use energy::EnergySector;
pub use equipment::EquipmentSector;
pub use manufacturing::ManufacturingSector;
pub use science::ScienceSector;
pub use transportation::TransportationSector;

/// Kernel services a sector may use while stepping.
///
/// Handed to every sector explicitly; there are no globals. The ledger
/// collects flows for the end-of-step commit, the bus buffers events for the
/// next step, and the RNG is the step-seeded stream.
pub struct StepContext<'a> {
    pub t: Step,
    pub rng: &'a mut StepRng,
    pub bus: &'a mut EventBus,
    pub ledger: &'a mut Ledger,
}

/// Per-step sector report.
///
/// `gauges` are raw observability values for the log snapshot; `contributions`
/// are deltas the evaluation engine folds into performance metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectorMetrics {
    pub gauges: BTreeMap<String, f64>,
    pub contributions: BTreeMap<String, f64>,
}

impl SectorMetrics {
    pub fn gauge(&mut self, key: &str, value: f64) {
        self.gauges.insert(key.to_string(), value);
    }

    pub fn contribute(&mut self, metric_id: &str, delta: f64) {
        if delta != 0.0 {
            *self.contributions.entry(metric_id.to_string()).or_insert(0.0) += delta;
        }
    }
}
