//! Transportation sector - rocket fleet and fuel logistics
//!
//! Step order matters and mirrors the fuel dependency: first top up He-3 and
//! convert it to propellant, then try to launch queued transports, then
//! advance every rocket's mission state machine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::agents::fuel_generator::FuelGenerator;
use crate::agents::rocket::Rocket;
use crate::core::constants::{
    DEFAULT_BACKLOG_MAX_AGE_STEPS, METRIC_BACKLOG_EXPIRED, METRIC_DUST_COVERAGE,
};
use crate::core::error::{ProximaError, Result};
use crate::core::types::{res, Location, SectorId};
use crate::events::{Event, EventPayload};
use crate::ledger::{StockFlow, Stocks};
use crate::sectors::{Backlog, SectorMetrics, StepContext};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportationConfig {
    pub earth_moon_distance_km: f64,
    pub loading_time_steps: u64,
    /// He-3 level that triggers a resupply request to manufacturing.
    pub he3_request_threshold_kg: f64,
    /// Fuel reserve under which He-3 resupply is worth requesting.
    pub minimum_fuel_kg: f64,
    /// Mass of one equipment unit in transport payload accounting.
    pub equipment_unit_mass_kg: f64,
    /// Dust coverage added per launch.
    pub dust_per_launch: f64,
    pub initial_stocks: BTreeMap<String, f64>,
    pub max_backlog_age_steps: u64,
}

impl Default for TransportationConfig {
    fn default() -> Self {
        Self {
            earth_moon_distance_km: 384_400.0,
            loading_time_steps: 24,
            he3_request_threshold_kg: 1.0,
            minimum_fuel_kg: 5_000.0,
            equipment_unit_mass_kg: 20.0,
            dust_per_launch: 0.0,
            initial_stocks: BTreeMap::new(),
            max_backlog_age_steps: DEFAULT_BACKLOG_MAX_AGE_STEPS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportRequestItem {
    pub requester: SectorId,
    pub payload: BTreeMap<String, f64>,
    pub origin: Location,
    pub destination: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportationSector {
    pub config: TransportationConfig,
    pub stocks: Stocks,
    pub rockets: Vec<Rocket>,
    pub fuel_generators: Vec<FuelGenerator>,
    pub queue: Backlog<TransportRequestItem>,
    fuel_request_pending: bool,
    pub launches_this_step: u32,
    pub expired_this_step: u64,
}

impl TransportationSector {
    pub fn new(
        config: TransportationConfig,
        rockets: Vec<Rocket>,
        fuel_generators: Vec<FuelGenerator>,
    ) -> Self {
        let stocks = Stocks::with_initial(config.initial_stocks.clone());
        Self {
            config,
            stocks,
            rockets,
            fuel_generators,
            queue: Backlog::new(),
            fuel_request_pending: false,
            launches_this_step: 0,
            expired_this_step: 0,
        }
    }

    pub fn power_demand(&self) -> f64 {
        // Fuel conversion runs off reactor heat; grid draw is pad overhead.
        1.0
    }

    pub fn handle_event(&mut self, event: &Event, ctx: &mut StepContext) -> Result<()> {
        match &event.payload {
            EventPayload::TransportRequest {
                requester,
                payload,
                origin,
                destination,
            } => {
                if payload.is_empty() || origin == destination {
                    return Err(ProximaError::EventDelivery {
                        topic: event.topic.as_str(),
                        sector: SectorId::Transportation,
                        message: "degenerate transport request".to_string(),
                    });
                }
                self.queue.push(
                    TransportRequestItem {
                        requester: *requester,
                        payload: payload.clone(),
                        origin: *origin,
                        destination: *destination,
                    },
                    ctx.t,
                );
            }
            EventPayload::ResourceAllocated {
                recipient,
                resource,
                ..
            } if *recipient == SectorId::Transportation && resource == res::HE3 => {
                self.fuel_request_pending = false;
            }
            _ => {}
        }
        Ok(())
    }

    /// Ask manufacturing for He-3 when fuel reserves run low. One request
    /// per resource stays in flight at a time.
    fn request_fuel_feedstock(&mut self, ctx: &mut StepContext) {
        if !self.fuel_request_pending
            && self.stocks.get(res::HE3) < self.config.he3_request_threshold_kg
            && self.stocks.get(res::ROCKET_FUEL) < self.config.minimum_fuel_kg
        {
            ctx.bus.publish(EventPayload::ResourceRequest {
                requester: SectorId::Transportation,
                resource: res::HE3.to_string(),
                amount: self.config.he3_request_threshold_kg,
            });
            self.fuel_request_pending = true;
        }
    }

    fn generate_fuel(&mut self, ctx: &mut StepContext) {
        let mut he3_available = self.stocks.get(res::HE3);
        for generator in &mut self.fuel_generators {
            if !generator.lifecycle.begin_step() {
                continue;
            }
            if he3_available <= 0.0 {
                break;
            }
            let (consumed, produced) = generator.step(he3_available);
            if produced > 0.0 {
                ctx.ledger.record(StockFlow::consume(
                    SectorId::Transportation,
                    res::HE3,
                    consumed,
                ));
                ctx.ledger.record(StockFlow::produce(
                    SectorId::Transportation,
                    res::ROCKET_FUEL,
                    produced,
                ));
                he3_available -= consumed;
            }
        }
    }

    /// Launch queued transports, newest first, while fuel and rockets last.
    fn process_transport_queue(&mut self, ctx: &mut StepContext) {
        let mut fuel_available = self.stocks.get(res::ROCKET_FUEL);
        let mut launches: Vec<f64> = Vec::new();

        let config = self.config.clone();
        let rockets = &mut self.rockets;
        self.queue.drain_lifo(|request| {
            let Some(rocket_index) = rockets
                .iter()
                .position(|rocket| rocket.is_available() && !rocket.lifecycle.is_retired())
            else {
                return false;
            };
            let rocket = &mut rockets[rocket_index];

            // Goods at the rocket's own location fly out on the first leg;
            // otherwise the rocket flies out empty and brings them home.
            let payload_kg: f64 = request
                .payload
                .values()
                .map(|q| q * config.equipment_unit_mass_kg)
                .sum();
            let (to, outbound_kg, return_kg) = if rocket.location == request.origin {
                (request.destination, payload_kg, 0.0)
            } else {
                (request.origin, 0.0, payload_kg)
            };

            let Some((prop_total, one_way_steps)) =
                rocket.round_trip_requirements(outbound_kg, return_kg, config.earth_moon_distance_km)
            else {
                return false;
            };
            if fuel_available < prop_total {
                return false;
            }

            let (outbound_payload, return_payload) = if outbound_kg > 0.0 {
                (request.payload.clone(), BTreeMap::new())
            } else {
                (BTreeMap::new(), request.payload.clone())
            };
            rocket.commit_round_trip(
                to,
                outbound_payload,
                return_payload,
                one_way_steps,
                config.loading_time_steps,
                request.requester,
            );
            fuel_available -= prop_total;
            launches.push(prop_total);
            true
        });

        for prop_total in launches {
            if prop_total > 0.0 {
                ctx.ledger.record(StockFlow::consume(
                    SectorId::Transportation,
                    res::ROCKET_FUEL,
                    prop_total,
                ));
            }
            self.launches_this_step += 1;
        }
    }

    pub fn step(&mut self, _power: f64, ctx: &mut StepContext) {
        self.launches_this_step = 0;

        self.expired_this_step = self
            .queue
            .expire(ctx.t, self.config.max_backlog_age_steps) as u64;

        self.request_fuel_feedstock(ctx);
        self.generate_fuel(ctx);
        self.process_transport_queue(ctx);

        for rocket in &mut self.rockets {
            if rocket.lifecycle.begin_step() || rocket.mission.is_some() {
                rocket.step(ctx.bus);
            }
        }
    }

    pub fn metrics(&self) -> SectorMetrics {
        let mut metrics = SectorMetrics::default();
        metrics.gauge("rockets", self.rockets.len() as f64);
        metrics.gauge(
            "rockets_available",
            self.rockets.iter().filter(|r| r.is_available()).count() as f64,
        );
        metrics.gauge("queued_requests", self.queue.len() as f64);
        metrics.gauge("rocket_fuel_kg", self.stocks.get(res::ROCKET_FUEL));
        metrics.gauge("he3_kg", self.stocks.get(res::HE3));
        metrics.gauge("launches_this_step", self.launches_this_step as f64);
        metrics.contribute(
            METRIC_DUST_COVERAGE,
            self.launches_this_step as f64 * self.config.dust_per_launch,
        );
        metrics.contribute(METRIC_BACKLOG_EXPIRED, self.expired_this_step as f64);
        metrics
    }
}
