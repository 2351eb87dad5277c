//! Rocket - reusable transport between Earth and Moon
//!
//! A mission is a round trip: outbound leg to the destination, a loading
//! window there, and an inbound leg home. Fuel is deducted by the
//! transportation sector before launch; the rocket itself only advances the
//! mission state machine and announces arrivals on the bus. Arrival events
//! are fire-and-forget.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::agents::lifecycle::{AgentState, Lifecycle};
use crate::core::types::{Location, SectorId};
use crate::events::{EventBus, EventPayload};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RocketConfig {
    pub prop_usage_kg_per_payload_kg: f64,
    pub carrying_capacity_kg: f64,
    /// Cruise distance covered per step, km.
    pub cruise_speed_km_per_step: f64,
    pub initial_location: Location,
    pub lifetime_steps: Option<u64>,
}

impl Default for RocketConfig {
    fn default() -> Self {
        Self {
            prop_usage_kg_per_payload_kg: 21.4,
            carrying_capacity_kg: 22_800.0,
            cruise_speed_km_per_step: 5_300.0,
            initial_location: Location::Moon,
            lifetime_steps: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionPhase {
    Outbound,
    Loading,
    Inbound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    pub from: Location,
    pub to: Location,
    pub phase: MissionPhase,
    /// Steps left in the current phase.
    pub eta_steps: u64,
    pub one_way_steps: u64,
    pub loading_steps: u64,
    pub outbound_payload: BTreeMap<String, f64>,
    pub return_payload: BTreeMap<String, f64>,
    pub requester: SectorId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rocket {
    pub lifecycle: Lifecycle,
    pub config: RocketConfig,
    pub location: Location,
    pub mission: Option<Mission>,
    pub missions_flown: u64,
}

impl Rocket {
    pub fn new(config: RocketConfig) -> Self {
        let lifetime = config.lifetime_steps;
        let location = config.initial_location;
        Self {
            lifecycle: Lifecycle::new(lifetime),
            config,
            location,
            mission: None,
            missions_flown: 0,
        }
    }

    pub fn is_available(&self) -> bool {
        self.mission.is_none() && self.lifecycle.is_idle()
    }

    /// Fuel and time for a round trip, without committing to it.
    ///
    /// Returns `None` when either leg exceeds carrying capacity.
    pub fn round_trip_requirements(
        &self,
        outbound_payload_kg: f64,
        return_payload_kg: f64,
        distance_km: f64,
    ) -> Option<(f64, u64)> {
        if outbound_payload_kg > self.config.carrying_capacity_kg
            || return_payload_kg > self.config.carrying_capacity_kg
        {
            return None;
        }
        let propellant =
            (outbound_payload_kg + return_payload_kg) * self.config.prop_usage_kg_per_payload_kg;
        let one_way_steps = (distance_km / self.config.cruise_speed_km_per_step).ceil() as u64;
        Some((propellant, one_way_steps.max(1)))
    }

    /// Commit to a round trip. Call only after fuel has been deducted.
    #[allow(clippy::too_many_arguments)]
    pub fn commit_round_trip(
        &mut self,
        to: Location,
        outbound_payload: BTreeMap<String, f64>,
        return_payload: BTreeMap<String, f64>,
        one_way_steps: u64,
        loading_steps: u64,
        requester: SectorId,
    ) {
        if !self.is_available() {
            return;
        }
        self.lifecycle.state = AgentState::Active;
        self.mission = Some(Mission {
            from: self.location,
            to,
            phase: MissionPhase::Outbound,
            eta_steps: one_way_steps,
            one_way_steps,
            loading_steps,
            outbound_payload,
            return_payload,
            requester,
        });
    }

    /// Advance the mission one step, publishing `payload_delivered` on each
    /// arrival.
    pub fn step(&mut self, bus: &mut EventBus) {
        let Some(mission) = self.mission.as_mut() else {
            return;
        };

        mission.eta_steps = mission.eta_steps.saturating_sub(1);
        if mission.eta_steps > 0 {
            return;
        }

        match mission.phase {
            MissionPhase::Outbound => {
                self.location = mission.to;
                bus.publish(EventPayload::PayloadDelivered {
                    recipient: mission.requester,
                    destination: mission.to,
                    payload: mission.outbound_payload.clone(),
                });
                if mission.loading_steps > 0 {
                    mission.phase = MissionPhase::Loading;
                    mission.eta_steps = mission.loading_steps;
                } else {
                    mission.phase = MissionPhase::Inbound;
                    mission.eta_steps = mission.one_way_steps;
                }
            }
            MissionPhase::Loading => {
                mission.phase = MissionPhase::Inbound;
                mission.eta_steps = mission.one_way_steps;
            }
            MissionPhase::Inbound => {
                self.location = mission.from;
                bus.publish(EventPayload::PayloadDelivered {
                    recipient: mission.requester,
                    destination: mission.from,
                    payload: mission.return_payload.clone(),
                });
                self.mission = None;
                self.lifecycle.state = AgentState::Idle;
                self.missions_flown += 1;
            }
        }
    }
}
