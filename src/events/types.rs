//! Event topics and payloads

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::types::{Location, SectorId};

/// Closed enumeration of bus topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    ConstructionRequest,
    EquipmentRequest,
    TransportRequest,
    ResourceRequest,
    ResourceAllocated,
    EquipmentAllocated,
    PayloadDelivered,
    ModuleCompleted,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::ConstructionRequest => "construction_request",
            Topic::EquipmentRequest => "equipment_request",
            Topic::TransportRequest => "transport_request",
            Topic::ResourceRequest => "resource_request",
            Topic::ResourceAllocated => "resource_allocated",
            Topic::EquipmentAllocated => "equipment_allocated",
            Topic::PayloadDelivered => "payload_delivered",
            Topic::ModuleCompleted => "module_completed",
        }
    }
}

/// Typed event payloads. Quantity maps use `BTreeMap` so payload iteration
/// order is stable across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    ConstructionRequest {
        requester: SectorId,
        module_id: String,
        shell_quantity: u32,
        quantity: u32,
    },
    EquipmentRequest {
        requester: SectorId,
        equipment_type: String,
        quantity: u32,
    },
    TransportRequest {
        requester: SectorId,
        payload: BTreeMap<String, f64>,
        origin: Location,
        destination: Location,
    },
    ResourceRequest {
        requester: SectorId,
        resource: String,
        amount: f64,
    },
    ResourceAllocated {
        recipient: SectorId,
        resource: String,
        amount: f64,
    },
    EquipmentAllocated {
        recipient: SectorId,
        equipment_type: String,
        quantity: u32,
    },
    PayloadDelivered {
        recipient: SectorId,
        destination: Location,
        payload: BTreeMap<String, f64>,
    },
    ModuleCompleted {
        recipient: SectorId,
        module_id: String,
        quantity: u32,
    },
}

impl EventPayload {
    pub fn topic(&self) -> Topic {
        match self {
            EventPayload::ConstructionRequest { .. } => Topic::ConstructionRequest,
            EventPayload::EquipmentRequest { .. } => Topic::EquipmentRequest,
            EventPayload::TransportRequest { .. } => Topic::TransportRequest,
            EventPayload::ResourceRequest { .. } => Topic::ResourceRequest,
            EventPayload::ResourceAllocated { .. } => Topic::ResourceAllocated,
            EventPayload::EquipmentAllocated { .. } => Topic::EquipmentAllocated,
            EventPayload::PayloadDelivered { .. } => Topic::PayloadDelivered,
            EventPayload::ModuleCompleted { .. } => Topic::ModuleCompleted,
        }
    }
}

/// An event captured on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub topic: Topic,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            topic: payload.topic(),
            payload,
        }
    }
}
