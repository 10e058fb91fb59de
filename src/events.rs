//! Outbound event envelopes and topic routes.

use serde::{Deserialize, Serialize};

use crate::model::{Controller, FlightPlan, Position};

pub mod routes {
    pub const CONTROLLER_CONNECT: &str = "events.controller.connect";
    pub const CONTROLLER_DISCONNECT: &str = "events.controller.disconnect";
    pub const FLIGHT_PLAN_FILE: &str = "events.flight_plan.file";
    pub const FLIGHT_PLAN_UPDATE: &str = "events.flight_plan.update";
    pub const FLIGHT_PLAN_EXPIRE: &str = "events.flight_plan.expire";
    pub const FLIGHT_PLAN_STATE_CHANGE: &str = "events.flight_plan.state_change";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerEventKind {
    Connect,
    Disconnect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerEvent {
    pub event: ControllerEventKind,
    pub data: Controller,
    pub timestamp: i64,
}

impl ControllerEvent {
    pub fn route(&self) -> &'static str {
        match self.event {
            ControllerEventKind::Connect => routes::CONTROLLER_CONNECT,
            ControllerEventKind::Disconnect => routes::CONTROLLER_DISCONNECT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightPlanEventKind {
    File,
    Update,
    Expire,
    StateChange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pilot {
    pub cid: i64,
    pub callsign: String,
}

/// Present on `state_change` events only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub previous: String,
    pub current: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightPlanEvent {
    pub event: FlightPlanEventKind,
    pub pilot: Pilot,
    pub flight_plan: FlightPlan,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<StateTransition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl FlightPlanEvent {
    pub fn route(&self) -> &'static str {
        match self.event {
            FlightPlanEventKind::File => routes::FLIGHT_PLAN_FILE,
            FlightPlanEventKind::Update => routes::FLIGHT_PLAN_UPDATE,
            FlightPlanEventKind::Expire => routes::FLIGHT_PLAN_EXPIRE,
            FlightPlanEventKind::StateChange => routes::FLIGHT_PLAN_STATE_CHANGE,
        }
    }
}
