//! Zone collaborators
//!
//! A zone is a region of the stage that tokens travel to: the call stack,
//! the two ready queues, the external-service area with its stations, and
//! the dispatcher. The manager knows nothing about what a zone looks like;
//! it asks the registered [`Zone`] where an arriving token should go and
//! tells it when tokens arrive and leave.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokenflow_core::{TokenCategory, TokenDescriptor, TokenId, Vec3};

/// The fixed set of zones a token can be routed to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ZoneKind {
    CallStack,
    MicrotaskQueue,
    MacrotaskQueue,
    #[serde(rename = "web-api", alias = "external-service")]
    ExternalService,
    EventLoop,
}

impl ZoneKind {
    pub const ALL: [ZoneKind; 5] = [
        ZoneKind::CallStack,
        ZoneKind::MicrotaskQueue,
        ZoneKind::MacrotaskQueue,
        ZoneKind::ExternalService,
        ZoneKind::EventLoop,
    ];

    /// Stable name; also the name of the zone's attraction field
    pub fn name(&self) -> &'static str {
        match self {
            ZoneKind::CallStack => "call-stack",
            ZoneKind::MicrotaskQueue => "microtask-queue",
            ZoneKind::MacrotaskQueue => "macrotask-queue",
            ZoneKind::ExternalService => "web-api",
            ZoneKind::EventLoop => "event-loop",
        }
    }

    /// Parse a zone name as it appears in event feeds
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "call-stack" | "callstack" | "stack" => Some(ZoneKind::CallStack),
            "microtask-queue" | "microtasks" | "micro" => Some(ZoneKind::MicrotaskQueue),
            "macrotask-queue" | "macrotasks" | "macro" => Some(ZoneKind::MacrotaskQueue),
            "web-api" | "webapi" | "web-apis" | "external-service" => {
                Some(ZoneKind::ExternalService)
            }
            "event-loop" | "eventloop" | "dispatcher" => Some(ZoneKind::EventLoop),
            _ => None,
        }
    }

    /// Queue zones hold tokens in stacked slots
    pub fn is_queue(&self) -> bool {
        matches!(self, ZoneKind::MicrotaskQueue | ZoneKind::MacrotaskQueue)
    }
}

impl fmt::Display for ZoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named service point inside the external-service zone
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub name: String,
    /// Category of work handled here
    pub category: TokenCategory,
    pub position: Vec3,
}

impl Station {
    pub fn new(name: impl Into<String>, category: TokenCategory, position: Vec3) -> Self {
        Self {
            name: name.into(),
            category,
            position,
        }
    }
}

/// Notification handed to a zone when a token settles in it
#[derive(Clone, Debug, PartialEq)]
pub struct Arrival {
    pub token: TokenDescriptor,
    pub zone: ZoneKind,
    /// Where the token came to rest
    pub position: Vec3,
    /// Slot index for queue zones, 0 elsewhere
    pub slot: usize,
}

/// A region tokens are routed to
pub trait Zone {
    /// Current anchor position
    fn position(&self) -> Vec3;

    /// Where `token` should travel to on arrival
    fn arrival_position(&self, _token: &TokenDescriptor) -> Vec3 {
        self.position()
    }

    /// Slot for `token` in a queue zone. Called once per enqueue, before the
    /// token travels, so implementations may reserve the slot here.
    fn queue_index(&mut self, _token: &TokenDescriptor) -> usize {
        0
    }

    /// Service stations, for the external-service zone
    fn stations(&self) -> &[Station] {
        &[]
    }

    /// Magnetic pull `(strength, falloff)` toward this zone, if any
    fn attraction(&self) -> Option<(f32, f32)> {
        None
    }

    /// A token finished travelling here
    fn accept(&mut self, _arrival: &Arrival) {}

    /// A token left this zone or was destroyed
    fn release(&mut self, _token: TokenId) {}
}

/// Station for `category`, else the first station, else the zone itself
pub fn station_position(zone: &dyn Zone, category: TokenCategory) -> Vec3 {
    let stations = zone.stations();
    stations
        .iter()
        .find(|s| s.category == category)
        .or_else(|| stations.first())
        .map(|s| s.position)
        .unwrap_or_else(|| zone.position())
}

// =============================================================================
// Stock zones
// =============================================================================

/// A zone at a fixed point that remembers who is inside
#[derive(Clone, Debug, Default)]
pub struct StaticZone {
    position: Vec3,
    stations: Vec<Station>,
    attraction: Option<(f32, f32)>,
    /// Vertical spacing between occupants; zero stacks everything on the anchor
    stride: f32,
    occupants: Vec<TokenId>,
}

impl StaticZone {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn with_station(mut self, station: Station) -> Self {
        self.stations.push(station);
        self
    }

    pub fn with_attraction(mut self, strength: f32, falloff: f32) -> Self {
        self.attraction = Some((strength, falloff));
        self
    }

    /// Stack arrivals upward, `stride` apart, like frames on a call stack
    pub fn with_stride(mut self, stride: f32) -> Self {
        self.stride = stride;
        self
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn occupants(&self) -> &[TokenId] {
        &self.occupants
    }
}

impl Zone for StaticZone {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn arrival_position(&self, token: &TokenDescriptor) -> Vec3 {
        let depth = self
            .occupants
            .iter()
            .position(|id| *id == token.id)
            .unwrap_or(self.occupants.len());
        self.position + Vec3::UP * (self.stride * (depth + 1) as f32)
    }

    fn stations(&self) -> &[Station] {
        &self.stations
    }

    fn attraction(&self) -> Option<(f32, f32)> {
        self.attraction
    }

    fn accept(&mut self, arrival: &Arrival) {
        if !self.occupants.contains(&arrival.token.id) {
            self.occupants.push(arrival.token.id);
        }
    }

    fn release(&mut self, token: TokenId) {
        self.occupants.retain(|id| *id != token);
    }
}

/// A queue that hands out the lowest free slot
#[derive(Clone, Debug, Default)]
pub struct QueueZone {
    base: Vec3,
    attraction: Option<(f32, f32)>,
    /// Released slots stay empty so waiting tokens keep their positions
    slots: Vec<Option<TokenId>>,
}

impl QueueZone {
    pub fn new(base: Vec3) -> Self {
        Self {
            base,
            ..Default::default()
        }
    }

    pub fn with_attraction(mut self, strength: f32, falloff: f32) -> Self {
        self.attraction = Some((strength, falloff));
        self
    }

    /// Occupied slots as `(index, token)`, front first
    pub fn slots(&self) -> impl Iterator<Item = (usize, TokenId)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.map(|id| (index, id)))
    }
}

impl Zone for QueueZone {
    fn position(&self) -> Vec3 {
        self.base
    }

    fn queue_index(&mut self, token: &TokenDescriptor) -> usize {
        if let Some(index) = self.slots.iter().position(|slot| *slot == Some(token.id)) {
            return index;
        }
        match self.slots.iter().position(Option::is_none) {
            Some(index) => {
                self.slots[index] = Some(token.id);
                index
            }
            None => {
                self.slots.push(Some(token.id));
                self.slots.len() - 1
            }
        }
    }

    fn attraction(&self) -> Option<(f32, f32)> {
        self.attraction
    }

    fn release(&mut self, token: TokenId) {
        for slot in self.slots.iter_mut().filter(|slot| **slot == Some(token)) {
            *slot = None;
        }
        while self.slots.last() == Some(&None) {
            self.slots.pop();
        }
    }
}
