// src/simulation/event_bus.rs
//
// The simulator publishes here instead of calling back into its owner.
// The owner drains after each tick.

use crate::types::{GpsFix, ZoneCharacter};
use std::collections::VecDeque;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    Position {
        fix: GpsFix,
        distance: f64,
        is_seeking: bool,
    },

    ZoneChanged {
        from: Option<ZoneCharacter>,
        to: ZoneCharacter,
        mile: f64,
        is_seeking: bool,
    },

    Completed {
        distance: f64,
        elapsed_s: f64,
    },
}

impl SimEvent {
    pub fn is_seeking(&self) -> bool {
        match self {
            SimEvent::Position { is_seeking, .. } | SimEvent::ZoneChanged { is_seeking, .. } => {
                *is_seeking
            }
            SimEvent::Completed { .. } => false,
        }
    }
}

pub struct SimEventBus {
    events: VecDeque<SimEvent>,
    max_pending: usize,
}

impl SimEventBus {
    pub fn new(max_pending: usize) -> Self {
        let max_pending = max_pending.max(1);
        Self {
            events: VecDeque::with_capacity(max_pending.min(64)),
            max_pending,
        }
    }

    pub fn publish(&mut self, event: SimEvent) {
        if self.events.len() >= self.max_pending {
            warn!(
                "Simulator event queue full ({} events), dropping oldest",
                self.max_pending
            );
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<SimEvent> {
        self.events.drain(..).collect()
    }

    pub fn pop(&mut self) -> Option<SimEvent> {
        self.events.pop_front()
    }

    pub fn pending_count(&self) -> usize {
        self.events.len()
    }
}
