use crate::ecs::EntityId;
use glam::Vec3;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControllerId(pub u32);

impl fmt::Display for ControllerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "controller{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationSource {
    Pointer,
    Controller(ControllerId),
}

impl ActivationSource {
    pub fn is_pointer(self) -> bool {
        matches!(self, ActivationSource::Pointer)
    }
}

/// One discrete user intent aimed at one entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivationEvent {
    pub source: ActivationSource,
    pub target: EntityId,
    pub timestamp: f64,
    pub hit_point: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeckEvent {
    Activated(ActivationEvent),
    EffectStarted { entity: EntityId },
    EffectRestarted { entity: EntityId },
    EffectDropped { entity: EntityId },
    EffectCleared { entity: EntityId },
    FeedbackReverted { entity: EntityId },
    ControllerAttached { controller: ControllerId },
    ControllerDetached { controller: ControllerId },
}

impl fmt::Display for DeckEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeckEvent::Activated(event) => match event.source {
                ActivationSource::Pointer => {
                    write!(f, "Activated entity={} source=pointer t={:.3}", event.target, event.timestamp)
                }
                ActivationSource::Controller(id) => {
                    write!(f, "Activated entity={} source={id} t={:.3}", event.target, event.timestamp)
                }
            },
            DeckEvent::EffectStarted { entity } => write!(f, "EffectStarted entity={entity}"),
            DeckEvent::EffectRestarted { entity } => write!(f, "EffectRestarted entity={entity}"),
            DeckEvent::EffectDropped { entity } => write!(f, "EffectDropped entity={entity}"),
            DeckEvent::EffectCleared { entity } => write!(f, "EffectCleared entity={entity}"),
            DeckEvent::FeedbackReverted { entity } => write!(f, "FeedbackReverted entity={entity}"),
            DeckEvent::ControllerAttached { controller } => write!(f, "ControllerAttached {controller}"),
            DeckEvent::ControllerDetached { controller } => write!(f, "ControllerDetached {controller}"),
        }
    }
}

/// Frame-scoped event queue; producers push, the frame loop drains once.
#[derive(Default)]
pub struct EventBus {
    events: Vec<DeckEvent>,
}

impl EventBus {
    pub fn push(&mut self, event: DeckEvent) {
        self.events.push(event);
    }

    pub fn extend<I: IntoIterator<Item = DeckEvent>>(&mut self, events: I) {
        self.events.extend(events);
    }

    pub fn drain(&mut self) -> Vec<DeckEvent> {
        self.events.drain(..).collect()
    }
}
