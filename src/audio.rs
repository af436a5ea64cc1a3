use crate::config::AudioConfig;
use crate::ecs::EntityId;
use crate::effects::{AudioBackend, SoundHandle, SoundRequest};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq)]
struct ActiveCue {
    handle: SoundHandle,
    entity: EntityId,
    cue: String,
    remaining: f32,
}

/// Spatial cue tracker. Keeps a bounded history of triggers and reports cues as completed once
/// their duration elapses.
pub struct AudioManager {
    enabled: bool,
    capacity: usize,
    cue_duration: f32,
    triggers: VecDeque<String>,
    active: Vec<ActiveCue>,
    next_handle: u64,
}

impl AudioManager {
    pub fn new(capacity: usize, cue_duration: f32) -> Self {
        Self {
            enabled: true,
            capacity: capacity.max(1),
            cue_duration: cue_duration.max(0.0),
            triggers: VecDeque::new(),
            active: Vec::new(),
            next_handle: 0,
        }
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        let mut manager = Self::new(config.ring_capacity, config.cue_duration);
        manager.set_enabled(config.enabled);
        manager
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// A disabled manager still hands out handles but never plays or completes them.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.active.clear();
        }
    }

    pub fn recent_triggers(&self) -> impl ExactSizeIterator<Item = &String> {
        self.triggers.iter()
    }

    fn push_trigger(&mut self, trigger: String) {
        if self.triggers.len() == self.capacity {
            self.triggers.pop_front();
        }
        self.triggers.push_back(trigger);
    }
}

impl Default for AudioManager {
    fn default() -> Self {
        Self::from_config(&AudioConfig::default())
    }
}

impl AudioBackend for AudioManager {
    fn play_spatial(&mut self, request: &SoundRequest) -> SoundHandle {
        self.next_handle += 1;
        let handle = SoundHandle(self.next_handle);
        if !self.enabled {
            return handle;
        }
        self.push_trigger(format!("play:{}:{}", request.cue, request.entity));
        self.active.push(ActiveCue {
            handle,
            entity: request.entity,
            cue: request.cue.clone(),
            remaining: self.cue_duration,
        });
        tracing::trace!(target: "audio", "{handle} '{}' at {:?}", request.cue, request.position);
        handle
    }

    fn restart(&mut self, handle: SoundHandle) {
        let duration = self.cue_duration;
        let Some(cue) = self.active.iter_mut().find(|cue| cue.handle == handle) else {
            return;
        };
        cue.remaining = duration;
        let label = format!("restart:{}:{}", cue.cue, cue.entity);
        self.push_trigger(label);
    }

    fn stop(&mut self, handle: SoundHandle) {
        self.active.retain(|cue| cue.handle != handle);
    }

    fn update(&mut self, dt: f32) -> Vec<SoundHandle> {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let mut finished = Vec::new();
        self.active.retain_mut(|cue| {
            cue.remaining -= dt;
            if cue.remaining <= 0.0 {
                finished.push(cue.handle);
                false
            } else {
                true
            }
        });
        finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use crate::ecs::{EntityDesc, EntityKind, EntityRegistry};
    use crate::material_registry::MaterialRegistry;
    use crate::mesh::MeshPrimitive;

    fn request(cue: &str) -> SoundRequest {
        let materials = MaterialRegistry::new();
        let mut registry = EntityRegistry::new();
        let entity = registry.create(&materials, EntityDesc::new(EntityKind::Prop, MeshPrimitive::Empty)).unwrap();
        SoundRequest { entity, cue: cue.to_string(), position: Vec3::ZERO }
    }

    #[test]
    fn trigger_ring_is_bounded() {
        let mut audio = AudioManager::new(2, 1.0);
        audio.play_spatial(&request("a"));
        audio.play_spatial(&request("b"));
        audio.play_spatial(&request("c"));
        let labels: Vec<_> = audio.recent_triggers().cloned().collect();
        assert_eq!(labels.len(), 2);
        assert!(labels[0].starts_with("play:b:"));
        assert!(labels[1].starts_with("play:c:"));
    }

    #[test]
    fn cues_complete_after_duration() {
        let mut audio = AudioManager::new(8, 0.5);
        let handle = audio.play_spatial(&request("clank"));
        assert!(audio.update(0.25).is_empty());
        assert_eq!(audio.update(0.25), vec![handle]);
        assert!(audio.update(1.0).is_empty(), "completion is reported once");
    }

    #[test]
    fn restart_resets_remaining_time() {
        let mut audio = AudioManager::new(8, 0.5);
        let handle = audio.play_spatial(&request("clank"));
        audio.update(0.4);
        audio.restart(handle);
        assert!(audio.update(0.4).is_empty());
        assert_eq!(audio.update(0.2), vec![handle]);
    }

    #[test]
    fn config_can_disable_playback() {
        let config = AudioConfig { enabled: false, ..AudioConfig::default() };
        let mut audio = AudioManager::from_config(&config);
        assert!(!audio.enabled());
        audio.play_spatial(&request("hum"));
        assert!(audio.update(10.0).is_empty());
        assert!(AudioManager::from_config(&AudioConfig::default()).enabled());
    }

    #[test]
    fn disabled_manager_never_completes() {
        let mut audio = AudioManager::new(8, 0.1);
        audio.set_enabled(false);
        audio.play_spatial(&request("clank"));
        assert!(audio.update(1.0).is_empty());
        assert_eq!(audio.recent_triggers().len(), 0);
    }
}
