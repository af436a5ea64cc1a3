use crate::animation::{AnimationController, FeedbackOutcome};
use crate::config::{DeckConfig, ParticleConfig, RetriggerPolicy};
use crate::ecs::{EntityId, EntityRegistry, RegistryError};
use crate::events::ActivationEvent;
use glam::{Vec3, Vec4};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticleHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SoundHandle(pub u64);

impl fmt::Display for ParticleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "particles#{}", self.0)
    }
}

impl fmt::Display for SoundHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sound#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParticleRequest {
    pub entity: EntityId,
    pub position: Vec3,
    pub color_start: Vec4,
    pub color_end: Vec4,
    pub size_range: (f32, f32),
    pub lifetime_range: (f32, f32),
    pub rate: f32,
    pub speed: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SoundRequest {
    pub entity: EntityId,
    pub cue: String,
    pub position: Vec3,
}

/// Particle playback collaborator. Implementations may ignore any request.
pub trait ParticleBackend {
    fn spawn(&mut self, request: &ParticleRequest) -> ParticleHandle;
    fn restart(&mut self, handle: ParticleHandle, position: Vec3);
    fn stop(&mut self, handle: ParticleHandle);
    /// Per-frame simulation step.
    fn update(&mut self, _dt: f32) {}
}

/// Spatial audio collaborator. Implementations may ignore any request.
pub trait AudioBackend {
    fn play_spatial(&mut self, request: &SoundRequest) -> SoundHandle;
    fn restart(&mut self, handle: SoundHandle);
    fn stop(&mut self, handle: SoundHandle);
    /// Advances playback and returns the sounds that finished during this step.
    fn update(&mut self, _dt: f32) -> Vec<SoundHandle> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectState {
    pub entity: EntityId,
    pub particles: ParticleHandle,
    pub sound: SoundHandle,
    pub started_at: f64,
    pub deadline: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectOutcome {
    Started,
    Restarted,
    /// An effect was already in flight and the policy is `Drop`.
    Dropped,
    /// The target is gone or no longer interactive.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearReason {
    SoundCompleted,
    TimedOut,
    EntityRemoved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearedEffect {
    pub entity: EntityId,
    pub reason: ClearReason,
}

#[derive(Debug, Clone)]
pub struct EffectSettings {
    pub policy: RetriggerPolicy,
    pub effect_timeout: f64,
    pub feedback_duration: f64,
    pub particles: ParticleConfig,
}

impl EffectSettings {
    pub fn from_config(config: &DeckConfig) -> Self {
        Self {
            policy: config.retrigger_policy,
            effect_timeout: config.effect_timeout.max(0.0),
            feedback_duration: config.animation.feedback_duration.max(0.0),
            particles: config.particles.clone(),
        }
    }
}

/// Turns activations into particles, sound and transient feedback, with at most one effect
/// in flight per entity.
pub struct EffectCoordinator<P, A> {
    settings: EffectSettings,
    particles: P,
    audio: A,
    in_flight: Vec<EffectState>,
}

impl<P: ParticleBackend, A: AudioBackend> EffectCoordinator<P, A> {
    pub fn new(settings: EffectSettings, particles: P, audio: A) -> Self {
        Self { settings, particles, audio, in_flight: Vec::new() }
    }

    pub fn settings(&self) -> &EffectSettings {
        &self.settings
    }

    pub fn particles(&self) -> &P {
        &self.particles
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    pub fn particles_mut(&mut self) -> &mut P {
        &mut self.particles
    }

    pub fn audio_mut(&mut self) -> &mut A {
        &mut self.audio
    }

    pub fn is_in_flight(&self, entity: EntityId) -> bool {
        self.in_flight.iter().any(|state| state.entity == entity)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn effect_state(&self, entity: EntityId) -> Option<&EffectState> {
        self.in_flight.iter().find(|state| state.entity == entity)
    }

    pub fn handle_activation(
        &mut self,
        event: &ActivationEvent,
        registry: &mut EntityRegistry,
        animation: &mut AnimationController,
        now: f64,
    ) -> EffectOutcome {
        let entity = event.target;
        let profile = match registry.activation_profile(entity) {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                tracing::debug!(target: "effects", "{entity} is no longer interactive; activation cancelled");
                return EffectOutcome::Cancelled;
            }
            Err(RegistryError::EntityNotFound(_)) => {
                tracing::debug!(target: "effects", "{entity} removed before its activation was applied");
                return EffectOutcome::Cancelled;
            }
            Err(err) => {
                tracing::warn!(target: "effects", "activation for {entity} cancelled: {err}");
                return EffectOutcome::Cancelled;
            }
        };
        let position = registry.world_position(entity).unwrap_or(event.hit_point);
        let deadline = now + self.settings.effect_timeout;
        let policy = self.settings.policy;

        if let Some(index) = self.in_flight.iter().position(|state| state.entity == entity) {
            if policy == RetriggerPolicy::Drop {
                tracing::debug!(target: "effects", "{entity} already has an effect in flight; dropped");
                return EffectOutcome::Dropped;
            }
            let state = &mut self.in_flight[index];
            state.deadline = deadline;
            self.particles.restart(state.particles, position);
            self.audio.restart(state.sound);
            self.begin_feedback(entity, &profile, now, registry, animation);
            tracing::debug!(target: "effects", "{entity} effect restarted");
            return EffectOutcome::Restarted;
        }

        let tuning = &self.settings.particles;
        let request = ParticleRequest {
            entity,
            position,
            color_start: profile.particle_tint.unwrap_or_else(|| Vec4::from_array(tuning.color_start)),
            color_end: Vec4::from_array(tuning.color_end),
            size_range: tuning.size_range(),
            lifetime_range: tuning.lifetime_range(),
            rate: tuning.rate.max(0.0),
            speed: tuning.speed,
        };
        let particles = self.particles.spawn(&request);
        let sound = self.audio.play_spatial(&SoundRequest { entity, cue: profile.sound_cue.clone(), position });
        self.begin_feedback(entity, &profile, now, registry, animation);
        self.in_flight.push(EffectState { entity, particles, sound, started_at: now, deadline });
        tracing::debug!(target: "effects", "{entity} effect started ({particles}, {sound})");
        EffectOutcome::Started
    }

    fn begin_feedback(
        &self,
        entity: EntityId,
        profile: &crate::ecs::ActivationProfile,
        now: f64,
        registry: &mut EntityRegistry,
        animation: &mut AnimationController,
    ) {
        match animation.begin_feedback(
            entity,
            profile.channel,
            profile.delta,
            self.settings.feedback_duration,
            now,
            self.settings.policy,
            registry,
        ) {
            Ok(FeedbackOutcome::Ignored) => {
                tracing::debug!(target: "effects", "{entity} feedback still active; not re-applied");
            }
            Ok(_) => {}
            Err(err) => tracing::debug!(target: "effects", "feedback for {entity} skipped: {err}"),
        }
    }

    /// Completion signal from the audio collaborator.
    pub fn notify_sound_completed(&mut self, handle: SoundHandle) -> Option<EntityId> {
        let index = self.in_flight.iter().position(|state| state.sound == handle)?;
        let state = self.in_flight.remove(index);
        self.particles.stop(state.particles);
        tracing::debug!(target: "effects", "{} effect completed ({handle})", state.entity);
        Some(state.entity)
    }

    /// Steps both collaborators and clears effects whose sound finished.
    pub fn update_backends(&mut self, dt: f32) -> Vec<ClearedEffect> {
        self.particles.update(dt);
        self.audio
            .update(dt)
            .into_iter()
            .filter_map(|handle| self.notify_sound_completed(handle))
            .map(|entity| ClearedEffect { entity, reason: ClearReason::SoundCompleted })
            .collect()
    }

    /// Clears effects past their upper-bound deadline and effects whose entity disappeared.
    pub fn sweep(&mut self, now: f64, registry: &EntityRegistry) -> Vec<ClearedEffect> {
        let mut cleared = Vec::new();
        let particles = &mut self.particles;
        let audio = &mut self.audio;
        self.in_flight.retain(|state| {
            let reason = if !registry.contains(state.entity) {
                ClearReason::EntityRemoved
            } else if now >= state.deadline {
                ClearReason::TimedOut
            } else {
                return true;
            };
            particles.stop(state.particles);
            audio.stop(state.sound);
            tracing::debug!(target: "effects", "{} effect cleared: {reason:?}", state.entity);
            cleared.push(ClearedEffect { entity: state.entity, reason });
            false
        });
        cleared
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum BackendCall {
        Spawn(EntityId),
        RestartParticles(ParticleHandle, Vec3),
        StopParticles(ParticleHandle),
        Play(EntityId, String),
        RestartSound(SoundHandle),
        StopSound(SoundHandle),
    }

    /// Records every request and never reports completion.
    #[derive(Default)]
    pub struct RecordingParticles {
        pub calls: Vec<BackendCall>,
        next: u64,
    }

    impl ParticleBackend for RecordingParticles {
        fn spawn(&mut self, request: &ParticleRequest) -> ParticleHandle {
            self.next += 1;
            self.calls.push(BackendCall::Spawn(request.entity));
            ParticleHandle(self.next)
        }

        fn restart(&mut self, handle: ParticleHandle, position: Vec3) {
            self.calls.push(BackendCall::RestartParticles(handle, position));
        }

        fn stop(&mut self, handle: ParticleHandle) {
            self.calls.push(BackendCall::StopParticles(handle));
        }
    }

    #[derive(Default)]
    pub struct RecordingAudio {
        pub calls: Vec<BackendCall>,
        next: u64,
    }

    impl AudioBackend for RecordingAudio {
        fn play_spatial(&mut self, request: &SoundRequest) -> SoundHandle {
            self.next += 1;
            self.calls.push(BackendCall::Play(request.entity, request.cue.clone()));
            SoundHandle(self.next)
        }

        fn restart(&mut self, handle: SoundHandle) {
            self.calls.push(BackendCall::RestartSound(handle));
        }

        fn stop(&mut self, handle: SoundHandle) {
            self.calls.push(BackendCall::StopSound(handle));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::ecs::{ActivationProfile, EntityDesc, EntityKind};
    use crate::events::ActivationSource;
    use crate::material_registry::MaterialRegistry;
    use crate::mesh::MeshPrimitive;

    struct Harness {
        registry: EntityRegistry,
        animation: AnimationController,
        coordinator: EffectCoordinator<RecordingParticles, RecordingAudio>,
        gear: EntityId,
    }

    fn harness(policy: RetriggerPolicy) -> Harness {
        let materials = MaterialRegistry::new();
        let mut registry = EntityRegistry::new();
        let gear = registry
            .create(
                &materials,
                EntityDesc::new(EntityKind::Gear, MeshPrimitive::Cylinder { diameter: 1.0, height: 0.2 })
                    .at(Vec3::new(1.0, 2.0, 3.0)),
            )
            .unwrap();
        registry.set_interactive(gear, ActivationProfile::pulse("gear_clank", 0.15)).unwrap();
        let mut config = DeckConfig::default();
        config.retrigger_policy = policy;
        config.effect_timeout = 1.0;
        config.animation.feedback_duration = 0.2;
        let coordinator = EffectCoordinator::new(
            EffectSettings::from_config(&config),
            RecordingParticles::default(),
            RecordingAudio::default(),
        );
        Harness { registry, animation: AnimationController::new(), coordinator, gear }
    }

    fn activation(target: EntityId, timestamp: f64) -> ActivationEvent {
        ActivationEvent { source: ActivationSource::Pointer, target, timestamp, hit_point: Vec3::ZERO }
    }

    impl Harness {
        fn activate(&mut self, now: f64) -> EffectOutcome {
            let event = activation(self.gear, now);
            self.coordinator.handle_activation(&event, &mut self.registry, &mut self.animation, now)
        }
    }

    #[test]
    fn first_activation_requests_particles_sound_and_feedback() {
        let mut h = harness(RetriggerPolicy::Drop);
        assert_eq!(h.activate(0.0), EffectOutcome::Started);
        assert!(h.coordinator.is_in_flight(h.gear));
        assert_eq!(h.coordinator.particles().calls, vec![BackendCall::Spawn(h.gear)]);
        assert_eq!(h.coordinator.audio().calls, vec![BackendCall::Play(h.gear, "gear_clank".into())]);
        assert_eq!(h.registry.transform(h.gear).unwrap().scale, Vec3::splat(1.15));
        assert_eq!(h.coordinator.effect_state(h.gear).map(|s| s.deadline), Some(1.0));
    }

    #[test]
    fn drop_policy_issues_no_extra_requests() {
        let mut h = harness(RetriggerPolicy::Drop);
        h.activate(0.0);
        assert_eq!(h.activate(0.05), EffectOutcome::Dropped);
        assert_eq!(h.activate(0.1), EffectOutcome::Dropped);
        assert_eq!(h.coordinator.particles().calls.len(), 1);
        assert_eq!(h.coordinator.audio().calls.len(), 1);
        assert_eq!(h.coordinator.in_flight_count(), 1);
    }

    #[test]
    fn restart_policy_issues_exactly_one_restart() {
        let mut h = harness(RetriggerPolicy::Restart);
        h.activate(0.0);
        assert_eq!(h.activate(0.5), EffectOutcome::Restarted);
        let restarts = h
            .coordinator
            .particles()
            .calls
            .iter()
            .filter(|call| matches!(call, BackendCall::RestartParticles(..)))
            .count();
        assert_eq!(restarts, 1);
        assert_eq!(h.coordinator.particles().calls.len(), 2, "no second spawn");
        assert_eq!(h.coordinator.effect_state(h.gear).map(|s| s.deadline), Some(1.5));
    }

    #[test]
    fn sound_completion_clears_and_stops_particles() {
        let mut h = harness(RetriggerPolicy::Drop);
        h.activate(0.0);
        let sound = h.coordinator.effect_state(h.gear).unwrap().sound;
        assert_eq!(h.coordinator.notify_sound_completed(sound), Some(h.gear));
        assert!(!h.coordinator.is_in_flight(h.gear));
        assert!(matches!(h.coordinator.particles().calls.last(), Some(BackendCall::StopParticles(_))));
        assert_eq!(h.coordinator.notify_sound_completed(sound), None);
        assert_eq!(h.activate(0.5), EffectOutcome::Started);
    }

    #[test]
    fn silent_backends_clear_through_timeout() {
        let mut h = harness(RetriggerPolicy::Drop);
        h.activate(0.0);
        assert!(h.coordinator.sweep(0.99, &h.registry).is_empty());
        let cleared = h.coordinator.sweep(1.0, &h.registry);
        assert_eq!(cleared, vec![ClearedEffect { entity: h.gear, reason: ClearReason::TimedOut }]);
        assert_eq!(h.coordinator.in_flight_count(), 0);
    }

    #[test]
    fn removed_targets_cancel_and_clear() {
        let mut h = harness(RetriggerPolicy::Drop);
        h.activate(0.0);
        h.registry.despawn(h.gear).unwrap();
        let cleared = h.coordinator.sweep(0.1, &h.registry);
        assert_eq!(cleared, vec![ClearedEffect { entity: h.gear, reason: ClearReason::EntityRemoved }]);
        assert_eq!(h.activate(0.2), EffectOutcome::Cancelled);
        assert_eq!(h.coordinator.in_flight_count(), 0);
    }
}
