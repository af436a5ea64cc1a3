use crate::animation::AnimationController;
use crate::audio::AudioManager;
use crate::camera3d::Camera3D;
use crate::config::DeckConfig;
use crate::ecs::{
    report_contract_violation, EntityId, EntityRegistry, RayCaster, RegistryError, SceneRayCaster, Transform3D,
};
use crate::effects::{
    AudioBackend, ClearedEffect, EffectCoordinator, EffectOutcome, EffectSettings, ParticleBackend, SoundHandle,
};
use crate::environment::{DeckLayout, EnvironmentBuilder};
use crate::events::{ActivationEvent, DeckEvent, EventBus};
use crate::input::{InteractionDispatcher, PointerEvent};
use crate::material_registry::{MaterialId, MaterialRegistry};
use crate::mesh::MeshPrimitive;
use crate::particles::{ParticleCaps, ParticlePool};
use crate::time::FrameClock;
use crate::xr::{XrRuntime, XrSessionManager, XrStatus};
use anyhow::Result;
use glam::{Vec2, Vec4};
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;

/// Per-instance draw data, laid out for direct upload into a vertex buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceData {
    pub model: [[f32; 4]; 4],
    pub base_color: [f32; 4],
    pub emissive: [f32; 4],
    /// x: metallic, y: roughness.
    pub material_params: [f32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderInstance {
    pub entity: EntityId,
    pub primitive: MeshPrimitive,
    pub material: MaterialId,
    pub data: InstanceData,
}

#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    pub frame: u64,
    pub now: f64,
    pub activations: Vec<ActivationEvent>,
    pub outcomes: Vec<(EntityId, EffectOutcome)>,
    pub reverted: Vec<EntityId>,
    pub cleared: Vec<ClearedEffect>,
    pub events: Vec<DeckEvent>,
}

/// Owns the deck and runs one frame of input, effects and animation per [`frame`](Self::frame)
/// call.
pub struct Deck<P = ParticlePool, A = AudioManager> {
    config: DeckConfig,
    clock: FrameClock,
    registry: EntityRegistry,
    materials: MaterialRegistry,
    animation: AnimationController,
    dispatcher: InteractionDispatcher,
    effects: EffectCoordinator<P, A>,
    xr: XrSessionManager,
    camera: Camera3D,
    viewport: PhysicalSize<u32>,
    raycaster: Box<dyn RayCaster>,
    layout: Option<DeckLayout>,
    bus: EventBus,
}

impl Deck<ParticlePool, AudioManager> {
    pub fn with_default_backends(config: DeckConfig) -> Self {
        let particles = ParticlePool::new(ParticleCaps::from_config(&config.particles));
        let audio = AudioManager::from_config(&config.audio);
        Self::new(config, particles, audio)
    }
}

impl<P: ParticleBackend, A: AudioBackend> Deck<P, A> {
    pub fn new(config: DeckConfig, particles: P, audio: A) -> Self {
        let [width, height] = config.camera.viewport;
        let camera = Camera3D::from_config(&config.camera);
        let effects = EffectCoordinator::new(EffectSettings::from_config(&config), particles, audio);
        Self {
            clock: FrameClock::new(),
            registry: EntityRegistry::new(),
            materials: MaterialRegistry::new(),
            animation: AnimationController::new(),
            dispatcher: InteractionDispatcher::new(),
            effects,
            xr: XrSessionManager::new(),
            camera,
            viewport: PhysicalSize::new(width, height),
            raycaster: Box::new(SceneRayCaster),
            layout: None,
            bus: EventBus::default(),
            config,
        }
    }

    pub fn with_raycaster(mut self, raycaster: impl RayCaster + 'static) -> Self {
        self.raycaster = Box::new(raycaster);
        self
    }

    /// Builds the demo deck. Calling it again returns the existing layout.
    pub fn build_environment(&mut self) -> Result<&DeckLayout> {
        if self.layout.is_none() {
            let layout =
                EnvironmentBuilder::new(&mut self.registry, &mut self.materials, &mut self.animation, &self.config)
                    .build()?;
            self.layout = Some(layout);
        }
        self.layout.as_ref().ok_or_else(|| anyhow::anyhow!("environment missing after build"))
    }

    /// Negotiates XR against the ground entity. Never fails; see [`XrStatus`].
    pub async fn initialize<R: XrRuntime>(&mut self, runtime: &mut R) -> XrStatus {
        match self.layout.as_ref().map(|layout| layout.ground) {
            Some(floor) => self.xr.initialize(runtime, floor).await,
            None => {
                self.xr.mark_pointer_only("no floor entity; build the environment first");
                self.xr.status()
            }
        }
    }

    pub fn initialize_blocking<R: XrRuntime>(&mut self, runtime: &mut R) -> XrStatus {
        pollster::block_on(self.initialize(runtime))
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            tracing::debug!(target: "deck", "ignoring zero-sized viewport {}x{}", size.width, size.height);
            return;
        }
        self.viewport = size;
    }

    pub fn push_pointer(&mut self, event: PointerEvent) {
        self.dispatcher.push_pointer(event);
    }

    pub fn queue_pick(&mut self, screen: Vec2) {
        self.dispatcher.queue_pick(screen);
    }

    /// Routes a window event to resize or pointer handling.
    pub fn handle_window_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::Resized(size) => self.resize(*size),
            other => self.push_pointer(PointerEvent::from_window_event(other)),
        }
    }

    /// Runs one frame: XR pump, dispatch, effects, animation, effect sweep, transform
    /// propagation.
    pub fn frame<R: XrRuntime>(&mut self, dt: f32, runtime: &mut R) -> FrameReport {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let now = self.clock.advance(dt);
        let mut report = FrameReport { frame: self.clock.frame(), now, ..FrameReport::default() };

        let lifecycle = self.xr.pump(runtime, &mut self.dispatcher);
        self.bus.extend(lifecycle);

        let activations =
            self.dispatcher.dispatch(now, &self.camera, self.viewport, &self.registry, self.raycaster.as_ref());
        for activation in &activations {
            self.bus.push(DeckEvent::Activated(*activation));
            let entity = activation.target;
            let outcome = self.effects.handle_activation(activation, &mut self.registry, &mut self.animation, now);
            match outcome {
                EffectOutcome::Started => self.bus.push(DeckEvent::EffectStarted { entity }),
                EffectOutcome::Restarted => self.bus.push(DeckEvent::EffectRestarted { entity }),
                EffectOutcome::Dropped => self.bus.push(DeckEvent::EffectDropped { entity }),
                EffectOutcome::Cancelled => {}
            }
            report.outcomes.push((entity, outcome));
        }
        report.activations = activations;

        let advanced = self.animation.advance(dt, now, &mut self.registry);
        self.bus.extend(advanced.reverted.iter().map(|&entity| DeckEvent::FeedbackReverted { entity }));
        report.reverted = advanced.reverted;

        let mut cleared = self.effects.update_backends(dt);
        cleared.extend(self.effects.sweep(now, &self.registry));
        self.bus.extend(cleared.iter().map(|c| DeckEvent::EffectCleared { entity: c.entity }));
        report.cleared = cleared;

        self.registry.propagate_transforms();
        report.events = self.bus.drain();
        for event in &report.events {
            tracing::trace!(target: "deck", "frame {}: {event}", report.frame);
        }
        report
    }

    /// Completion signal from an external audio backend. The cleared effect is reported with
    /// the next frame.
    pub fn notify_sound_completed(&mut self, handle: SoundHandle) -> Option<EntityId> {
        let entity = self.effects.notify_sound_completed(handle)?;
        self.bus.push(DeckEvent::EffectCleared { entity });
        Some(entity)
    }

    pub fn set_transform(&mut self, id: EntityId, transform: Transform3D) -> Result<(), RegistryError> {
        self.registry.set_transform(id, transform)
    }

    /// Removes an entity and its descendants. Pending clips, feedback and effects for them are
    /// discarded on the next frame.
    pub fn despawn(&mut self, id: EntityId) -> Result<usize, RegistryError> {
        self.registry.despawn(id)
    }

    /// Draw list in creation order.
    pub fn render_instances(&self) -> Vec<RenderInstance> {
        let mut instances = Vec::with_capacity(self.registry.len());
        self.registry.for_each(|view| {
            if view.primitive.bounds().is_none() {
                return;
            }
            let spec = match self.materials.get(view.material) {
                Ok(spec) => spec,
                Err(err) => {
                    report_contract_violation("render_instances", &err);
                    return;
                }
            };
            let emissive = spec.emissive.map_or(Vec4::ZERO, |e| e.extend(1.0));
            instances.push(RenderInstance {
                entity: view.id,
                primitive: view.primitive,
                material: view.material,
                data: InstanceData {
                    model: view.world.to_cols_array_2d(),
                    base_color: spec.base_color.to_array(),
                    emissive: emissive.to_array(),
                    material_params: [spec.metallic, spec.roughness, 0.0, 0.0],
                },
            });
        });
        instances
    }

    pub fn config(&self) -> &DeckConfig {
        &self.config
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn materials(&self) -> &MaterialRegistry {
        &self.materials
    }

    pub fn animation(&self) -> &AnimationController {
        &self.animation
    }

    pub fn dispatcher(&self) -> &InteractionDispatcher {
        &self.dispatcher
    }

    pub fn effects(&self) -> &EffectCoordinator<P, A> {
        &self.effects
    }

    pub fn effects_mut(&mut self) -> &mut EffectCoordinator<P, A> {
        &mut self.effects
    }

    pub fn xr_status(&self) -> XrStatus {
        self.xr.status()
    }

    pub fn camera(&self) -> &Camera3D {
        &self.camera
    }

    pub fn viewport(&self) -> PhysicalSize<u32> {
        self.viewport
    }

    pub fn layout(&self) -> Option<&DeckLayout> {
        self.layout.as_ref()
    }

    /// Screen position of an entity's origin, as of the last frame.
    pub fn screen_position(&self, id: EntityId) -> Option<Vec2> {
        let world = self.registry.world_position(id).ok()?;
        self.camera.project_point(world, self.viewport)
    }
}
