use crate::camera3d::Camera3D;
use crate::ecs::{EntityRegistry, Ray, RayCaster};
use crate::events::{ActivationEvent, ActivationSource, ControllerId};
use glam::Vec2;
use std::collections::{BTreeMap, VecDeque};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseButton, WindowEvent};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    CursorMoved { x: f32, y: f32 },
    Button { button: MouseButton, pressed: bool },
    Other,
}

impl PointerEvent {
    pub fn from_window_event(ev: &WindowEvent) -> Self {
        match ev {
            WindowEvent::CursorMoved { position, .. } => {
                PointerEvent::CursorMoved { x: position.x as f32, y: position.y as f32 }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                PointerEvent::Button { button: *button, pressed: *state == ElementState::Pressed }
            }
            _ => PointerEvent::Other,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum PendingInput {
    Pick { screen: Vec2 },
    ControllerEdge { controller: ControllerId, ray: Option<Ray> },
}

#[derive(Debug, Clone, Copy, Default)]
struct ControllerState {
    pressed: bool,
    ray: Option<Ray>,
}

/// Funnels pointer picks and controller trigger edges into one ordered stream of
/// [`ActivationEvent`]s.
///
/// Input callbacks only enqueue; nothing is resolved until [`dispatch`](Self::dispatch)
/// runs inside the frame.
#[derive(Default)]
pub struct InteractionDispatcher {
    cursor: Option<Vec2>,
    primary_down: bool,
    controllers: BTreeMap<ControllerId, ControllerState>,
    pending: VecDeque<PendingInput>,
}

impl InteractionDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_pointer(&mut self, event: PointerEvent) {
        match event {
            PointerEvent::CursorMoved { x, y } => self.cursor = Some(Vec2::new(x, y)),
            PointerEvent::Button { button: MouseButton::Left, pressed } => {
                // Repeated press events without a release in between are one pick.
                if pressed && !self.primary_down {
                    match self.cursor {
                        Some(screen) => self.pending.push_back(PendingInput::Pick { screen }),
                        None => tracing::debug!(target: "input", "pick ignored: no cursor position yet"),
                    }
                }
                self.primary_down = pressed;
            }
            PointerEvent::Button { .. } | PointerEvent::Other => {}
        }
    }

    /// Queues a pick at an explicit screen position, independent of the tracked cursor.
    pub fn queue_pick(&mut self, screen: Vec2) {
        self.pending.push_back(PendingInput::Pick { screen });
    }

    pub fn cursor_position(&self) -> Option<Vec2> {
        self.cursor
    }

    pub fn attach_controller(&mut self, controller: ControllerId) -> bool {
        if self.controllers.contains_key(&controller) {
            return false;
        }
        self.controllers.insert(controller, ControllerState::default());
        tracing::info!(target: "input", "{controller} attached");
        true
    }

    /// Detaching also discards edges the controller queued this frame.
    pub fn detach_controller(&mut self, controller: ControllerId) -> bool {
        let removed = self.controllers.remove(&controller).is_some();
        if removed {
            self.pending.retain(|pending| {
                !matches!(pending, PendingInput::ControllerEdge { controller: c, .. } if *c == controller)
            });
            tracing::info!(target: "input", "{controller} detached");
        }
        removed
    }

    pub fn controller_path_attached(&self) -> bool {
        !self.controllers.is_empty()
    }

    pub fn attached_controllers(&self) -> impl Iterator<Item = ControllerId> + '_ {
        self.controllers.keys().copied()
    }

    pub fn update_controller_pose(&mut self, controller: ControllerId, ray: Ray) {
        match self.controllers.get_mut(&controller) {
            Some(state) => state.ray = Some(ray),
            None => tracing::debug!(target: "input", "pose for unattached {controller} ignored"),
        }
    }

    /// Records the trigger state. Only a released→pressed transition queues an activation.
    pub fn update_controller_trigger(&mut self, controller: ControllerId, pressed: bool) {
        let Some(state) = self.controllers.get_mut(&controller) else {
            tracing::debug!(target: "input", "trigger for unattached {controller} ignored");
            return;
        };
        let rising = pressed && !state.pressed;
        state.pressed = pressed;
        if rising {
            self.pending.push_back(PendingInput::ControllerEdge { controller, ray: state.ray });
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Resolves every queued pick and trigger edge, in arrival order.
    pub fn dispatch(
        &mut self,
        now: f64,
        camera: &Camera3D,
        viewport: PhysicalSize<u32>,
        registry: &EntityRegistry,
        raycaster: &dyn RayCaster,
    ) -> Vec<ActivationEvent> {
        let mut events = Vec::with_capacity(self.pending.len());
        while let Some(pending) = self.pending.pop_front() {
            let (source, ray) = match pending {
                PendingInput::Pick { screen } => (ActivationSource::Pointer, camera.screen_ray(screen, viewport)),
                PendingInput::ControllerEdge { controller, ray } => (ActivationSource::Controller(controller), ray),
            };
            let Some(ray) = ray else {
                tracing::debug!(target: "input", "{source:?} activation without a usable ray");
                continue;
            };
            if let Some(event) = resolve_hit(source, &ray, now, registry, raycaster) {
                events.push(event);
            }
        }
        events
    }
}

/// Shared hit resolution for both input paths: only existing, interactive entities activate.
pub fn resolve_hit(
    source: ActivationSource,
    ray: &Ray,
    now: f64,
    registry: &EntityRegistry,
    raycaster: &dyn RayCaster,
) -> Option<ActivationEvent> {
    let hit = raycaster.cast(registry, ray)?;
    if !registry.contains(hit.entity) {
        tracing::debug!(target: "input", "hit on removed entity {} treated as miss", hit.entity);
        return None;
    }
    if !registry.is_interactive(hit.entity) {
        return None;
    }
    Some(ActivationEvent { source, target: hit.entity, timestamp: now, hit_point: hit.point })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{ActivationProfile, EntityDesc, EntityKind, RayHit, SceneRayCaster};
    use crate::material_registry::MaterialRegistry;
    use crate::mesh::MeshPrimitive;
    use glam::Vec3;

    struct Fixture {
        registry: EntityRegistry,
        target: crate::ecs::EntityId,
        camera: Camera3D,
        viewport: PhysicalSize<u32>,
    }

    fn fixture(interactive: bool) -> Fixture {
        let materials = MaterialRegistry::new();
        let mut registry = EntityRegistry::new();
        let target = registry
            .create(&materials, EntityDesc::new(EntityKind::Gear, MeshPrimitive::Box { size: Vec3::ONE }))
            .expect("target");
        if interactive {
            registry.set_interactive(target, ActivationProfile::pulse("clank", 0.1)).expect("interactive");
        }
        let camera = Camera3D::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 1.0, 0.1, 100.0);
        Fixture { registry, target, camera, viewport: PhysicalSize::new(800, 600) }
    }

    fn controller_ray() -> Ray {
        Ray::new(Vec3::new(0.0, 0.0, 3.0), Vec3::NEG_Z).unwrap()
    }

    #[test]
    fn held_trigger_fires_once() {
        let fx = fixture(true);
        let mut dispatcher = InteractionDispatcher::new();
        let pad = ControllerId(1);
        dispatcher.attach_controller(pad);
        dispatcher.update_controller_pose(pad, controller_ray());

        let mut per_frame = Vec::new();
        for frame in 0..5 {
            dispatcher.update_controller_trigger(pad, true);
            let events = dispatcher.dispatch(frame as f64, &fx.camera, fx.viewport, &fx.registry, &SceneRayCaster);
            per_frame.push(events.len());
        }
        assert_eq!(per_frame, vec![1, 0, 0, 0, 0]);

        dispatcher.update_controller_trigger(pad, false);
        dispatcher.update_controller_trigger(pad, true);
        let events = dispatcher.dispatch(6.0, &fx.camera, fx.viewport, &fx.registry, &SceneRayCaster);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source, ActivationSource::Controller(pad));
        assert_eq!(events[0].target, fx.target);
    }

    #[test]
    fn pointer_press_emits_one_pick_per_click() {
        let fx = fixture(true);
        let mut dispatcher = InteractionDispatcher::new();
        dispatcher.push_pointer(PointerEvent::CursorMoved { x: 400.0, y: 300.0 });
        dispatcher.push_pointer(PointerEvent::Button { button: MouseButton::Left, pressed: true });
        dispatcher.push_pointer(PointerEvent::Button { button: MouseButton::Left, pressed: true });
        dispatcher.push_pointer(PointerEvent::Button { button: MouseButton::Right, pressed: true });
        let events = dispatcher.dispatch(0.0, &fx.camera, fx.viewport, &fx.registry, &SceneRayCaster);
        assert_eq!(events.len(), 1);
        assert!(events[0].source.is_pointer());
        assert_eq!(events[0].target, fx.target);

        let idle = dispatcher.dispatch(0.1, &fx.camera, fx.viewport, &fx.registry, &SceneRayCaster);
        assert!(idle.is_empty(), "no events without a new press");
    }

    #[test]
    fn window_events_convert_to_pointer_events() {
        use winit::dpi::PhysicalPosition;
        use winit::event::DeviceId;

        let device_id = unsafe { DeviceId::dummy() };
        let moved = WindowEvent::CursorMoved { device_id, position: PhysicalPosition::new(400.0, 300.0) };
        let pressed = WindowEvent::MouseInput { device_id, state: ElementState::Pressed, button: MouseButton::Left };
        let released =
            WindowEvent::MouseInput { device_id, state: ElementState::Released, button: MouseButton::Left };
        assert_eq!(PointerEvent::from_window_event(&moved), PointerEvent::CursorMoved { x: 400.0, y: 300.0 });
        assert_eq!(
            PointerEvent::from_window_event(&pressed),
            PointerEvent::Button { button: MouseButton::Left, pressed: true }
        );
        assert_eq!(
            PointerEvent::from_window_event(&released),
            PointerEvent::Button { button: MouseButton::Left, pressed: false }
        );
        assert_eq!(PointerEvent::from_window_event(&WindowEvent::Focused(true)), PointerEvent::Other);

        let fx = fixture(true);
        let mut dispatcher = InteractionDispatcher::new();
        for event in [&moved, &pressed, &released] {
            dispatcher.push_pointer(PointerEvent::from_window_event(event));
        }
        let events = dispatcher.dispatch(0.0, &fx.camera, fx.viewport, &fx.registry, &SceneRayCaster);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].target, fx.target);
    }

    #[test]
    fn non_interactive_hits_and_misses_emit_nothing() {
        let fx = fixture(false);
        let mut dispatcher = InteractionDispatcher::new();
        dispatcher.queue_pick(Vec2::new(400.0, 300.0));
        dispatcher.queue_pick(Vec2::new(5.0, 5.0));
        let events = dispatcher.dispatch(0.0, &fx.camera, fx.viewport, &fx.registry, &SceneRayCaster);
        assert!(events.is_empty());
        assert_eq!(dispatcher.pending_len(), 0);
    }

    #[test]
    fn unattached_controllers_are_ignored() {
        let fx = fixture(true);
        let mut dispatcher = InteractionDispatcher::new();
        let pad = ControllerId(7);
        dispatcher.update_controller_pose(pad, controller_ray());
        dispatcher.update_controller_trigger(pad, true);
        assert!(!dispatcher.controller_path_attached());
        let events = dispatcher.dispatch(0.0, &fx.camera, fx.viewport, &fx.registry, &SceneRayCaster);
        assert!(events.is_empty());
    }

    #[test]
    fn events_keep_arrival_order_across_sources() {
        let fx = fixture(true);
        let mut dispatcher = InteractionDispatcher::new();
        let pad = ControllerId(2);
        dispatcher.attach_controller(pad);
        dispatcher.update_controller_pose(pad, controller_ray());
        dispatcher.update_controller_trigger(pad, true);
        dispatcher.queue_pick(Vec2::new(400.0, 300.0));
        let events = dispatcher.dispatch(1.0, &fx.camera, fx.viewport, &fx.registry, &SceneRayCaster);
        let sources: Vec<_> = events.iter().map(|e| e.source).collect();
        assert_eq!(sources, vec![ActivationSource::Controller(pad), ActivationSource::Pointer]);
    }

    struct StaleCaster(crate::ecs::EntityId);

    impl RayCaster for StaleCaster {
        fn cast(&self, _registry: &EntityRegistry, ray: &Ray) -> Option<RayHit> {
            Some(RayHit { entity: self.0, point: ray.origin, distance: 0.0 })
        }
    }

    #[test]
    fn hits_on_removed_entities_are_misses() {
        let mut fx = fixture(true);
        fx.registry.despawn(fx.target).expect("despawn");
        let event = resolve_hit(
            ActivationSource::Pointer,
            &controller_ray(),
            0.0,
            &fx.registry,
            &StaleCaster(fx.target),
        );
        assert!(event.is_none());
    }
}
