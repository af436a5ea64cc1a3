use crate::ecs::{EntityId, Ray};
use crate::events::{ControllerId, DeckEvent};
use crate::input::InteractionDispatcher;
use std::collections::VecDeque;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XrError {
    #[error("immersive sessions are not supported by this runtime")]
    Unsupported,
    #[error("session request rejected: {0}")]
    SessionRejected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XrSession {
    pub id: Uuid,
    /// Entity the runtime anchors its floor reference space to.
    pub floor: EntityId,
}

impl XrSession {
    pub fn new(floor: EntityId) -> Self {
        Self { id: Uuid::new_v4(), floor }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum XrEvent {
    ControllerConnected(ControllerId),
    ControllerDisconnected(ControllerId),
    Trigger { id: ControllerId, pressed: bool },
    Pose { id: ControllerId, ray: Ray },
    SessionEnded,
}

/// Immersive runtime seam. Session setup is async; event polling happens once per frame.
#[allow(async_fn_in_trait)]
pub trait XrRuntime {
    async fn is_session_supported(&self) -> bool;
    async fn request_session(&mut self, floor: EntityId) -> Result<XrSession, XrError>;
    fn poll_events(&mut self) -> Vec<XrEvent>;
}

/// Runtime for hosts without any immersive support.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoXrRuntime;

impl XrRuntime for NoXrRuntime {
    async fn is_session_supported(&self) -> bool {
        false
    }

    async fn request_session(&mut self, _floor: EntityId) -> Result<XrSession, XrError> {
        Err(XrError::Unsupported)
    }

    fn poll_events(&mut self) -> Vec<XrEvent> {
        Vec::new()
    }
}

/// Scriptable runtime for headless runs and tests: events are queued up front and handed out
/// one frame at a time.
#[derive(Debug, Default)]
pub struct SimulatedXrRuntime {
    supported: bool,
    reject_with: Option<String>,
    frames: VecDeque<Vec<XrEvent>>,
}

impl SimulatedXrRuntime {
    pub fn supported() -> Self {
        Self { supported: true, ..Self::default() }
    }

    pub fn rejecting(reason: impl Into<String>) -> Self {
        Self { supported: true, reject_with: Some(reason.into()), ..Self::default() }
    }

    /// Queues the events returned by the next unclaimed frame.
    pub fn push_frame(&mut self, events: Vec<XrEvent>) {
        self.frames.push_back(events);
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.len()
    }
}

impl XrRuntime for SimulatedXrRuntime {
    async fn is_session_supported(&self) -> bool {
        self.supported
    }

    async fn request_session(&mut self, floor: EntityId) -> Result<XrSession, XrError> {
        match &self.reject_with {
            Some(reason) => Err(XrError::SessionRejected(reason.clone())),
            None => Ok(XrSession::new(floor)),
        }
    }

    fn poll_events(&mut self) -> Vec<XrEvent> {
        self.frames.pop_front().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrStatus {
    Uninitialized,
    Immersive,
    PointerOnly,
}

impl XrStatus {
    pub fn label(self) -> &'static str {
        match self {
            XrStatus::Uninitialized => "uninitialized",
            XrStatus::Immersive => "immersive",
            XrStatus::PointerOnly => "pointer-only",
        }
    }
}

pub struct XrSessionManager {
    status: XrStatus,
    session: Option<XrSession>,
}

impl XrSessionManager {
    pub fn new() -> Self {
        Self { status: XrStatus::Uninitialized, session: None }
    }

    pub fn status(&self) -> XrStatus {
        self.status
    }

    pub fn session(&self) -> Option<&XrSession> {
        self.session.as_ref()
    }

    pub fn is_immersive(&self) -> bool {
        self.status == XrStatus::Immersive
    }

    /// Negotiates an immersive session. Any failure degrades to pointer-only input; this never
    /// returns an error.
    pub async fn initialize<R: XrRuntime>(&mut self, runtime: &mut R, floor: EntityId) -> XrStatus {
        let result = if runtime.is_session_supported().await {
            runtime.request_session(floor).await
        } else {
            Err(XrError::Unsupported)
        };
        match result {
            Ok(session) => {
                tracing::info!(target: "xr", "immersive session {} started (floor {})", session.id, session.floor);
                self.session = Some(session);
                self.status = XrStatus::Immersive;
            }
            Err(err) => {
                tracing::warn!(target: "xr", "XR unavailable, continuing with pointer input: {err}");
                self.session = None;
                self.status = XrStatus::PointerOnly;
            }
        }
        self.status
    }

    pub fn initialize_blocking<R: XrRuntime>(&mut self, runtime: &mut R, floor: EntityId) -> XrStatus {
        pollster::block_on(self.initialize(runtime, floor))
    }

    /// Skips negotiation entirely, e.g. when there is no floor to anchor a session to.
    pub fn mark_pointer_only(&mut self, reason: &str) {
        tracing::warn!(target: "xr", "XR disabled, continuing with pointer input: {reason}");
        self.session = None;
        self.status = XrStatus::PointerOnly;
    }

    /// Forwards this frame's runtime events to the dispatcher, in order.
    pub fn pump<R: XrRuntime>(&mut self, runtime: &mut R, dispatcher: &mut InteractionDispatcher) -> Vec<DeckEvent> {
        let mut events = Vec::new();
        if self.status != XrStatus::Immersive {
            return events;
        }
        for event in runtime.poll_events() {
            match event {
                XrEvent::ControllerConnected(id) => {
                    if dispatcher.attach_controller(id) {
                        events.push(DeckEvent::ControllerAttached { controller: id });
                    }
                }
                XrEvent::ControllerDisconnected(id) => {
                    if dispatcher.detach_controller(id) {
                        events.push(DeckEvent::ControllerDetached { controller: id });
                    }
                }
                XrEvent::Trigger { id, pressed } => dispatcher.update_controller_trigger(id, pressed),
                XrEvent::Pose { id, ray } => dispatcher.update_controller_pose(id, ray),
                XrEvent::SessionEnded => {
                    tracing::warn!(target: "xr", "immersive session ended, falling back to pointer input");
                    let attached: Vec<_> = dispatcher.attached_controllers().collect();
                    for id in attached {
                        dispatcher.detach_controller(id);
                        events.push(DeckEvent::ControllerDetached { controller: id });
                    }
                    self.session = None;
                    self.status = XrStatus::PointerOnly;
                    break;
                }
            }
        }
        events
    }
}

impl Default for XrSessionManager {
    fn default() -> Self {
        Self::new()
    }
}
