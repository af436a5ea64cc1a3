use crate::config::RetriggerPolicy;
use crate::ecs::{report_contract_violation, EntityId, EntityRegistry, FeedbackChannel, RegistryError, Transform3D};
use anyhow::{anyhow, Result};
use glam::{Quat, Vec3};
use std::cmp::Ordering;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn unit(self) -> Vec3 {
        match self {
            Axis::X => Vec3::X,
            Axis::Y => Vec3::Y,
            Axis::Z => Vec3::Z,
        }
    }
}

/// Transform property a clip drives. Values are relative to the pose captured when the clip
/// was attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnimatedProperty {
    /// Angle in radians about the axis.
    Rotation(Axis),
    /// Offset along the axis.
    Translation(Axis),
    /// Multiplier on the rest scale.
    UniformScale,
}

impl AnimatedProperty {
    fn apply(self, base: &Transform3D, value: f32, target: &mut Transform3D) {
        match self {
            AnimatedProperty::Rotation(axis) => {
                target.rotation = base.rotation * Quat::from_axis_angle(axis.unit(), value);
            }
            AnimatedProperty::Translation(axis) => {
                target.translation = base.translation + axis.unit() * value;
            }
            AnimatedProperty::UniformScale => {
                target.scale = base.scale * value;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    Cycle,
    Once,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipInterpolation {
    Step,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipKeyframe {
    pub time: f32,
    pub value: f32,
}

#[derive(Debug, Clone)]
pub struct AnimationClip {
    pub target: EntityId,
    pub property: AnimatedProperty,
    pub mode: LoopMode,
    pub interpolation: ClipInterpolation,
    keyframes: Arc<[ClipKeyframe]>,
    duration: f32,
}

impl AnimationClip {
    /// Builds a clip from `(time, value)` pairs. Keyframes are sorted by time; duplicates at the
    /// same time keep the last one supplied.
    pub fn new(
        target: EntityId,
        property: AnimatedProperty,
        keyframes: impl IntoIterator<Item = (f32, f32)>,
        mode: LoopMode,
    ) -> Result<Self> {
        let (keyframes, duration) = build_keyframes(keyframes)?;
        Ok(Self { target, property, mode, interpolation: ClipInterpolation::Linear, keyframes, duration })
    }

    pub fn with_interpolation(mut self, interpolation: ClipInterpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn keyframes(&self) -> &[ClipKeyframe] {
        &self.keyframes
    }

    /// Value at `time`, clamped to the first and last keyframes.
    pub fn sample(&self, time: f32) -> f32 {
        let frames = self.keyframes.as_ref();
        let first = frames[0];
        if frames.len() == 1 || time <= first.time {
            return first.value;
        }
        let last = frames[frames.len() - 1];
        if time >= last.time {
            return last.value;
        }
        // First keyframe strictly after `time`; always in 1..len here.
        let next = frames.partition_point(|kf| kf.time <= time);
        let a = frames[next - 1];
        let b = frames[next];
        match self.interpolation {
            ClipInterpolation::Step => a.value,
            ClipInterpolation::Linear => {
                let span = (b.time - a.time).max(f32::EPSILON);
                let t = ((time - a.time) / span).clamp(0.0, 1.0);
                a.value + (b.value - a.value) * t
            }
        }
    }
}

fn build_keyframes(raw: impl IntoIterator<Item = (f32, f32)>) -> Result<(Arc<[ClipKeyframe]>, f32)> {
    let mut frames: Vec<(usize, ClipKeyframe)> = Vec::new();
    for (index, (time, value)) in raw.into_iter().enumerate() {
        if !time.is_finite() {
            return Err(anyhow!("Clip keyframe time must be finite"));
        }
        if time < 0.0 {
            return Err(anyhow!("Clip keyframe time cannot be negative"));
        }
        if !value.is_finite() {
            return Err(anyhow!("Clip keyframe contains non-finite value"));
        }
        frames.push((index, ClipKeyframe { time, value }));
    }
    if frames.is_empty() {
        return Err(anyhow!("Clip must contain at least one keyframe"));
    }
    frames.sort_by(|a, b| {
        let time_order = a.1.time.partial_cmp(&b.1.time).unwrap_or(Ordering::Equal);
        if time_order == Ordering::Equal {
            a.0.cmp(&b.0)
        } else {
            time_order
        }
    });
    let mut deduped: Vec<ClipKeyframe> = Vec::with_capacity(frames.len());
    for (_, frame) in frames {
        if let Some(last) = deduped.last_mut() {
            if (frame.time - last.time).abs() <= f32::EPSILON {
                *last = frame;
                continue;
            }
        }
        deduped.push(frame);
    }
    let duration = deduped.last().map(|kf| kf.time).unwrap_or(0.0);
    Ok((Arc::from(deduped.into_boxed_slice()), duration))
}

struct ClipInstance {
    clip: AnimationClip,
    time: f32,
    base: Transform3D,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransientFeedback {
    pub target: EntityId,
    pub channel: FeedbackChannel,
    pub deadline: f64,
    pub snapshot: Vec3,
    pub applied: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeedbackState {
    Idle,
    Active { deadline: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackOutcome {
    Started,
    /// Restart policy: deadline pushed out, original snapshot kept.
    Extended,
    /// Drop policy: an activation arrived while feedback was still active.
    Ignored,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct AdvanceReport {
    pub reverted: Vec<EntityId>,
    pub finished_clips: Vec<(EntityId, AnimatedProperty)>,
}

/// Drives looping/once clips and polled transient feedback from one per-frame call.
#[derive(Default)]
pub struct AnimationController {
    clips: Vec<ClipInstance>,
    feedback: Vec<TransientFeedback>,
}

impl AnimationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `clip`, replacing any clip already driving the same entity property. A replaced
    /// clip hands over its rest pose so the new one does not start from a mid-animation pose.
    pub fn attach_clip(&mut self, clip: AnimationClip, registry: &EntityRegistry) -> Result<(), RegistryError> {
        let current = registry.transform(clip.target)?;
        if let Some(existing) = self
            .clips
            .iter_mut()
            .find(|instance| instance.clip.target == clip.target && instance.clip.property == clip.property)
        {
            existing.clip = clip;
            existing.time = 0.0;
            return Ok(());
        }
        self.clips.push(ClipInstance { clip, time: 0.0, base: current });
        Ok(())
    }

    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }

    pub fn clip_time(&self, entity: EntityId, property: AnimatedProperty) -> Option<f32> {
        self.clips
            .iter()
            .find(|instance| instance.clip.target == entity && instance.clip.property == property)
            .map(|instance| instance.time)
    }

    pub fn feedback_state(&self, entity: EntityId) -> FeedbackState {
        self.feedback
            .iter()
            .find(|fb| fb.target == entity)
            .map_or(FeedbackState::Idle, |fb| FeedbackState::Active { deadline: fb.deadline })
    }

    pub fn pending_feedback(&self) -> usize {
        self.feedback.len()
    }

    /// Applies `snapshot + delta` on `channel` now and schedules the revert at `now + duration`.
    #[allow(clippy::too_many_arguments)]
    pub fn begin_feedback(
        &mut self,
        entity: EntityId,
        channel: FeedbackChannel,
        delta: Vec3,
        duration: f64,
        now: f64,
        policy: RetriggerPolicy,
        registry: &mut EntityRegistry,
    ) -> Result<FeedbackOutcome, RegistryError> {
        let deadline = now + duration.max(0.0);
        if let Some(active) = self.feedback.iter_mut().find(|fb| fb.target == entity) {
            return match policy {
                RetriggerPolicy::Drop => Ok(FeedbackOutcome::Ignored),
                RetriggerPolicy::Restart => {
                    active.deadline = deadline;
                    let applied = active.applied;
                    registry.update_transform(entity, |t| channel.write(t, applied))?;
                    Ok(FeedbackOutcome::Extended)
                }
            };
        }
        let snapshot = channel.read(&registry.transform(entity)?);
        let applied = snapshot + delta;
        registry.update_transform(entity, |t| channel.write(t, applied))?;
        self.feedback.push(TransientFeedback { target: entity, channel, deadline, snapshot, applied });
        Ok(FeedbackOutcome::Started)
    }

    /// Advances clips by `dt` and reverts every feedback whose deadline is at or before `now`.
    pub fn advance(&mut self, dt: f32, now: f64, registry: &mut EntityRegistry) -> AdvanceReport {
        let mut report = AdvanceReport::default();
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };

        self.clips.retain_mut(|instance| {
            let target = instance.clip.target;
            if !registry.contains(target) {
                tracing::debug!(target: "animation", "dropping clip for removed entity {target}");
                return false;
            }
            let duration = instance.clip.duration();
            let mut finished = false;
            if duration <= 0.0 {
                instance.time = 0.0;
                finished = instance.clip.mode == LoopMode::Once;
            } else {
                let next = instance.time + dt;
                match instance.clip.mode {
                    LoopMode::Cycle => instance.time = next.rem_euclid(duration.max(f32::EPSILON)),
                    LoopMode::Once => {
                        instance.time = next.min(duration);
                        finished = next >= duration;
                    }
                }
            }
            let value = instance.clip.sample(instance.time);
            let property = instance.clip.property;
            let base = instance.base;
            if let Err(err) = registry.update_transform(target, |t| property.apply(&base, value, t)) {
                report_contract_violation("animation clip", &err);
            }
            if finished {
                report.finished_clips.push((target, property));
            }
            !finished
        });

        self.feedback.retain(|fb| {
            if !registry.contains(fb.target) {
                tracing::debug!(target: "animation", "dropping feedback for removed entity {}", fb.target);
                return false;
            }
            if now < fb.deadline {
                return true;
            }
            let (channel, snapshot) = (fb.channel, fb.snapshot);
            if let Err(err) = registry.update_transform(fb.target, |t| channel.write(t, snapshot)) {
                report_contract_violation("feedback revert", &err);
            }
            report.reverted.push(fb.target);
            false
        });

        report
    }
}
