use crate::config::ParticleConfig;
use crate::effects::{ParticleBackend, ParticleHandle, ParticleRequest};
use glam::{Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleCaps {
    pub max_spawn_per_frame: u32,
    pub max_total: u32,
    pub max_emitter_backlog: f32,
}

impl ParticleCaps {
    pub fn from_config(config: &ParticleConfig) -> Self {
        Self {
            max_spawn_per_frame: config.max_spawn_per_frame,
            max_total: config.max_total,
            max_emitter_backlog: config.max_emitter_backlog.max(0.0),
        }
    }
}

impl Default for ParticleCaps {
    fn default() -> Self {
        Self::from_config(&ParticleConfig::default())
    }
}

#[derive(Debug, Clone)]
struct Emitter {
    handle: ParticleHandle,
    request: ParticleRequest,
    accumulator: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    pub lifetime: f32,
    pub max_lifetime: f32,
    pub size: f32,
    pub color: Vec4,
    start_size: f32,
    end_size: f32,
    start_color: Vec4,
    end_color: Vec4,
}

/// CPU particle simulation backing [`ParticleBackend`].
///
/// Emitters accumulate `rate * dt` and spawn whole particles out of that backlog, bounded by
/// a per-frame budget and a global cap.
pub struct ParticlePool {
    caps: ParticleCaps,
    emitters: Vec<Emitter>,
    particles: Vec<Particle>,
    next_handle: u64,
    rng: StdRng,
}

impl ParticlePool {
    pub fn new(caps: ParticleCaps) -> Self {
        Self::with_rng(caps, StdRng::from_entropy())
    }

    pub fn with_seed(caps: ParticleCaps, seed: u64) -> Self {
        Self::with_rng(caps, StdRng::seed_from_u64(seed))
    }

    fn with_rng(caps: ParticleCaps, rng: StdRng) -> Self {
        Self { caps, emitters: Vec::new(), particles: Vec::new(), next_handle: 0, rng }
    }

    pub fn active_particles(&self) -> usize {
        self.particles.len()
    }

    pub fn active_emitters(&self) -> usize {
        self.emitters.len()
    }

    pub fn is_emitting(&self, handle: ParticleHandle) -> bool {
        self.emitters.iter().any(|emitter| emitter.handle == handle)
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    fn step_particles(&mut self, dt: f32) {
        self.particles.retain_mut(|particle| {
            particle.lifetime -= dt;
            if particle.lifetime <= 0.0 {
                return false;
            }
            let life_ratio = (particle.lifetime / particle.max_lifetime).clamp(0.0, 1.0);
            let progress = 1.0 - life_ratio;
            particle.size = (particle.start_size + (particle.end_size - particle.start_size) * progress).max(0.001);
            particle.color = particle.start_color + (particle.end_color - particle.start_color) * progress;
            particle.position += particle.velocity * dt;
            particle.velocity *= 0.98;
            true
        });
    }

    fn spawn_from_emitters(&mut self, dt: f32) {
        let max_total = self.caps.max_total as usize;
        let mut headroom = max_total.saturating_sub(self.particles.len());
        let mut frame_budget = headroom.min(self.caps.max_spawn_per_frame as usize);
        let backlog = self.caps.max_emitter_backlog;

        for index in 0..self.emitters.len() {
            let emitter = &mut self.emitters[index];
            emitter.accumulator = (emitter.accumulator + emitter.request.rate.max(0.0) * dt).min(backlog);
            if frame_budget == 0 || headroom == 0 {
                continue;
            }
            let desired = emitter.accumulator.floor() as usize;
            let to_spawn = desired.min(frame_budget).min(headroom);
            if to_spawn == 0 {
                continue;
            }
            emitter.accumulator -= to_spawn as f32;
            let request = emitter.request.clone();
            for _ in 0..to_spawn {
                let particle = self.make_particle(&request);
                self.particles.push(particle);
            }
            frame_budget -= to_spawn;
            headroom -= to_spawn;
        }
    }

    fn make_particle(&mut self, request: &ParticleRequest) -> Particle {
        let dir = random_unit_vector(&mut self.rng);
        let (life_lo, life_hi) = request.lifetime_range;
        let (size_lo, size_hi) = request.size_range;
        let lifetime = if life_hi > life_lo { self.rng.gen_range(life_lo..=life_hi) } else { life_lo };
        let start_size = if size_hi > size_lo { self.rng.gen_range(size_lo..=size_hi) } else { size_lo };
        Particle {
            position: request.position + dir * 0.05,
            velocity: dir * request.speed,
            lifetime,
            max_lifetime: lifetime.max(f32::EPSILON),
            size: start_size,
            color: request.color_start,
            start_size,
            end_size: start_size * 0.25,
            start_color: request.color_start,
            end_color: request.color_end,
        }
    }
}

impl Default for ParticlePool {
    fn default() -> Self {
        Self::new(ParticleCaps::default())
    }
}

fn random_unit_vector(rng: &mut StdRng) -> Vec3 {
    loop {
        let candidate = Vec3::new(rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0));
        let len_sq = candidate.length_squared();
        if len_sq > 1e-4 && len_sq <= 1.0 {
            return candidate / len_sq.sqrt();
        }
    }
}

impl ParticleBackend for ParticlePool {
    fn spawn(&mut self, request: &ParticleRequest) -> ParticleHandle {
        self.next_handle += 1;
        let handle = ParticleHandle(self.next_handle);
        self.emitters.push(Emitter { handle, request: request.clone(), accumulator: 0.0 });
        handle
    }

    fn restart(&mut self, handle: ParticleHandle, position: Vec3) {
        match self.emitters.iter_mut().find(|emitter| emitter.handle == handle) {
            Some(emitter) => {
                emitter.request.position = position;
                emitter.accumulator = 0.0;
            }
            None => tracing::debug!(target: "particles", "restart for stopped {handle} ignored"),
        }
    }

    /// Stops emission; particles already alive fade out on their own.
    fn stop(&mut self, handle: ParticleHandle) {
        self.emitters.retain(|emitter| emitter.handle != handle);
    }

    fn update(&mut self, dt: f32) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.step_particles(dt);
        self.spawn_from_emitters(dt);
    }
}
