//! Falling-snow simulation core.
//!
//! A fixed pool of flakes integrates gravity, wind, drag, turbulence and an
//! optional "quantum" jitter every frame. Drawing goes through the [`Surface`]
//! trait and random draws through the [`Sampler`] trait, so the egui front end
//! and the tests can both drive the same code.

use std::f32::consts::{FRAC_PI_3, PI, TAU};

use glam::Vec2;
use rand::prelude::*;
use rayon::prelude::*;

/// How fast a flake's drawn orientation turns toward its velocity direction,
/// in fractions of the remaining arc per second.
const ALIGNMENT_RATE: f32 = 2.0;

/// Horizontal dead zone beyond either side edge before a flake is recycled.
const SIDE_MARGIN: f32 = 50.0;
/// Vertical dead zone below the bottom edge before a flake is recycled.
const BOTTOM_MARGIN: f32 = 10.0;
/// Recycled flakes re-enter just above the top edge.
const RESPAWN_Y: f32 = -10.0;

/// Height of the band above the bottom edge where tunneling can trigger.
const TUNNEL_BAND: f32 = 20.0;
const TUNNEL_CHANCE: f32 = 0.01;

// Frame deltas are wall-clock measurements, so they can be zero, negative
// (clock weirdness) or huge (window suspended). Clamping keeps the
// integration from stalling or exploding without touching ordinary deltas.
const MIN_DT: f32 = 1e-6;
const MAX_DT: f32 = 0.25;

/// A source of independent uniform `[0, 1)` draws.
///
/// The simulation takes this as a capability rather than reaching for a
/// global rng: any [`rand::Rng`] works out of the box, and tests can script
/// an exact sequence of draws.
pub trait Sampler {
    fn uniform(&mut self) -> f32;

    fn range(&mut self, lo: f32, hi: f32) -> f32 {
        lo + self.uniform() * (hi - lo)
    }
}

impl<R: Rng> Sampler for R {
    fn uniform(&mut self) -> f32 {
        self.gen_range(0.0..1.0)
    }
}

/// Current drawable area, re-read from the live window every call so resizes
/// take effect immediately.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }
}

/// Stroke style for a whole path. RGBA with straight alpha.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Style {
    pub line_width: f32,
    pub color: [u8; 4],
}

/// Semi-transparent white, 1px: every flake is stroked with this.
pub const FLAKE_STYLE: Style = Style {
    line_width: 1.0,
    color: [255, 255, 255, 204],
};

/// Minimal 2D drawing capability the simulation renders against: a clearable
/// surface with a save/restore transform stack and stroked line paths.
///
/// Path points are captured under the transform current at the time they are
/// added, so rotating mid-path affects only subsequent segments.
pub trait Surface {
    fn clear(&mut self);
    fn save(&mut self);
    fn restore(&mut self);
    fn translate(&mut self, dx: f32, dy: f32);
    fn rotate(&mut self, radians: f32);
    fn begin_path(&mut self);
    fn move_to(&mut self, x: f32, y: f32);
    fn line_to(&mut self, x: f32, y: f32);
    fn stroke(&mut self, style: Style);
}

/// Runtime-mutable simulation parameters. The UI writes these; the simulation
/// only ever reads them, once per update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tunables {
    /// Downward acceleration, px/s^2.
    pub gravity: f32,
    /// Amplitude of the traveling horizontal wind wave.
    pub wind_strength: f32,
    /// Scales the stochastic acceleration term; 0 disables it.
    pub quantum_factor: f32,
    /// Gates both the quantum acceleration draws and tunneling.
    pub quantum_enabled: bool,
    pub drag: f32,
    pub turbulence: f32,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            gravity: 30.0,
            wind_strength: 10.0,
            quantum_factor: 0.0,
            quantum_enabled: false,
            drag: 0.05,
            turbulence: 2.0,
        }
    }
}

/// Interpolate `a` toward `b` by fraction `t` along the shortest angular
/// path. The only place wrap-around correctness matters: a plain lerp would
/// spin flakes the long way around when the target crosses ±π.
pub fn lerp_angle(a: f32, b: f32, t: f32) -> f32 {
    let mut diff = b - a;
    while diff > PI {
        diff -= TAU;
    }
    while diff < -PI {
        diff += TAU;
    }
    a + diff * t
}

/// One snowflake. Owned exclusively by its [`ParticleField`]; all state is
/// replaced in place by [`Particle::reset`], never reallocated.
#[derive(Clone, Copy, Debug)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    /// Drawn scale, in [2, 4). Only `reset` writes this.
    pub size: f32,
    /// Current visual rotation in radians, not stored normalized.
    pub angle: f32,
    /// Intrinsic spin, radians/s, fixed between resets.
    pub spin: f32,
}

impl Particle {
    pub fn spawn(bounds: Bounds, rng: &mut impl Sampler) -> Self {
        let mut flake = Self {
            pos: Vec2::ZERO,
            vel: Vec2::ZERO,
            size: 2.0,
            angle: 0.0,
            spin: 0.0,
        };
        flake.reset(true, bounds, rng);
        flake
    }

    /// Full state replacement. Initial placement scatters flakes over the
    /// whole visible height; recycled flakes enter just above the top edge.
    pub fn reset(&mut self, initial: bool, bounds: Bounds, rng: &mut impl Sampler) {
        self.pos.x = rng.range(0.0, bounds.width);
        self.pos.y = if initial {
            rng.range(0.0, bounds.height)
        } else {
            RESPAWN_Y
        };
        self.vel = Vec2::ZERO;
        self.size = rng.range(2.0, 4.0);
        self.angle = rng.range(0.0, TAU);
        self.spin = rng.range(-0.25, 0.25);
    }

    /// Advance one tick. Consumes one turbulence draw always, two quantum
    /// draws only when the quantum term is live, and one tunneling draw only
    /// inside the tunnel band.
    pub fn update(
        &mut self,
        dt: f32,
        clock_ms: f64,
        bounds: Bounds,
        tunables: &Tunables,
        rng: &mut impl Sampler,
    ) {
        if !dt.is_finite() {
            return;
        }
        let dt = dt.clamp(MIN_DT, MAX_DT);

        // Wind couples elapsed time and horizontal position, so gusts form a
        // traveling spatial wave instead of pushing every flake uniformly.
        let wind_acc =
            tunables.wind_strength * ((clock_ms / 1000.0) as f32 + self.pos.x / 100.0).sin();
        let turbulence_acc = (rng.uniform() - 0.5) * tunables.turbulence;

        let mut ax = wind_acc + turbulence_acc - tunables.drag * self.vel.x;
        let mut ay = tunables.gravity - tunables.drag * self.vel.y;
        if tunables.quantum_enabled && tunables.quantum_factor != 0.0 {
            ax += tunables.quantum_factor * (rng.uniform() - 0.5) * 5.0;
            ay += tunables.quantum_factor * (rng.uniform() - 0.5) * 5.0;
        }

        // Semi-implicit Euler: velocity first, then position from the new
        // velocity. The order is the numeric contract.
        self.vel.x += ax * dt;
        self.vel.y += ay * dt;
        self.pos += self.vel * dt;

        let desired = self.vel.y.atan2(self.vel.x);
        self.angle = lerp_angle(self.angle + self.spin * dt, desired, ALIGNMENT_RATE * dt);

        // Tunneling runs before the boundary check; when both would fire the
        // flake teleports with its velocity intact instead of resetting.
        if tunables.quantum_enabled
            && self.pos.y > bounds.height - TUNNEL_BAND
            && rng.uniform() < TUNNEL_CHANCE
        {
            self.pos.y = RESPAWN_Y;
            return;
        }

        if self.pos.y > bounds.height + BOTTOM_MARGIN
            || self.pos.x < -SIDE_MARGIN
            || self.pos.x > bounds.width + SIDE_MARGIN
        {
            self.reset(false, bounds, rng);
        }
    }

    /// Draw a 6-fold radially symmetric branch pattern: one path, one stroke,
    /// local transform restored afterward so it never leaks to other flakes.
    pub fn render(&self, surface: &mut impl Surface) {
        surface.save();
        surface.translate(self.pos.x, self.pos.y);
        surface.rotate(self.angle);
        surface.begin_path();
        for _ in 0..6 {
            surface.move_to(0.0, 0.0);
            surface.line_to(self.size * 5.0, 0.0);
            surface.move_to(self.size * 3.0, 0.0);
            surface.line_to(self.size * 2.5, self.size);
            surface.move_to(self.size * 3.0, 0.0);
            surface.line_to(self.size * 2.5, -self.size);
            surface.rotate(FRAC_PI_3);
        }
        surface.stroke(FLAKE_STYLE);
        surface.restore();
    }
}

/// A fixed-size pool of flakes. Flakes are recycled in place; nothing is
/// allocated or dropped after construction.
pub struct ParticleField {
    pub flakes: Vec<Particle>,
}

impl ParticleField {
    pub fn new(count: usize, bounds: Bounds) -> Self {
        let flakes = (0..count)
            .into_par_iter()
            .map(|_| {
                let mut rng = rand::thread_rng();
                Particle::spawn(bounds, &mut rng)
            })
            .collect();
        log::debug!(
            "spawned {count} flakes in {}x{}",
            bounds.width,
            bounds.height
        );
        Self { flakes }
    }

    /// Flakes are independent, so this would parallelize; it runs
    /// sequentially to keep the draw sequence of the injected sampler
    /// well-defined.
    pub fn update(
        &mut self,
        dt: f32,
        clock_ms: f64,
        bounds: Bounds,
        tunables: &Tunables,
        rng: &mut impl Sampler,
    ) {
        for flake in &mut self.flakes {
            flake.update(dt, clock_ms, bounds, tunables, rng);
        }
    }

    /// Clear, then draw every flake in field order. Order only affects draw
    /// overlap, not correctness.
    pub fn render(&self, surface: &mut impl Surface) {
        surface.clear();
        for flake in &self.flakes {
            flake.render(surface);
        }
    }
}
