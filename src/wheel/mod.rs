//! The spinning wheel: item selection, spin animation and winner calculation.
//!
//! A [`WheelEngine`] owns the items and the current rotation. A spin is started
//! with [`WheelEngine::start_spin`], which hands back a [`SpinTicket`]; the
//! animation is then stepped frame by frame with [`WheelEngine::advance`]
//! (usually through [`animate`]) and the ticket resolves once with the winner.

pub mod clock;
pub mod render;

use log::{debug, info};
use rand::Rng;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

use crate::error::AppError;
use crate::places::Place;
use clock::FrameClock;
use render::{Canvas, DrawList};

pub const DEFAULT_MAX_ITEMS: usize = 100;
pub const DEFAULT_SPIN_DURATION: Duration = Duration::from_millis(6000);
pub const DEFAULT_SIZE_PX: f64 = 500.0;
pub const MIN_FULL_TURNS: f64 = 6.0;

// Spin ids are unique across wheels so a stale driver never steps a newer spin.
static NEXT_SPIN_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelSettings {
    pub max_items: usize,
    pub spin_duration: Duration,
    pub size_px: f64,
}

impl Default for WheelSettings {
    fn default() -> Self {
        Self {
            max_items: DEFAULT_MAX_ITEMS,
            spin_duration: DEFAULT_SPIN_DURATION,
            size_px: DEFAULT_SIZE_PX,
        }
    }
}

pub fn ease_out_cubic(progress: f64) -> f64 {
    1.0 - (1.0 - progress).powi(3)
}

/// Index of the segment under the pointer (fixed at 0°) for a final rotation.
pub fn winning_index(final_rotation: f64, item_count: usize) -> Option<usize> {
    if item_count == 0 {
        return None;
    }
    let segment = 360.0 / item_count as f64;
    let offset = (360.0 - final_rotation.rem_euclid(360.0)).rem_euclid(360.0);
    let index = (offset / segment).floor() as usize;
    Some(index.min(item_count - 1))
}

/// Sorts nearest first and keeps at most `max_items`.
pub fn prepare_items<I>(places: I, max_items: usize) -> Vec<Place>
where
    I: IntoIterator<Item = Place>,
{
    let mut items: Vec<Place> = places.into_iter().collect();
    items.sort_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters));
    items.truncate(max_items);
    items
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WheelPhase {
    Idle,
    Spinning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStep {
    Continue,
    Finished,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpinOutcome {
    pub spin_id: u64,
    pub index: usize,
    pub place: Place,
    pub final_rotation: f64,
}

/// Handed out when a spin starts; resolves exactly once.
#[derive(Debug)]
pub struct SpinTicket {
    id: u64,
    outcome: oneshot::Receiver<SpinOutcome>,
}

impl SpinTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Resolves with the winner, or `Superseded` if another spin or a new
    /// item list replaced this one first.
    pub async fn outcome(self) -> Result<SpinOutcome, AppError> {
        self.outcome.await.map_err(|_| AppError::Superseded)
    }
}

#[derive(Debug)]
struct ActiveSpin {
    id: u64,
    started_at: Duration,
    start_rotation: f64,
    total_rotation: f64,
    done: oneshot::Sender<SpinOutcome>,
}

#[derive(Debug)]
pub struct WheelEngine {
    items: Vec<Place>,
    rotation: f64,
    settings: WheelSettings,
    active: Option<ActiveSpin>,
    frame: DrawList,
    frames_drawn: u64,
}

impl WheelEngine {
    pub fn new<I>(places: I, settings: WheelSettings) -> Self
    where
        I: IntoIterator<Item = Place>,
    {
        let items = prepare_items(places, settings.max_items);
        debug!("Wheel built with {} items", items.len());
        let mut engine = Self {
            items,
            rotation: 0.0,
            settings,
            active: None,
            frame: DrawList::default(),
            frames_drawn: 0,
        };
        engine.redraw();
        engine
    }

    pub fn items(&self) -> &[Place] {
        &self.items
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn phase(&self) -> WheelPhase {
        if self.active.is_some() {
            WheelPhase::Spinning
        } else {
            WheelPhase::Idle
        }
    }

    pub fn active_spin(&self) -> Option<u64> {
        self.active.as_ref().map(|spin| spin.id)
    }

    /// The most recently drawn frame.
    pub fn frame(&self) -> &DrawList {
        &self.frame
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    pub fn draw<C: Canvas>(&self, canvas: &mut C) {
        render::draw_wheel(canvas, &self.items, self.rotation, self.settings.size_px);
    }

    pub fn redraw(&mut self) {
        let mut frame = std::mem::take(&mut self.frame);
        self.draw(&mut frame);
        self.frame = frame;
        self.frames_drawn += 1;
    }

    /// Starts a spin of at least six full turns plus a random extra angle.
    /// A spin already in progress is replaced.
    pub fn start_spin<R: Rng + ?Sized>(&mut self, rng: &mut R, now: Duration) -> Result<SpinTicket, AppError> {
        let extra: f64 = rng.gen_range(0.0..360.0);
        self.start_spin_by(MIN_FULL_TURNS * 360.0 + extra, now)
    }

    fn start_spin_by(&mut self, total_rotation: f64, now: Duration) -> Result<SpinTicket, AppError> {
        if self.items.is_empty() {
            return Err(AppError::SpinUnavailable("the wheel has no places".to_string()));
        }

        let id = NEXT_SPIN_ID.fetch_add(1, Ordering::Relaxed);
        let (done, outcome) = oneshot::channel();
        if let Some(previous) = self.active.replace(ActiveSpin {
            id,
            started_at: now,
            start_rotation: self.rotation,
            total_rotation,
            done,
        }) {
            debug!("Spin {} replaced by spin {}", previous.id, id);
        }
        debug!("Spin {} started: {:.1} degrees over {:?}", id, total_rotation, self.settings.spin_duration);
        Ok(SpinTicket { id, outcome })
    }

    /// Moves spin `spin_id` to time `now` and redraws. Returns `Finished` once the
    /// spin has landed, or if it is no longer the active one.
    pub fn advance(&mut self, spin_id: u64, now: Duration) -> FrameStep {
        let (started_at, start_rotation, total_rotation) = match &self.active {
            Some(spin) if spin.id == spin_id => (spin.started_at, spin.start_rotation, spin.total_rotation),
            _ => return FrameStep::Finished,
        };

        let elapsed = now.saturating_sub(started_at).as_secs_f64();
        let duration = self.settings.spin_duration.as_secs_f64();
        let progress = if duration > 0.0 { (elapsed / duration).min(1.0) } else { 1.0 };
        self.rotation = start_rotation + ease_out_cubic(progress) * total_rotation;
        self.redraw();

        if progress < 1.0 {
            return FrameStep::Continue;
        }

        let final_rotation = self.rotation;
        self.rotation = final_rotation.rem_euclid(360.0);
        if let Some(spin) = self.active.take() {
            if let Some(index) = winning_index(final_rotation, self.items.len()) {
                let place = self.items[index].clone();
                info!("Spin {} landed on #{}: {}", spin.id, index, place.name);
                // the ticket may already be gone; nothing else to notify
                let _ = spin.done.send(SpinOutcome {
                    spin_id: spin.id,
                    index,
                    place,
                    final_rotation,
                });
            }
        }
        FrameStep::Finished
    }
}

/// Runs frames from `clock` through `step` until it reports `Finished`.
/// Returns the number of frames taken.
pub async fn animate<C, F>(clock: &mut C, mut step: F) -> u64
where
    C: FrameClock,
    F: FnMut(Duration) -> FrameStep,
{
    let mut frames = 0;
    loop {
        let now = clock.next_frame().await;
        frames += 1;
        if step(now) == FrameStep::Finished {
            return frames;
        }
    }
}
