//! # HEARTH Game Loop
//!
//! Drives every world once per frame:
//! ```text
//! Frame N:
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ 1. BEGIN FRAME                                                      │
//! │    └─ Measure delta since last frame, clamp to max_delta            │
//! │                                                                     │
//! │ 2. WORLD UPDATES (in world index order)                             │
//! │    ├─ World 0: init ─ messages ─ phases ─ transforms ─ deletions    │
//! │    ├─ World 1: ...                                                  │
//! │    └─ Phase tasks of every world share one rayon pool               │
//! │                                                                     │
//! │ 3. END FRAME                                                        │
//! │    ├─ Sum per-world timings into FrameStats                         │
//! │    └─ Sleep for the rest of the frame budget                        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::{Duration, Instant};

use hearth_core::scene::FrameTimings;
use hearth_core::{World, WorldDesc};
use hearth_shared::{DEFAULT_MAX_DELTA_SECONDS, DEFAULT_TARGET_FPS, MAX_WORLDS};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};

/// Frame time above which a frame counts as over budget when timing logs
/// are on.
pub const MAX_FRAME_TIME: Duration = Duration::from_millis(33);

/// Configuration for the game loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameLoopConfig {
    /// Target frames per second.
    pub target_fps: u32,
    /// Largest delta time passed to a world, in seconds.
    pub max_delta_seconds: f32,
    /// Log frames that exceed their budget.
    pub enable_timing_logs: bool,
}

impl Default for GameLoopConfig {
    fn default() -> Self {
        Self {
            target_fps: DEFAULT_TARGET_FPS,
            max_delta_seconds: DEFAULT_MAX_DELTA_SECONDS,
            enable_timing_logs: false,
        }
    }
}

impl GameLoopConfig {
    /// Time budget of one frame.
    #[must_use]
    pub fn target_frame_time(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.target_fps.max(1)))
    }
}

/// Frame timing statistics, summed over all worlds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Total frame time in microseconds.
    pub total_us: u64,
    /// Component initialization in microseconds.
    pub init_us: u64,
    /// Message queue delivery in microseconds.
    pub messages_us: u64,
    /// Update phases in microseconds, indexed like `UpdatePhase::ALL`.
    pub phase_us: [u64; 4],
    /// Global transform refresh in microseconds.
    pub transforms_us: u64,
    /// Deferred deletions in microseconds.
    pub deletions_us: u64,
    /// Frame number.
    pub frame: u64,
    /// Worlds updated this frame.
    pub worlds: u32,
}

fn micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

impl FrameStats {
    fn add_world(&mut self, timings: &FrameTimings) {
        self.init_us += micros(timings.init);
        self.messages_us += micros(timings.messages);
        for (sum, phase) in self.phase_us.iter_mut().zip(timings.phases) {
            *sum += micros(phase);
        }
        self.transforms_us += micros(timings.transforms);
        self.deletions_us += micros(timings.deletions);
        self.worlds += 1;
    }

    /// Time spent in update phases in microseconds.
    #[must_use]
    pub fn phases_total_us(&self) -> u64 {
        self.phase_us.iter().sum()
    }
}

/// The main game loop orchestrator.
///
/// Owns the worlds, ordered by world index, and manages the frame
/// lifecycle.
pub struct GameLoop {
    /// Worlds in index order.
    worlds: Vec<World>,
    /// Configuration.
    config: GameLoopConfig,
    /// Frame counter.
    frame_count: u64,
    /// Last frame start time.
    last_frame_time: Instant,
    /// Accumulated frame statistics.
    stats_accumulator: FrameStatsAccumulator,
}

impl GameLoop {
    /// Creates a game loop without worlds.
    #[must_use]
    pub fn new(config: GameLoopConfig) -> Self {
        Self {
            worlds: Vec::new(),
            config,
            frame_count: 0,
            last_frame_time: Instant::now(),
            stats_accumulator: FrameStatsAccumulator::new(),
        }
    }

    /// Creates a game loop with the configured initial world.
    ///
    /// Does not touch the worker pool; see
    /// [`SchedulerConfig::build_global_pool`](crate::SchedulerConfig::build_global_pool).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the configuration is invalid.
    pub fn from_config(config: &EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let mut game_loop = Self::new(config.game_loop.clone());
        game_loop.add_world(config.world.clone())?;
        Ok(game_loop)
    }

    /// Creates a world and inserts it in index order.
    ///
    /// # Errors
    ///
    /// [`EngineError::DuplicateWorldIndex`] if the index is taken,
    /// [`EngineError::TooManyWorlds`] if all indices are in use.
    pub fn add_world(&mut self, desc: WorldDesc) -> EngineResult<&mut World> {
        if self.worlds.len() >= MAX_WORLDS {
            return Err(EngineError::TooManyWorlds(MAX_WORLDS));
        }
        let position = match self.worlds.binary_search_by_key(&desc.index, World::index) {
            Ok(_) => return Err(EngineError::DuplicateWorldIndex(desc.index)),
            Err(position) => position,
        };
        self.worlds.insert(position, World::new(desc));
        Ok(&mut self.worlds[position])
    }

    /// Removes a world. It is cleared when dropped.
    pub fn remove_world(&mut self, index: u8) -> Option<World> {
        let position = self.worlds.binary_search_by_key(&index, World::index).ok()?;
        Some(self.worlds.remove(position))
    }

    /// The world with the given index.
    #[must_use]
    pub fn world(&self, index: u8) -> Option<&World> {
        let position = self.worlds.binary_search_by_key(&index, World::index).ok()?;
        self.worlds.get(position)
    }

    /// The world with the given index, mutably.
    pub fn world_mut(&mut self, index: u8) -> Option<&mut World> {
        let position = self.worlds.binary_search_by_key(&index, World::index).ok()?;
        self.worlds.get_mut(position)
    }

    /// All worlds in index order.
    #[must_use]
    pub fn worlds(&self) -> &[World] {
        &self.worlds
    }

    /// Measures the time since the last frame and runs one frame.
    pub fn tick(&mut self) -> FrameStats {
        let now = Instant::now();
        let delta = now.duration_since(self.last_frame_time);
        self.last_frame_time = now;
        self.step(delta.as_secs_f32())
    }

    /// Runs one frame with the given delta time.
    ///
    /// The delta is clamped to `max_delta_seconds` so a long stall does not
    /// explode the simulation.
    pub fn step(&mut self, delta_seconds: f32) -> FrameStats {
        let frame_start = Instant::now();
        let delta_seconds = delta_seconds.clamp(0.0, self.config.max_delta_seconds);

        let mut stats = FrameStats {
            frame: self.frame_count,
            ..FrameStats::default()
        };
        for world in &mut self.worlds {
            world.update(delta_seconds);
            stats.add_world(&world.last_frame_timings());
        }
        stats.total_us = micros(frame_start.elapsed());

        self.end_frame(stats);
        stats
    }

    /// Runs `frames` frames, sleeping out the remaining budget of each.
    pub fn run_frames(&mut self, frames: u64) {
        let budget = self.config.target_frame_time();
        for _ in 0..frames {
            let start = Instant::now();
            self.tick();
            if let Some(rest) = budget.checked_sub(start.elapsed()) {
                std::thread::sleep(rest);
            }
        }
    }

    /// Runs frames until `should_stop` returns true, checked before each
    /// frame.
    pub fn run_until<F>(&mut self, mut should_stop: F)
    where
        F: FnMut(&Self) -> bool,
    {
        while !should_stop(self) {
            self.run_frames(1);
        }
    }

    /// Records timing and prepares for the next frame.
    fn end_frame(&mut self, stats: FrameStats) {
        self.frame_count += 1;
        self.stats_accumulator.record(stats, self.config.target_frame_time());

        // Log slow frames
        if self.config.enable_timing_logs && stats.total_us > micros(MAX_FRAME_TIME) {
            tracing::warn!(
                frame = stats.frame,
                total_ms = stats.total_us as f64 / 1000.0,
                target_ms = self.config.target_frame_time().as_secs_f64() * 1000.0,
                "frame exceeded budget"
            );
        }
    }

    /// Returns the current frame count.
    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &GameLoopConfig {
        &self.config
    }

    /// Returns the accumulated statistics.
    #[must_use]
    pub fn stats(&self) -> &FrameStatsAccumulator {
        &self.stats_accumulator
    }
}

/// Accumulator for frame statistics.
#[derive(Clone, Debug)]
pub struct FrameStatsAccumulator {
    /// Total frames recorded.
    pub frames_recorded: u64,
    /// Sum of total frame times.
    pub total_us_sum: u64,
    /// Sum of initialization times.
    pub init_us_sum: u64,
    /// Sum of message delivery times.
    pub messages_us_sum: u64,
    /// Sum of update phase times.
    pub phases_us_sum: u64,
    /// Sum of transform refresh times.
    pub transforms_us_sum: u64,
    /// Min frame time.
    pub min_frame_us: u64,
    /// Max frame time.
    pub max_frame_us: u64,
    /// Frames that exceeded budget.
    pub frames_over_budget: u64,
}

impl FrameStatsAccumulator {
    /// Creates a new accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            frames_recorded: 0,
            total_us_sum: 0,
            init_us_sum: 0,
            messages_us_sum: 0,
            phases_us_sum: 0,
            transforms_us_sum: 0,
            min_frame_us: u64::MAX,
            max_frame_us: 0,
            frames_over_budget: 0,
        }
    }

    /// Records a frame's statistics against a frame budget.
    pub fn record(&mut self, stats: FrameStats, budget: Duration) {
        self.frames_recorded += 1;
        self.total_us_sum += stats.total_us;
        self.init_us_sum += stats.init_us;
        self.messages_us_sum += stats.messages_us;
        self.phases_us_sum += stats.phases_total_us();
        self.transforms_us_sum += stats.transforms_us;
        self.min_frame_us = self.min_frame_us.min(stats.total_us);
        self.max_frame_us = self.max_frame_us.max(stats.total_us);

        if stats.total_us > micros(budget) {
            self.frames_over_budget += 1;
        }
    }

    fn average_ms(&self, sum_us: u64) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        (sum_us as f64 / self.frames_recorded as f64) / 1000.0
    }

    /// Returns average frame time in milliseconds.
    #[must_use]
    pub fn avg_frame_ms(&self) -> f64 {
        self.average_ms(self.total_us_sum)
    }

    /// Returns average FPS.
    #[must_use]
    pub fn avg_fps(&self) -> f64 {
        let avg_ms = self.avg_frame_ms();
        if avg_ms <= 0.0 {
            return 0.0;
        }
        1000.0 / avg_ms
    }

    /// Returns the fraction of frames over budget.
    #[must_use]
    pub fn over_budget_ratio(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        self.frames_over_budget as f64 / self.frames_recorded as f64
    }

    /// Logs a summary of the statistics.
    pub fn log_summary(&self) {
        if self.frames_recorded == 0 {
            tracing::info!("no frames recorded");
            return;
        }
        tracing::info!(
            frames = self.frames_recorded,
            avg_ms = self.avg_frame_ms(),
            avg_fps = self.avg_fps(),
            min_ms = self.min_frame_us as f64 / 1000.0,
            max_ms = self.max_frame_us as f64 / 1000.0,
            over_budget = self.frames_over_budget,
            "frame timing"
        );
        tracing::info!(
            init_ms = self.average_ms(self.init_us_sum),
            messages_ms = self.average_ms(self.messages_us_sum),
            phases_ms = self.average_ms(self.phases_us_sum),
            transforms_ms = self.average_ms(self.transforms_us_sum),
            "frame breakdown"
        );
    }
}

impl Default for FrameStatsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::GameObjectDesc;

    fn desc(name: &str, index: u8) -> WorldDesc {
        WorldDesc {
            name: name.to_owned(),
            index,
            ..WorldDesc::default()
        }
    }

    #[test]
    fn test_game_loop_creation() {
        let game_loop = GameLoop::new(GameLoopConfig::default());
        assert_eq!(game_loop.frame_count(), 0);
        assert!(game_loop.worlds().is_empty());
    }

    #[test]
    fn test_from_config_creates_world() {
        let game_loop = GameLoop::from_config(&EngineConfig::default()).unwrap();
        assert_eq!(game_loop.worlds().len(), 1);
        assert!(game_loop.world(0).is_some());
    }

    #[test]
    fn test_worlds_kept_in_index_order() {
        let mut game_loop = GameLoop::new(GameLoopConfig::default());
        game_loop.add_world(desc("b", 5)).unwrap();
        game_loop.add_world(desc("a", 2)).unwrap();
        game_loop.add_world(desc("c", 9)).unwrap();

        let indices: Vec<u8> = game_loop.worlds().iter().map(World::index).collect();
        assert_eq!(indices, vec![2, 5, 9]);
        assert_eq!(game_loop.world(5).unwrap().name(), "b");
    }

    #[test]
    fn test_duplicate_world_index() {
        let mut game_loop = GameLoop::new(GameLoopConfig::default());
        game_loop.add_world(desc("a", 1)).unwrap();
        let result = game_loop.add_world(desc("b", 1));
        assert!(matches!(result, Err(EngineError::DuplicateWorldIndex(1))));
    }

    #[test]
    fn test_remove_world() {
        let mut game_loop = GameLoop::new(GameLoopConfig::default());
        game_loop.add_world(desc("a", 1)).unwrap();
        assert!(game_loop.remove_world(1).is_some());
        assert!(game_loop.remove_world(1).is_none());
        assert!(game_loop.world(1).is_none());
    }

    #[test]
    fn test_step_updates_every_world() {
        let mut game_loop = GameLoop::new(GameLoopConfig::default());
        game_loop.add_world(desc("a", 0)).unwrap();
        game_loop.add_world(desc("b", 1)).unwrap();

        let stats = game_loop.step(1.0 / 60.0);
        assert_eq!(stats.frame, 0);
        assert_eq!(stats.worlds, 2);
        assert_eq!(game_loop.frame_count(), 1);
        assert_eq!(game_loop.world(0).unwrap().frame(), 1);
        assert_eq!(game_loop.world(1).unwrap().frame(), 1);
    }

    #[test]
    fn test_delta_is_clamped() {
        let config = GameLoopConfig {
            max_delta_seconds: 0.05,
            ..GameLoopConfig::default()
        };
        let mut game_loop = GameLoop::new(config);
        game_loop.add_world(desc("a", 0)).unwrap();

        game_loop.step(2.0);
        let clock = game_loop.world(0).unwrap().clock();
        assert!((clock.delta_seconds() - 0.05).abs() < f32::EPSILON);

        game_loop.step(-1.0);
        assert!(game_loop.world(0).unwrap().clock().delta_seconds().abs() < f32::EPSILON);
    }

    #[test]
    fn test_worlds_are_independent() {
        let mut game_loop = GameLoop::new(GameLoopConfig::default());
        game_loop.add_world(desc("a", 0)).unwrap();
        game_loop.add_world(desc("b", 1)).unwrap();

        let object = game_loop
            .world_mut(0)
            .unwrap()
            .create_object(GameObjectDesc::new("only-in-a"))
            .unwrap();
        game_loop.step(0.016);

        assert!(game_loop.world(0).unwrap().contains_object(object));
        assert!(!game_loop.world(1).unwrap().contains_object(object));
    }

    #[test]
    fn test_run_frames() {
        let config = GameLoopConfig {
            target_fps: 1000,
            ..GameLoopConfig::default()
        };
        let mut game_loop = GameLoop::new(config);
        game_loop.add_world(desc("a", 0)).unwrap();

        game_loop.run_until(|lp| lp.frame_count() >= 3);
        assert_eq!(game_loop.frame_count(), 3);
        assert_eq!(game_loop.stats().frames_recorded, 3);
    }

    #[test]
    fn test_stats_accumulator() {
        let mut acc = FrameStatsAccumulator::new();
        let budget = Duration::from_micros(16_666);

        for i in 0..100 {
            acc.record(
                FrameStats {
                    total_us: 10_000 + (i * 100),
                    init_us: 500,
                    messages_us: 1000,
                    phase_us: [1000, 4000, 1000, 500],
                    transforms_us: 2000,
                    deletions_us: 100,
                    frame: i,
                    worlds: 1,
                },
                budget,
            );
        }

        assert_eq!(acc.frames_recorded, 100);
        assert_eq!(acc.phases_us_sum, 650_000);
        assert!(acc.avg_fps() > 50.0);
        assert!(acc.avg_fps() < 100.0);
        // 10_000 + i * 100 exceeds 16_666 for i in 67..100.
        assert_eq!(acc.frames_over_budget, 33);
    }
}
