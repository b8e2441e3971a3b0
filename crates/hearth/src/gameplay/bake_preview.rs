//! # Bake Preview
//!
//! One per world. While active, a background thread renders a preview
//! image row by row into a shared buffer; deactivation cancels the bake and
//! waits for the thread before the buffer is released.

use std::sync::Arc;
use std::time::Duration;

use hearth_core::scene::{Component, ComponentContext, ComponentManager, UpdateFunctionDesc, UpdatePhase};
use hearth_core::sync::{BackgroundTask, CancellationToken};
use hearth_shared::Vec3;
use parking_lot::Mutex;

/// Default edge length of the preview image in pixels.
pub const DEFAULT_PREVIEW_RESOLUTION: u32 = 64;

/// How a bake ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BakeOutcome {
    /// Every row was written.
    Completed,
    /// Canceled after this many rows.
    Canceled {
        /// Rows written before the cancel.
        rows: u32,
    },
}

/// Preview image shared with the bake thread.
#[derive(Debug, Default)]
struct PreviewImage {
    resolution: u32,
    pixels: Vec<u32>,
    rows_done: u32,
}

/// Bakes a preview image of its owner's surroundings in the background.
pub struct BakePreviewComponent {
    /// Edge length of the square preview in pixels.
    pub resolution: u32,
    /// Pause between two rows.
    pub row_interval: Duration,
    image: Arc<Mutex<PreviewImage>>,
    task: Option<BackgroundTask<BakeOutcome>>,
    last_outcome: Option<BakeOutcome>,
    bakes_started: u32,
}

impl Default for BakePreviewComponent {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_PREVIEW_RESOLUTION,
            row_interval: Duration::ZERO,
            image: Arc::default(),
            task: None,
            last_outcome: None,
            bakes_started: 0,
        }
    }
}

impl BakePreviewComponent {
    /// A preview with the given resolution.
    #[must_use]
    pub fn with_resolution(resolution: u32) -> Self {
        Self {
            resolution,
            ..Self::default()
        }
    }

    /// True while a bake thread is attached.
    #[must_use]
    pub fn is_baking(&self) -> bool {
        self.task.is_some()
    }

    /// Fraction of rows written, 0.0..=1.0.
    #[must_use]
    pub fn progress(&self) -> f32 {
        let image = self.image.lock();
        if image.resolution == 0 {
            return 0.0;
        }
        image.rows_done as f32 / image.resolution as f32
    }

    /// Copy of the preview pixels (RGBA8, row-major). Empty once released.
    #[must_use]
    pub fn pixels(&self) -> Vec<u32> {
        self.image.lock().pixels.clone()
    }

    /// How the last joined bake ended.
    #[must_use]
    pub const fn last_outcome(&self) -> Option<BakeOutcome> {
        self.last_outcome
    }

    /// Number of bakes started.
    #[must_use]
    pub const fn bakes_started(&self) -> u32 {
        self.bakes_started
    }

    fn start_bake(&mut self, origin: Vec3) {
        let resolution = self.resolution;
        {
            let mut image = self.image.lock();
            image.resolution = resolution;
            image.rows_done = 0;
            image.pixels = vec![0; (resolution as usize) * (resolution as usize)];
        }

        let image = Arc::clone(&self.image);
        let row_interval = self.row_interval;
        let spawned = BackgroundTask::spawn("bake-preview", move |token| {
            bake_rows(&image, resolution, origin, row_interval, &token)
        });

        match spawned {
            Ok(task) => {
                self.bakes_started += 1;
                self.task = Some(task);
            }
            Err(error) => tracing::warn!(%error, "bake preview not started"),
        }
    }

    /// Joins a finished bake.
    fn poll(&mut self) {
        if self.task.as_ref().is_some_and(BackgroundTask::is_finished) {
            self.finish_bake(false);
        }
    }

    /// Joins the bake thread, canceling it first if asked, then optionally
    /// releases the image.
    fn finish_bake(&mut self, cancel: bool) {
        let Some(mut task) = self.task.take() else {
            return;
        };
        let result = if cancel { task.cancel_and_join() } else { task.join() };
        match result {
            Ok(outcome) => {
                tracing::debug!(?outcome, "bake preview joined");
                self.last_outcome = Some(outcome);
            }
            Err(error) => tracing::warn!(%error, "bake preview failed"),
        }
    }

    fn release_image(&self) {
        let mut image = self.image.lock();
        image.pixels = Vec::new();
        image.rows_done = 0;
    }
}

/// Renders the preview row by row, checking for cancellation between rows.
fn bake_rows(
    image: &Mutex<PreviewImage>,
    resolution: u32,
    origin: Vec3,
    row_interval: Duration,
    token: &CancellationToken,
) -> BakeOutcome {
    let mut row_pixels = vec![0u32; resolution as usize];
    for y in 0..resolution {
        if token.is_canceled() {
            return BakeOutcome::Canceled { rows: y };
        }
        for (x, pixel) in (0..resolution).zip(row_pixels.iter_mut()) {
            *pixel = shade(x, y, resolution, origin);
        }

        let start = (y as usize) * (resolution as usize);
        let mut locked = image.lock();
        let Some(row) = locked.pixels.get_mut(start..start + resolution as usize) else {
            return BakeOutcome::Canceled { rows: y };
        };
        row.copy_from_slice(&row_pixels);
        locked.rows_done = y + 1;
        drop(locked);

        if !row_interval.is_zero() {
            std::thread::sleep(row_interval);
        }
    }
    BakeOutcome::Completed
}

/// Height-field style shading: brightness from the distance to the owner
/// position projected on the XZ plane, opaque alpha.
fn shade(x: u32, y: u32, resolution: u32, origin: Vec3) -> u32 {
    let half = resolution as f32 * 0.5;
    let dx = x as f32 - half + origin.x;
    let dz = y as f32 - half + origin.z;
    let wave = ((dx * 0.2).sin() * (dz * 0.2).cos() * 0.5 + 0.5).clamp(0.0, 1.0);
    let value = (wave * 255.0) as u32;
    (value << 24) | (value << 16) | ((255 - value) << 8) | 0xFF
}

impl Component for BakePreviewComponent {
    fn on_activated(&mut self, ctx: &mut ComponentContext<'_>) {
        let origin = ctx.owner_global_transform().map_or(Vec3::ZERO, |t| t.position);
        self.start_bake(origin);
    }

    fn on_deactivated(&mut self, _ctx: &mut ComponentContext<'_>) {
        self.finish_bake(true);
        self.release_image();
    }

    fn deinitialize(&mut self, _ctx: &mut ComponentContext<'_>) {
        self.finish_bake(true);
        self.release_image();
    }

    fn type_name() -> &'static str {
        "BakePreviewComponent"
    }

    fn is_singleton() -> bool {
        true
    }

    fn register_update_functions(manager: &mut ComponentManager<Self>) {
        manager.register_update_function(UpdateFunctionDesc::<Self>::new(
            "bake_preview_poll",
            UpdatePhase::PostAsync,
            |range, _ctx| {
                for slot in range.iter_mut().filter(|slot| slot.is_active()) {
                    slot.poll();
                }
            },
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bake_rows_completes() {
        let image = Mutex::new(PreviewImage {
            resolution: 4,
            pixels: vec![0; 16],
            rows_done: 0,
        });
        let outcome = bake_rows(&image, 4, Vec3::ZERO, Duration::ZERO, &CancellationToken::new());

        assert_eq!(outcome, BakeOutcome::Completed);
        let image = image.lock();
        assert_eq!(image.rows_done, 4);
        assert!(image.pixels.iter().all(|p| p & 0xFF == 0xFF));
    }

    #[test]
    fn test_bake_rows_stops_when_canceled() {
        let image = Mutex::new(PreviewImage {
            resolution: 8,
            pixels: vec![0; 64],
            rows_done: 0,
        });
        let token = CancellationToken::new();
        token.cancel();

        let outcome = bake_rows(&image, 8, Vec3::ZERO, Duration::ZERO, &token);
        assert_eq!(outcome, BakeOutcome::Canceled { rows: 0 });
        assert_eq!(image.lock().rows_done, 0);
    }

    #[test]
    fn test_start_and_finish_bake() {
        let mut preview = BakePreviewComponent::with_resolution(8);
        preview.start_bake(Vec3::new(3.0, 0.0, 1.0));
        assert!(preview.is_baking());
        assert_eq!(preview.bakes_started(), 1);

        preview.finish_bake(false);
        assert!(!preview.is_baking());
        assert_eq!(preview.last_outcome(), Some(BakeOutcome::Completed));
        assert!((preview.progress() - 1.0).abs() < f32::EPSILON);
        assert_eq!(preview.pixels().len(), 64);

        preview.release_image();
        assert!(preview.pixels().is_empty());
    }

    #[test]
    fn test_cancel_slow_bake() {
        let mut preview = BakePreviewComponent::with_resolution(64);
        preview.row_interval = Duration::from_millis(20);
        preview.start_bake(Vec3::ZERO);

        preview.finish_bake(true);
        match preview.last_outcome() {
            Some(BakeOutcome::Canceled { rows }) => assert!(rows < 64),
            other => panic!("expected a canceled bake, got {other:?}"),
        }
    }
}
