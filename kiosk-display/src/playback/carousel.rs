//! Carousel seam
//!
//! The engine drives a carousel/transition widget it knows nothing about
//! beyond this trait. Implementations must not block: every call is made
//! from inside the engine task.

use kiosk_common::models::{Slide, TransitionEffect};

/// Renderer-side carousel widget
pub trait Carousel: Send + Sync {
    /// Replace the rendered slides and show `start_index`
    fn render(&self, slides: &[Slide], start_index: usize);

    /// Move to the slide at `real_index`
    fn slide_to(&self, real_index: usize);

    /// Swap the visual transition
    fn set_effect(&self, effect: TransitionEffect);

    /// Show or hide navigation arrows and pagination dots
    fn set_navigation(&self, show_arrows: bool, show_pagination: bool);

    /// Show or hide the clock and logo overlays
    fn set_chrome(&self, _show_clock: bool, _show_logo: bool) {}

    /// Restart the media of the visible slide (single-slide loop, stuck video)
    fn restart_media(&self, slide_id: &str);

    /// Whether the video for `slide_id` is actually playing
    fn is_playing(&self, slide_id: &str) -> bool;

    /// Show the idle fallback (nothing eligible to display)
    fn show_idle(&self);
}

/// Map a loop-mode display index to the real rotation index
///
/// Loop-mode carousels pad the slide strip with `loop_padding` duplicates on
/// each side, so the display index of the first real slide is `loop_padding`.
pub fn resolve_real_index(display_index: usize, len: usize, loop_padding: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let shifted = display_index as i64 - loop_padding as i64;
    Some(shifted.rem_euclid(len as i64) as usize)
}
