//! Rotation set
//!
//! The ordered subset of slides eligible for display:
//! active, non-zero duration, and (for video slides) a ready asset.
//! Malformed slides are dropped here so the engine never sees them.

use kiosk_common::models::{ActivationDefaults, Slide};
use std::collections::HashSet;
use tracing::debug;

/// Video slide left out because its asset is not ready yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingVideo {
    pub slide_id: String,
    pub url: String,
}

/// Result of filtering a slide list
#[derive(Debug, Clone, Default)]
pub struct RotationBuild {
    pub rotation: RotationSet,
    /// Eligible video slides whose assets are not ready
    pub pending_videos: Vec<PendingVideo>,
    /// Ids (or positions) of slides skipped as malformed
    pub malformed: Vec<String>,
}

/// Ordered set of slides currently eligible for display
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RotationSet {
    slides: Vec<Slide>,
}

impl RotationSet {
    /// Filter `slides` down to the rotation set
    ///
    /// `is_ready` answers whether a video URL is buffered and playable.
    pub fn build(
        slides: &[Slide],
        activation: &ActivationDefaults,
        is_ready: impl Fn(&str) -> bool,
    ) -> RotationBuild {
        let mut build = RotationBuild::default();
        let mut seen_ids: HashSet<&str> = HashSet::new();

        for (position, slide) in slides.iter().enumerate() {
            if !slide.is_active(activation) || slide.duration_secs() == 0 {
                continue;
            }

            if slide.id.trim().is_empty() {
                debug!("Skipping slide at position {} with no id", position);
                build.malformed.push(format!("#{}", position));
                continue;
            }

            if !seen_ids.insert(slide.id.as_str()) {
                debug!("Skipping duplicate slide id {}", slide.id);
                build.malformed.push(slide.id.clone());
                continue;
            }

            if slide.is_video() {
                let Some(url) = slide.video_url() else {
                    debug!("Skipping video slide {} with no videoUrl", slide.id);
                    build.malformed.push(slide.id.clone());
                    continue;
                };
                if !is_ready(url) {
                    debug!("Video slide {} waiting on {}", slide.id, url);
                    build.pending_videos.push(PendingVideo {
                        slide_id: slide.id.clone(),
                        url: url.to_string(),
                    });
                    continue;
                }
            }

            build.rotation.slides.push(slide.clone());
        }

        build
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Slide> {
        self.slides.get(index)
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    /// Real index of the slide with `id`
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.slides.iter().position(|s| s.id == id)
    }

    /// True if both sets hold the same slide ids in the same order
    ///
    /// Content (captions, durations, payloads) is not compared.
    pub fn same_membership(&self, other: &RotationSet) -> bool {
        self.slides.len() == other.slides.len()
            && self
                .slides
                .iter()
                .zip(other.slides.iter())
                .all(|(a, b)| a.id == b.id)
    }

    /// Up to `count` slides starting at `from`, wrapping, each slide at most once
    pub fn upcoming(&self, from: usize, count: usize) -> impl Iterator<Item = &Slide> {
        let len = self.slides.len();
        (0..count.min(len)).map(move |offset| &self.slides[(from + offset) % len])
    }
}
