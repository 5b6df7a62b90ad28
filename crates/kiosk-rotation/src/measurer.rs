//! Content measurement
//!
//! The rendering layer owns fonts, wrapping and margins; it reports the
//! extent each block occupies once laid out. The measurer only sums those
//! reports. Callers must wait for layout to settle after a content change
//! before measuring, otherwise the extents describe the previous content.

use kiosk_types::BriefingSection;
use std::sync::Arc;

/// Source of rendered block extents
///
/// Implemented by the rendering surface (or a stand-in for tests and
/// simulation). Extents are in the surface's layout unit and include the
/// block's own trailing gap.
pub trait ExtentProvider: Send + Sync {
    /// Laid-out extent of one block
    fn extent(&self, section: &BriefingSection) -> u32;
}

impl<P: ExtentProvider + ?Sized> ExtentProvider for Arc<P> {
    fn extent(&self, section: &BriefingSection) -> u32 {
        (**self).extent(section)
    }
}

impl<P: ExtentProvider + ?Sized> ExtentProvider for Box<P> {
    fn extent(&self, section: &BriefingSection) -> u32 {
        (**self).extent(section)
    }
}

/// Result of measuring a set of blocks against a viewport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measurement {
    /// Extent preceding each unique block
    pub offsets: Vec<u32>,
    /// Combined extent of all unique blocks
    pub content_extent: u32,
    /// Viewport the blocks were measured against
    pub viewport_extent: u32,
    /// Whether the blocks do not fit in the viewport
    pub overflow: bool,
}

impl Measurement {
    /// Build a measurement from per-block extents
    #[must_use]
    pub fn from_extents(extents: &[u32], viewport_extent: u32) -> Self {
        let mut offsets = Vec::with_capacity(extents.len());
        let mut cursor = 0u32;
        for extent in extents {
            offsets.push(cursor);
            cursor = cursor.saturating_add(*extent);
        }

        Self {
            offsets,
            content_extent: cursor,
            viewport_extent,
            overflow: cursor > viewport_extent,
        }
    }

    /// Number of unique blocks measured
    #[inline]
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.offsets.len()
    }

    /// Offsets including the duplicated first block appended after the last
    ///
    /// The duplicate starts where the unique content ends.
    #[must_use]
    pub fn loop_offsets(&self) -> Vec<u32> {
        let mut offsets = self.offsets.clone();
        offsets.push(self.content_extent);
        offsets
    }
}

/// Measures briefing sections through an [`ExtentProvider`]
#[derive(Debug, Clone)]
pub struct ContentMeasurer<P> {
    provider: P,
}

impl<P: ExtentProvider> ContentMeasurer<P> {
    /// Create measurer over a provider
    #[inline]
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Measure sections against a viewport
    #[must_use]
    pub fn measure(&self, sections: &[BriefingSection], viewport_extent: u32) -> Measurement {
        let extents: Vec<u32> = sections.iter().map(|s| self.provider.extent(s)).collect();
        let measurement = Measurement::from_extents(&extents, viewport_extent);

        tracing::debug!(
            "Measured {} blocks: content {} vs viewport {} (overflow: {})",
            measurement.block_count(),
            measurement.content_extent,
            viewport_extent,
            measurement.overflow
        );

        measurement
    }

    /// Underlying provider
    #[inline]
    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }
}

/// Extent estimate from text length
///
/// Stand-in for a real layout engine: wraps the body at a fixed number of
/// characters per line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextExtentEstimator {
    /// Characters that fit on one body line
    pub chars_per_line: u32,
    /// Extent of one body line
    pub line_extent: u32,
    /// Extent of the heading
    pub heading_extent: u32,
    /// Gap after each block
    pub block_gap: u32,
}

impl TextExtentEstimator {
    /// Create estimator
    #[inline]
    #[must_use]
    pub fn new(chars_per_line: u32, line_extent: u32, heading_extent: u32, block_gap: u32) -> Self {
        Self {
            chars_per_line: chars_per_line.max(1),
            line_extent,
            heading_extent,
            block_gap,
        }
    }
}

impl Default for TextExtentEstimator {
    fn default() -> Self {
        Self::new(60, 32, 28, 64)
    }
}

impl ExtentProvider for TextExtentEstimator {
    fn extent(&self, section: &BriefingSection) -> u32 {
        let chars = u32::try_from(section.content.chars().count()).unwrap_or(u32::MAX);
        let lines = chars.div_ceil(self.chars_per_line).max(1);
        self.heading_extent
            .saturating_add(lines.saturating_mul(self.line_extent))
            .saturating_add(self.block_gap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiosk_types::SectionId;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    struct Fixed(u32);

    impl ExtentProvider for Fixed {
        fn extent(&self, _section: &BriefingSection) -> u32 {
            self.0
        }
    }

    fn sections(n: usize) -> Vec<BriefingSection> {
        (0..n)
            .map(|i| BriefingSection::new(SectionId::Weather, format!("S{i}"), Some("text")))
            .collect()
    }

    #[test]
    fn overflowing_content() {
        let measurer = ContentMeasurer::new(Fixed(300));
        let m = measurer.measure(&sections(4), 800);

        assert!(m.overflow);
        assert_eq!(m.offsets, vec![0, 300, 600, 900]);
        assert_eq!(m.loop_offsets(), vec![0, 300, 600, 900, 1200]);
        assert_eq!(m.content_extent, 1200);
    }

    #[test]
    fn exact_fit_does_not_overflow() {
        let m = Measurement::from_extents(&[400, 400], 800);
        assert!(!m.overflow);
    }

    #[test]
    fn empty_content() {
        let m = Measurement::from_extents(&[], 800);
        assert!(!m.overflow);
        assert!(m.offsets.is_empty());
        assert_eq!(m.loop_offsets(), vec![0]);
    }

    #[test]
    fn measurer_works_through_arc() {
        let provider: Arc<dyn ExtentProvider> = Arc::new(Fixed(10));
        let measurer = ContentMeasurer::new(provider);
        assert_eq!(measurer.measure(&sections(3), 100).content_extent, 30);
    }

    #[test]
    fn estimator_wraps_lines() {
        let estimator = TextExtentEstimator::new(10, 20, 30, 5);
        let short = BriefingSection::new(SectionId::Notams, "N", Some("abc"));
        let long = BriefingSection::new(SectionId::Notams, "N", Some(&"x".repeat(25)));

        assert_eq!(estimator.extent(&short), 30 + 20 + 5);
        assert_eq!(estimator.extent(&long), 30 + 3 * 20 + 5);
    }

    proptest! {
        #[test]
        fn prop_offsets_are_cumulative(
            extents in proptest::collection::vec(0u32..2000, 0..12),
            viewport in 0u32..10_000,
        ) {
            let m = Measurement::from_extents(&extents, viewport);
            let total: u32 = extents.iter().sum();

            prop_assert_eq!(m.offsets.len(), extents.len());
            prop_assert!(m.offsets.windows(2).all(|w| w[0] <= w[1]));
            prop_assert_eq!(m.content_extent, total);
            prop_assert_eq!(m.overflow, total > viewport);
        }
    }
}
