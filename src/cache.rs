//! Glyph identities, subpixel quantization and the memoizing glyph cache.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use lyon::math::{vector, Point, Vector};

use crate::types::{FontKey, GlyphId};

/// Subpixel phases per axis.
pub const SUBPIXEL_STEPS: u8 = 4;

/// A glyph independent of where it is drawn.
///
/// Fonts are compared by [`FontKey`], so two handles to the same font share
/// cache entries.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GlyphIdentity {
    /// Glyph index.
    pub glyph: GlyphId,
    /// Font identity.
    pub font: FontKey,
}

/// Quantized fractional position, in quarters of a pixel per axis.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SubpixelOffset {
    x: u8,
    y: u8,
}

impl SubpixelOffset {
    /// Phase zero on both axes.
    pub const ZERO: Self = Self { x: 0, y: 0 };

    /// Quantize the fractional part of `position`.
    ///
    /// The fraction is taken with Euclidean remainder, so negative positions
    /// also land in `[0, 1)`.
    #[must_use]
    pub fn quantize(position: Point) -> Self {
        Self {
            x: phase(position.x),
            y: phase(position.y),
        }
    }

    /// Phase indices `(x, y)`, each in `0..SUBPIXEL_STEPS`.
    #[must_use]
    pub fn phases(self) -> (u8, u8) {
        (self.x, self.y)
    }

    /// The offset as a fraction of a pixel.
    #[must_use]
    pub fn to_vector(self) -> Vector {
        let steps = f32::from(SUBPIXEL_STEPS);
        vector(f32::from(self.x) / steps, f32::from(self.y) / steps)
    }
}

#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn phase(coordinate: f32) -> u8 {
    let steps = f32::from(SUBPIXEL_STEPS);
    let fraction = coordinate.rem_euclid(1.0);
    // rem_euclid can round up to exactly 1.0 for tiny negative inputs.
    ((fraction * steps).floor() as u8).min(SUBPIXEL_STEPS - 1)
}

/// Fractional part of `position`, snapped down to a quarter pixel.
#[must_use]
pub fn quantize_subpixel(position: Point) -> Vector {
    SubpixelOffset::quantize(position).to_vector()
}

/// Cache key: identity plus the subpixel phase it was computed for.
///
/// Strategies whose output does not depend on placement use
/// [`SubpixelOffset::ZERO`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GlyphCacheKey {
    /// The glyph.
    pub identity: GlyphIdentity,
    /// Quantized subpixel phase.
    pub subpixel: SubpixelOffset,
}

impl GlyphCacheKey {
    /// Key ignoring placement.
    #[must_use]
    pub fn new(identity: GlyphIdentity) -> Self {
        Self {
            identity,
            subpixel: SubpixelOffset::ZERO,
        }
    }

    /// Key for a glyph drawn at `position`.
    #[must_use]
    pub fn with_subpixel(identity: GlyphIdentity, position: Point) -> Self {
        Self {
            identity,
            subpixel: SubpixelOffset::quantize(position),
        }
    }
}

/// Hit and miss counters.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that ran the compute function.
    pub misses: u64,
}

/// Insert-only map from [`GlyphCacheKey`] to computed glyph data.
///
/// Values are never replaced or handed out mutably once inserted.
#[derive(Debug)]
pub struct GlyphCache<V> {
    entries: HashMap<GlyphCacheKey, V>,
    stats: CacheStats,
}

impl<V> Default for GlyphCache<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::default(),
        }
    }
}

impl<V> GlyphCache<V> {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up without computing.
    #[must_use]
    pub fn get(&self, key: &GlyphCacheKey) -> Option<&V> {
        self.entries.get(key)
    }

    /// Return the cached value, computing and inserting it on a miss.
    ///
    /// A failed computation inserts nothing.
    ///
    /// # Errors
    ///
    /// Returns whatever `compute` returns.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        key: GlyphCacheKey,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<&V, E> {
        match self.entries.entry(key) {
            Entry::Occupied(entry) => {
                self.stats.hits += 1;
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => {
                self.stats.misses += 1;
                log::debug!("glyph cache miss for {key:?}");
                Ok(entry.insert(compute()?))
            }
        }
    }

    /// Number of cached glyphs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hit and miss counters since creation.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use lyon::math::point;
    use std::convert::Infallible;

    fn identity(glyph: u32) -> GlyphIdentity {
        GlyphIdentity {
            glyph: GlyphId(glyph),
            font: FontKey(42),
        }
    }

    #[test]
    fn quantization_truncates_to_quarters() {
        assert_eq!(quantize_subpixel(point(10.0, 3.24)), vector(0.0, 0.0));
        assert_eq!(quantize_subpixel(point(10.3, 3.5)), vector(0.25, 0.5));
        assert_eq!(quantize_subpixel(point(7.99, 0.75)), vector(0.75, 0.75));
    }

    #[test]
    fn negative_positions_wrap_into_unit_range() {
        assert_eq!(quantize_subpixel(point(-0.1, -2.5)), vector(0.75, 0.5));
        // Just below an integer is the last phase, even when the remainder
        // rounds to 1.0.
        assert_eq!(quantize_subpixel(point(-1e-9, 0.0)).x, 0.75);
    }

    #[test]
    fn quantization_is_idempotent_and_in_range() {
        for i in -200..200 {
            #[expect(clippy::cast_precision_loss)]
            let p = point(i as f32 * 0.173, i as f32 * -0.291 + 0.05);
            let q = quantize_subpixel(p);
            assert_eq!(quantize_subpixel(q.to_point()), q);
            for c in [q.x, q.y] {
                assert!((0.0..1.0).contains(&c));
                assert_eq!((c * 4.0).fract(), 0.0);
            }
        }
    }

    #[test]
    fn sixteen_distinct_phases() {
        let mut seen = std::collections::HashSet::new();
        for i in 0..64 {
            for j in 0..64 {
                #[expect(clippy::cast_precision_loss)]
                let p = point(i as f32 / 16.0, j as f32 / 16.0);
                seen.insert(SubpixelOffset::quantize(p));
            }
        }
        assert_eq!(seen.len(), 16);
    }

    #[test]
    fn compute_runs_once_per_key() {
        let mut cache = GlyphCache::new();
        let mut calls = 0;
        for _ in 0..3 {
            let value = cache
                .get_or_try_insert_with::<Infallible>(GlyphCacheKey::new(identity(1)), || {
                    calls += 1;
                    Ok("a")
                })
                .unwrap();
            assert_eq!(*value, "a");
        }
        assert_eq!(calls, 1);
        assert_eq!(cache.stats(), CacheStats { hits: 2, misses: 1 });
    }

    #[test]
    fn subpixel_phases_are_separate_entries() {
        let mut cache = GlyphCache::new();
        let a = GlyphCacheKey::with_subpixel(identity(1), point(3.1, 0.0));
        let b = GlyphCacheKey::with_subpixel(identity(1), point(3.6, 0.0));
        let c = GlyphCacheKey::with_subpixel(identity(1), point(9.2, 4.0));
        for key in [a, b, c] {
            cache
                .get_or_try_insert_with::<Infallible>(key, || Ok(()))
                .unwrap();
        }
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn failed_compute_inserts_nothing() {
        let mut cache: GlyphCache<u32> = GlyphCache::new();
        let key = GlyphCacheKey::new(identity(5));
        assert!(cache.get_or_try_insert_with(key, || Err("no room")).is_err());
        assert!(cache.get(&key).is_none());
        assert_eq!(*cache.get_or_try_insert_with::<()>(key, || Ok(9)).unwrap(), 9);
    }

    #[test]
    fn fonts_compare_by_key() {
        let a = GlyphIdentity {
            glyph: GlyphId(3),
            font: FontKey(7),
        };
        let b = GlyphIdentity {
            glyph: GlyphId(3),
            font: FontKey(8),
        };
        assert_ne!(GlyphCacheKey::new(a), GlyphCacheKey::new(b));
        assert_eq!(GlyphCacheKey::new(a), GlyphCacheKey::new(a));
    }
}
