//! # Region Division
//!
//! Partitions a stroke batch so each part fits one generation call.
//!
//! Strategies are tried in order:
//!
//! 1. **Spatial** - bucket by bbox center on a fixed grid. Buckets below the
//!    minimum occupancy are dropped, so this strategy may lose strokes.
//! 2. **Clustering** - greedy nearest-neighbour grouping; small clusters are
//!    dissolved into single-stroke regions. Complete cover.
//! 3. **Time** - sequential batches in capture order. Always succeeds,
//!    complete cover.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::routing::{estimate_payload_bytes, RoutingConfig};
use crate::stroke::{CanvasSize, Stroke};

/// Division tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DivisionConfig {
    /// Spatial grid columns (also the temporal batch divisor).
    pub grid_cols: usize,
    /// Spatial grid rows.
    pub grid_rows: usize,
    /// Buckets with fewer strokes than this are dropped.
    pub min_bucket_strokes: usize,
    /// Center-to-center join radius for clustering.
    pub cluster_radius: f64,
    /// Clusters smaller than this are dissolved.
    pub min_cluster_size: usize,
}

impl Default for DivisionConfig {
    fn default() -> Self {
        Self {
            grid_cols: 3,
            grid_rows: 3,
            min_bucket_strokes: 5,
            cluster_radius: 100.0,
            min_cluster_size: 3,
        }
    }
}

/// How a batch was partitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DivisionMethod {
    /// Fixed grid over the canvas.
    Spatial,
    /// Greedy proximity clusters.
    Clustering,
    /// Sequential batches.
    Time,
}

impl fmt::Display for DivisionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Spatial => "spatial",
            Self::Clustering => "clustering",
            Self::Time => "time",
        };
        f.write_str(name)
    }
}

/// A non-empty group of strokes, as indices into the divided batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    indices: Vec<usize>,
}

impl Region {
    fn new(indices: Vec<usize>) -> Self {
        debug_assert!(!indices.is_empty());
        Self { indices }
    }

    /// Indices into the batch passed to [`RegionDivider::divide_optimally`].
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Number of strokes in the region.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Regions are never empty; provided for API completeness.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Resolve the region against the batch it was computed from.
    #[must_use]
    pub fn strokes<'a>(&self, batch: &'a [Stroke]) -> Vec<&'a Stroke> {
        self.indices.iter().filter_map(|&i| batch.get(i)).collect()
    }
}

/// Result of a division.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Division {
    /// The regions, in processing order.
    pub regions: Vec<Region>,
    /// Strategy that produced them.
    pub method: DivisionMethod,
}

impl Division {
    /// Total strokes covered by all regions.
    #[must_use]
    pub fn stroke_count(&self) -> usize {
        self.regions.iter().map(Region::len).sum()
    }
}

/// Picks a partitioning strategy for an oversized batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegionDivider {
    config: DivisionConfig,
    routing: RoutingConfig,
}

impl RegionDivider {
    /// Create a divider using the given grid and routing thresholds.
    #[must_use]
    pub const fn new(config: DivisionConfig, routing: RoutingConfig) -> Self {
        Self { config, routing }
    }

    /// Current division tuning.
    #[must_use]
    pub const fn config(&self) -> &DivisionConfig {
        &self.config
    }

    /// Partition `strokes` using the first strategy that yields two or more
    /// regions.
    #[must_use]
    pub fn divide_optimally(&self, strokes: &[Stroke], canvas: CanvasSize) -> Division {
        let bytes = estimate_payload_bytes(strokes);

        if bytes > self.routing.max_bytes.saturating_mul(2) {
            let regions = self.divide_spatially(strokes, canvas);
            if regions.len() >= 2 {
                tracing::debug!(
                    "Spatial division: {} regions covering {} of {} strokes",
                    regions.len(),
                    regions.iter().map(Region::len).sum::<usize>(),
                    strokes.len()
                );
                return Division {
                    regions,
                    method: DivisionMethod::Spatial,
                };
            }
        }

        if strokes.len() > self.routing.max_strokes.saturating_mul(2) {
            let regions = self.divide_by_clustering(strokes);
            if regions.len() >= 2 {
                tracing::debug!("Cluster division: {} regions", regions.len());
                return Division {
                    regions,
                    method: DivisionMethod::Clustering,
                };
            }
        }

        let regions = self.divide_by_time(strokes);
        tracing::debug!("Temporal division: {} regions", regions.len());
        Division {
            regions,
            method: DivisionMethod::Time,
        }
    }

    /// Bucket strokes on the grid by bbox center, dropping sparse buckets.
    #[must_use]
    pub fn divide_spatially(&self, strokes: &[Stroke], canvas: CanvasSize) -> Vec<Region> {
        let cols = self.config.grid_cols.max(1);
        let rows = self.config.grid_rows.max(1);
        let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); cols * rows];

        for (i, stroke) in strokes.iter().enumerate() {
            let center = stroke.center();
            let col = grid_cell(center.x, canvas.width, cols);
            let row = grid_cell(center.y, canvas.height, rows);
            buckets[row * cols + col].push(i);
        }

        buckets
            .into_iter()
            .filter(|b| !b.is_empty() && b.len() >= self.config.min_bucket_strokes)
            .map(Region::new)
            .collect()
    }

    /// Greedy proximity grouping around seed strokes.
    #[must_use]
    pub fn divide_by_clustering(&self, strokes: &[Stroke]) -> Vec<Region> {
        let centers: Vec<_> = strokes.iter().map(Stroke::center).collect();
        let mut assigned = vec![false; strokes.len()];
        let mut regions = Vec::new();

        for seed in 0..strokes.len() {
            if assigned[seed] {
                continue;
            }
            assigned[seed] = true;
            let mut cluster = vec![seed];

            for other in (seed + 1)..strokes.len() {
                if !assigned[other]
                    && centers[seed].distance(&centers[other]) <= self.config.cluster_radius
                {
                    assigned[other] = true;
                    cluster.push(other);
                }
            }

            if cluster.len() >= self.config.min_cluster_size {
                regions.push(Region::new(cluster));
            } else {
                regions.extend(cluster.into_iter().map(|i| Region::new(vec![i])));
            }
        }

        regions
    }

    /// Sequential batches of `ceil(len / grid_cols)` strokes.
    #[must_use]
    pub fn divide_by_time(&self, strokes: &[Stroke]) -> Vec<Region> {
        if strokes.is_empty() {
            return Vec::new();
        }
        let batch = strokes.len().div_ceil(self.config.grid_cols.max(1));
        (0..strokes.len())
            .collect::<Vec<_>>()
            .chunks(batch)
            .map(|chunk| Region::new(chunk.to_vec()))
            .collect()
    }
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn grid_cell(value: f64, extent: f64, cells: usize) -> usize {
    if extent <= 0.0 || !value.is_finite() {
        return 0;
    }
    let cell = (value / extent * cells as f64).floor();
    if cell <= 0.0 {
        0
    } else {
        (cell as usize).min(cells - 1)
    }
}

#[cfg(test)]
#[allow(clippy::cast_precision_loss)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn dot(id: usize, x: f64, y: f64) -> Stroke {
        Stroke::new(format!("s{id}"), vec![x, y, x + 2.0, y + 2.0], "#000", 2.0).expect("valid")
    }

    fn tight_routing() -> RoutingConfig {
        RoutingConfig {
            max_strokes: 5,
            max_bytes: 100,
        }
    }

    #[test]
    fn test_temporal_batches() {
        let divider = RegionDivider::default();
        let strokes: Vec<_> = (0..10).map(|i| dot(i, 0.0, 0.0)).collect();
        let regions = divider.divide_by_time(&strokes);
        // ceil(10 / 3) = 4 -> 4, 4, 2
        let sizes: Vec<_> = regions.iter().map(Region::len).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(regions[2].indices(), &[8, 9]);
    }

    #[test]
    fn test_temporal_empty() {
        assert!(RegionDivider::default().divide_by_time(&[]).is_empty());
    }

    #[test]
    fn test_spatial_drops_sparse_buckets() {
        let divider = RegionDivider::default();
        let canvas = CanvasSize::new(300.0, 300.0);
        let mut strokes = Vec::new();
        // Five in top-left, six in bottom-right, two in the middle
        for i in 0..5 {
            strokes.push(dot(i, 10.0 + i as f64, 10.0));
        }
        for i in 5..11 {
            strokes.push(dot(i, 250.0, 250.0 + i as f64));
        }
        strokes.push(dot(11, 150.0, 150.0));
        strokes.push(dot(12, 140.0, 160.0));

        let regions = divider.divide_spatially(&strokes, canvas);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].indices(), &[0, 1, 2, 3, 4]);
        assert_eq!(regions[1].len(), 6);
    }

    #[test]
    fn test_spatial_clamps_outside_canvas() {
        let divider = RegionDivider::new(
            DivisionConfig {
                min_bucket_strokes: 1,
                ..DivisionConfig::default()
            },
            RoutingConfig::default(),
        );
        let strokes = vec![dot(0, -50.0, -50.0), dot(1, 5000.0, 5000.0)];
        let regions = divider.divide_spatially(&strokes, CanvasSize::new(300.0, 300.0));
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].indices(), &[0]);
        assert_eq!(regions[1].indices(), &[1]);
    }

    #[test]
    fn test_clustering_groups_and_dissolves() {
        let divider = RegionDivider::default();
        let strokes = vec![
            dot(0, 0.0, 0.0),
            dot(1, 500.0, 500.0),
            dot(2, 30.0, 0.0),
            dot(3, 0.0, 40.0),
            dot(4, 520.0, 500.0),
        ];
        let regions = divider.divide_by_clustering(&strokes);
        assert_eq!(regions[0].indices(), &[0, 2, 3]);
        // The pair at (500,500) is too small and dissolves into singletons
        assert_eq!(regions[1].indices(), &[1]);
        assert_eq!(regions[2].indices(), &[4]);
    }

    #[test]
    fn test_divide_optimally_prefers_clustering_for_many_strokes() {
        let divider = RegionDivider::new(
            DivisionConfig::default(),
            RoutingConfig {
                max_strokes: 5,
                max_bytes: usize::MAX / 4,
            },
        );
        let mut strokes: Vec<_> = (0..6).map(|i| dot(i, i as f64, 0.0)).collect();
        strokes.extend((6..12).map(|i| dot(i, 800.0 + i as f64, 800.0)));
        let division = divider.divide_optimally(&strokes, CanvasSize::default());
        assert_eq!(division.method, DivisionMethod::Clustering);
        assert_eq!(division.regions.len(), 2);
    }

    #[test]
    fn test_divide_optimally_prefers_spatial_for_large_payloads() {
        let divider = RegionDivider::new(DivisionConfig::default(), tight_routing());
        let canvas = CanvasSize::new(300.0, 300.0);
        let mut strokes: Vec<_> = (0..5).map(|i| dot(i, 10.0, 10.0)).collect();
        strokes.extend((5..10).map(|i| dot(i, 250.0, 250.0)));
        let division = divider.divide_optimally(&strokes, canvas);
        assert_eq!(division.method, DivisionMethod::Spatial);
        assert_eq!(division.stroke_count(), 10);
    }

    #[test]
    fn test_divide_optimally_falls_back_to_time() {
        let divider = RegionDivider::default();
        let strokes: Vec<_> = (0..7).map(|i| dot(i, 0.0, 0.0)).collect();
        let division = divider.divide_optimally(&strokes, CanvasSize::default());
        assert_eq!(division.method, DivisionMethod::Time);
        assert_eq!(division.stroke_count(), 7);
    }

    #[test]
    fn test_region_resolves_strokes() {
        let strokes = vec![dot(0, 0.0, 0.0), dot(1, 1.0, 1.0)];
        let region = Region::new(vec![1]);
        let resolved = region.strokes(&strokes);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id, "s1");
    }

    #[test]
    fn test_method_display() {
        assert_eq!(DivisionMethod::Spatial.to_string(), "spatial");
        assert_eq!(DivisionMethod::Time.to_string(), "time");
    }

    fn arb_strokes() -> impl Strategy<Value = Vec<Stroke>> {
        prop::collection::vec((0.0f64..1000.0, 0.0f64..1000.0), 1..200).prop_map(|centers| {
            centers
                .into_iter()
                .enumerate()
                .map(|(i, (x, y))| dot(i, x, y))
                .collect()
        })
    }

    fn assert_complete_cover(regions: &[Region], len: usize) -> Result<(), TestCaseError> {
        let mut seen = vec![0usize; len];
        for region in regions {
            prop_assert!(!region.is_empty());
            for &i in region.indices() {
                seen[i] += 1;
            }
        }
        prop_assert!(seen.iter().all(|&n| n == 1));
        Ok(())
    }

    proptest! {
        #[test]
        fn prop_temporal_is_complete_cover(strokes in arb_strokes(), cols in 1usize..8) {
            let divider = RegionDivider::new(
                DivisionConfig { grid_cols: cols, ..DivisionConfig::default() },
                RoutingConfig::default(),
            );
            let regions = divider.divide_by_time(&strokes);
            assert_complete_cover(&regions, strokes.len())?;
        }

        #[test]
        fn prop_clustering_is_complete_cover(strokes in arb_strokes()) {
            let regions = RegionDivider::default().divide_by_clustering(&strokes);
            assert_complete_cover(&regions, strokes.len())?;
        }

        #[test]
        fn prop_spatial_never_duplicates(strokes in arb_strokes()) {
            let regions = RegionDivider::default()
                .divide_spatially(&strokes, CanvasSize::new(1000.0, 1000.0));
            let mut seen = vec![false; strokes.len()];
            for region in &regions {
                prop_assert!(region.len() >= 5);
                for &i in region.indices() {
                    prop_assert!(!seen[i]);
                    seen[i] = true;
                }
            }
        }
    }
}
