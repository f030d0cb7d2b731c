//! Detection configuration

use crate::error::CardScanError;
use crate::ScanResult;
use serde::{Deserialize, Serialize};

/// Main detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Allowed deviation of width/height from 2.5/3.5, in (0, 0.3]
    pub aspect_tolerance: f64,
    /// Smallest card width as a fraction of the shorter image side, in (0, 1)
    pub min_card_fraction: f64,
    /// Largest card width as a fraction of the image width, in (0, 1]
    pub max_card_fraction: f64,
    /// Absolute floor for the smallest card width in pixels
    pub min_card_px: u32,
    /// Grid step is the minimum card width divided by this, >= 1
    pub grid_divisions: u32,
    /// Longest side of the raster the strategies search; 0 disables resizing
    pub max_detection_dimension: u32,
    /// Overlap over the smaller area above which a candidate is dropped, in [0, 1]
    pub overlap_threshold: f64,
    /// Maximum number of accepted regions per image, >= 1
    pub max_regions: usize,
    pub scoring: ScoringConfig,
    pub geometric: GeometricConfig,
    pub face: FaceAnchoredConfig,
    pub edge: EdgeConfig,
    pub contour: ContourConfig,
    pub extraction: ExtractionConfig,
}

/// Weights of the additive confidence score
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub face_bonus: f64,
    /// Face bonus when scoring a background-removed raster
    pub face_bonus_background_removed: f64,
    /// Best aspect bonus; lower bands award fractions of it
    pub aspect_weight: f64,
    /// Best size bonus; lower bands award fractions of it
    pub size_weight: f64,
    /// Region area over image area that earns the full size bonus
    pub optimal_area_ratio: f64,
    pub edge_weight: f64,
    pub corner_weight: f64,
    pub uniformity_weight: f64,
    pub margin_bonus: f64,
    /// Boundary samples per rectangle side
    pub samples_per_edge: u32,
    /// Inside/outside sampling distance as a fraction of the shorter side
    pub edge_offset_fraction: f64,
    /// Interior sampling lattice is `uniformity_grid` squared points
    pub uniformity_grid: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometricConfig {
    pub enabled: bool,
    pub threshold: f64,
    pub max_evaluations: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceAnchoredConfig {
    pub enabled: bool,
    pub threshold: f64,
    /// Card width as a multiple of the face width
    pub width_multiplier: f64,
    /// Horizontal shifts of the card centre, in face widths
    pub horizontal_offsets: Vec<f64>,
    /// Fraction of the card height placed above the face's top edge
    pub headroom: f64,
    pub max_evaluations: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    pub enabled: bool,
    pub threshold: f64,
    /// Minimum mean normalized Sobel magnitude along each side of the outline
    pub min_edge_strength: f64,
    pub max_evaluations: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourConfig {
    pub enabled: bool,
    pub threshold: f64,
    /// Minimum interior flatness, 1 minus normalized colour deviation
    pub min_uniformity: f64,
    /// Minimum fraction of samples on each side of the outline that sit on
    /// an edge
    pub min_border_density: f64,
    /// Normalized magnitude that counts as an edge pixel
    pub edge_pixel_threshold: f64,
    pub max_evaluations: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub padding: u32,
    pub output_width: u32,
    pub output_height: u32,
    /// JPEG quality, 1..=100
    pub jpeg_quality: u8,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            aspect_tolerance: 0.08,
            min_card_fraction: 0.12,
            max_card_fraction: 0.95,
            min_card_px: 24,
            grid_divisions: 4,
            max_detection_dimension: 1200,
            overlap_threshold: 0.3,
            max_regions: 12,
            scoring: ScoringConfig::default(),
            geometric: GeometricConfig::default(),
            face: FaceAnchoredConfig::default(),
            edge: EdgeConfig::default(),
            contour: ContourConfig::default(),
            extraction: ExtractionConfig::default(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            face_bonus: 0.7,
            face_bonus_background_removed: 0.8,
            aspect_weight: 0.2,
            size_weight: 0.1,
            optimal_area_ratio: 0.12,
            edge_weight: 0.4,
            corner_weight: 0.2,
            uniformity_weight: 0.15,
            margin_bonus: 0.1,
            samples_per_edge: 12,
            edge_offset_fraction: 0.08,
            uniformity_grid: 5,
        }
    }
}

impl Default for GeometricConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.6,
            max_evaluations: 60_000,
        }
    }
}

impl Default for FaceAnchoredConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.4,
            width_multiplier: 1.8,
            horizontal_offsets: vec![0.0, -0.2, 0.2],
            headroom: 0.15,
            max_evaluations: 256,
        }
    }
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.5,
            min_edge_strength: 0.15,
            max_evaluations: 60_000,
        }
    }
}

impl Default for ContourConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.5,
            min_uniformity: 0.6,
            min_border_density: 0.5,
            edge_pixel_threshold: 0.1,
            max_evaluations: 60_000,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            padding: 8,
            output_width: 350,
            output_height: 490,
            jpeg_quality: 92,
        }
    }
}

impl DetectionConfig {
    /// Geometric sweep only, with a smaller budget. Used as the fallback
    /// when the full pipeline fails or times out.
    pub fn basic() -> Self {
        Self {
            max_detection_dimension: 800,
            geometric: GeometricConfig {
                max_evaluations: 20_000,
                ..Default::default()
            },
            face: FaceAnchoredConfig {
                enabled: false,
                ..Default::default()
            },
            edge: EdgeConfig {
                enabled: false,
                ..Default::default()
            },
            contour: ContourConfig {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Finer grid, larger raster and budgets for offline runs.
    pub fn thorough() -> Self {
        Self {
            grid_divisions: 6,
            max_detection_dimension: 1600,
            geometric: GeometricConfig {
                max_evaluations: 200_000,
                ..Default::default()
            },
            edge: EdgeConfig {
                max_evaluations: 200_000,
                ..Default::default()
            },
            contour: ContourConfig {
                max_evaluations: 200_000,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn any_strategy_enabled(&self) -> bool {
        self.geometric.enabled || self.face.enabled || self.edge.enabled || self.contour.enabled
    }

    /// Whether any enabled strategy reads the edge map.
    pub fn needs_edge_map(&self) -> bool {
        self.edge.enabled || self.contour.enabled
    }

    pub fn validate(&self) -> ScanResult<()> {
        fn check(ok: bool, what: &str) -> ScanResult<()> {
            if ok {
                Ok(())
            } else {
                Err(CardScanError::InvalidConfig(what.to_string()))
            }
        }
        let unit = |v: f64| (0.0..=1.0).contains(&v);

        check(
            self.aspect_tolerance > 0.0 && self.aspect_tolerance <= 0.3,
            "aspect_tolerance must be in (0, 0.3]",
        )?;
        check(
            self.min_card_fraction > 0.0 && self.min_card_fraction < 1.0,
            "min_card_fraction must be in (0, 1)",
        )?;
        check(
            self.max_card_fraction > 0.0 && self.max_card_fraction <= 1.0,
            "max_card_fraction must be in (0, 1]",
        )?;
        check(self.grid_divisions >= 1, "grid_divisions must be at least 1")?;
        check(unit(self.overlap_threshold), "overlap_threshold must be in [0, 1]")?;
        check(self.max_regions >= 1, "max_regions must be at least 1")?;
        check(self.any_strategy_enabled(), "at least one strategy must be enabled")?;
        check(
            unit(self.geometric.threshold)
                && unit(self.face.threshold)
                && unit(self.edge.threshold)
                && unit(self.contour.threshold),
            "strategy thresholds must be in [0, 1]",
        )?;
        check(
            self.face.width_multiplier > 0.0,
            "face.width_multiplier must be positive",
        )?;
        check(
            unit(self.contour.min_uniformity)
                && unit(self.contour.min_border_density)
                && unit(self.contour.edge_pixel_threshold)
                && unit(self.edge.min_edge_strength),
            "edge and contour gates must be in [0, 1]",
        )?;
        check(
            self.scoring.samples_per_edge >= 1 && self.scoring.uniformity_grid >= 2,
            "scoring sample counts are too small",
        )?;
        check(
            self.extraction.output_width > 0 && self.extraction.output_height > 0,
            "extraction output size must be non-zero",
        )?;
        check(
            (1..=100).contains(&self.extraction.jpeg_quality),
            "jpeg_quality must be in 1..=100",
        )
    }
}
