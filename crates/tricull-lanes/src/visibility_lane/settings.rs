// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration of the visibility pipeline.

use serde::Deserialize;
use thiserror::Error;
use tricull_core::math::Extent2D;

/// Errors raised while loading or validating [`VisibilitySettings`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
    /// The RON text could not be parsed.
    #[error("failed to parse visibility settings: {0}")]
    Parse(String),
    /// A value is out of its allowed range.
    #[error("invalid visibility settings: {0}")]
    Invalid(String),
}

/// Which geometry the culled lane draws in the main pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum DrawMode {
    /// Only the last published visible set.
    #[default]
    Culled,
    /// The whole unpacked batch, for side-by-side comparison.
    FullBuffer,
}

/// Tuning knobs of the ID-buffer visibility pipeline.
///
/// Every field has a default, so a RON file only needs the values it changes:
///
/// ```ron
/// (fov_inflation: 1.5, visible_capacity: 4096)
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct VisibilitySettings {
    /// Width of the triangle ID target in pixels.
    pub id_target_width: u32,
    /// Height of the triangle ID target in pixels.
    pub id_target_height: u32,
    /// Scale applied to the camera's field of view for the ID pass, in `1.0..=2.0`.
    /// A wider ID camera keeps triangles just outside the view in the visible
    /// set, hiding the one-cycle latency while the camera turns.
    pub fov_inflation: f32,
    /// Maximum number of triangle IDs in a published set.
    pub visible_capacity: u32,
    /// Size of each staged readback chunk in bytes. A multiple of 4.
    pub readback_chunk_bytes: u64,
    /// Fraction of the histogram scanned per step, in `(0, 1]`.
    pub scan_chunk_fraction: f32,
    /// Geometry drawn by the main pass.
    pub draw_mode: DrawMode,
}

impl Default for VisibilitySettings {
    fn default() -> Self {
        Self {
            id_target_width: 512,
            id_target_height: 512,
            fov_inflation: 1.3,
            visible_capacity: 65_536,
            readback_chunk_bytes: 64 * 1024,
            scan_chunk_fraction: 0.1,
            draw_mode: DrawMode::Culled,
        }
    }
}

impl VisibilitySettings {
    /// Parses settings from RON text and validates them.
    pub fn from_ron(text: &str) -> Result<Self, SettingsError> {
        let settings: Self =
            ron::de::from_str(text).map_err(|e| SettingsError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks every field against its allowed range.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.id_target_width == 0 || self.id_target_height == 0 {
            return Err(SettingsError::Invalid(format!(
                "ID target must be non-empty, got {}x{}",
                self.id_target_width, self.id_target_height
            )));
        }
        if !(1.0..=2.0).contains(&self.fov_inflation) {
            return Err(SettingsError::Invalid(format!(
                "fov_inflation must be within 1.0..=2.0, got {}",
                self.fov_inflation
            )));
        }
        if self.visible_capacity == 0 {
            return Err(SettingsError::Invalid(
                "visible_capacity must be at least 1".to_string(),
            ));
        }
        if self.readback_chunk_bytes < 4 || self.readback_chunk_bytes % 4 != 0 {
            return Err(SettingsError::Invalid(format!(
                "readback_chunk_bytes must be a non-zero multiple of 4, got {}",
                self.readback_chunk_bytes
            )));
        }
        if !(self.scan_chunk_fraction > 0.0 && self.scan_chunk_fraction <= 1.0) {
            return Err(SettingsError::Invalid(format!(
                "scan_chunk_fraction must be within (0, 1], got {}",
                self.scan_chunk_fraction
            )));
        }
        Ok(())
    }

    /// Size of the ID target.
    pub fn id_target_extent(&self) -> Extent2D {
        Extent2D::new(self.id_target_width, self.id_target_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = VisibilitySettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.fov_inflation, 1.3);
        assert_eq!(settings.draw_mode, DrawMode::Culled);
    }

    #[test]
    fn partial_ron_keeps_other_defaults() {
        let settings =
            VisibilitySettings::from_ron("(visible_capacity: 128, draw_mode: FullBuffer)").unwrap();
        assert_eq!(settings.visible_capacity, 128);
        assert_eq!(settings.draw_mode, DrawMode::FullBuffer);
        assert_eq!(settings.id_target_width, 512);
    }

    #[test]
    fn out_of_range_inflation_is_rejected() {
        let err = VisibilitySettings::from_ron("(fov_inflation: 2.5)").unwrap_err();
        assert!(matches!(err, SettingsError::Invalid(_)));
    }

    #[test]
    fn misaligned_chunk_is_rejected() {
        let settings = VisibilitySettings {
            readback_chunk_bytes: 6,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn malformed_ron_is_a_parse_error() {
        let err = VisibilitySettings::from_ron("(visible_capacity: \"many\")").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }
}
