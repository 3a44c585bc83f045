//! Descriptions of the visual properties a user can edit.

use serde::Serialize;

/// Editor of a visual property.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SettingKind {
    /// Single number within the range.
    Number {
        /// Allowed values.
        range: [f64; 2],
        /// Increment step.
        step: f64,
    },
    /// `[min, max]` pair within the range.
    Range {
        /// Allowed values.
        range: [f64; 2],
        /// Increment step.
        step: f64,
    },
    /// Toggle.
    Boolean,
    /// Single color.
    Color,
    /// Color palette.
    ColorRange,
    /// Aggregation technique.
    Aggregation,
}

/// A user-editable visual property.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VisConfigSetting {
    /// Config key.
    pub key: &'static str,
    /// Name shown to the user.
    pub label: &'static str,
    /// Editor of the property.
    pub kind: SettingKind,
}

const fn number(key: &'static str, label: &'static str, range: [f64; 2], step: f64) -> VisConfigSetting {
    VisConfigSetting {
        key,
        label,
        kind: SettingKind::Number { range, step },
    }
}

const fn range(key: &'static str, label: &'static str, range: [f64; 2], step: f64) -> VisConfigSetting {
    VisConfigSetting {
        key,
        label,
        kind: SettingKind::Range { range, step },
    }
}

const fn setting(key: &'static str, label: &'static str, kind: SettingKind) -> VisConfigSetting {
    VisConfigSetting { key, label, kind }
}

const SETTINGS: &[VisConfigSetting] = &[
    number("opacity", "Opacity", [0.0, 1.0], 0.01),
    number("strokeOpacity", "Stroke Opacity", [0.0, 1.0], 0.01),
    number("thickness", "Stroke Width", [0.0, 100.0], 0.1),
    number("radius", "Radius", [0.0, 100.0], 0.1),
    setting("fixedRadius", "Fixed Radius to Meter", SettingKind::Boolean),
    setting("outline", "Outline", SettingKind::Boolean),
    setting("filled", "Fill Color", SettingKind::Boolean),
    setting("stroked", "Stroke", SettingKind::Boolean),
    setting("enable3d", "Enable Height", SettingKind::Boolean),
    setting("wireframe", "Wireframe", SettingKind::Boolean),
    setting("colorRange", "Color Range", SettingKind::ColorRange),
    setting("strokeColorRange", "Stroke Color Range", SettingKind::ColorRange),
    range("radiusRange", "Radius Range", [0.0, 500.0], 0.1),
    range("sizeRange", "Size Range", [0.0, 500.0], 0.1),
    range("heightRange", "Height Range", [0.0, 1000.0], 1.0),
    number("elevationScale", "Elevation Scale", [0.0, 100.0], 0.1),
    setting("strokeColor", "Stroke Color", SettingKind::Color),
    setting("targetColor", "Target Color", SettingKind::Color),
    number("worldUnitSize", "Grid Size (km)", [0.0, 500.0], 0.001),
    number("coverage", "Coverage", [0.0, 1.0], 0.01),
    range("percentile", "Color by Percentile", [0.0, 100.0], 0.01),
    range("elevationPercentile", "Height by Percentile", [0.0, 100.0], 0.01),
    setting("colorAggregation", "Color Aggregation", SettingKind::Aggregation),
    setting("sizeAggregation", "Height Aggregation", SettingKind::Aggregation),
];

/// Setting of the config key.
pub fn vis_config_setting(key: &str) -> Option<VisConfigSetting> {
    SETTINGS.iter().find(|s| s.key == key).copied()
}

/// Settings of the keys, in the given order. Unknown keys are skipped.
pub fn vis_config_settings(keys: &[&str]) -> Vec<VisConfigSetting> {
    keys.iter().filter_map(|key| vis_config_setting(key)).collect()
}
