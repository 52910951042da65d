use runline_config::{AppConfig, WidthUnitsConfig};
use runline_core::geometry::Vector2;
use runline_engine::command::{
    CalloutSettings, DraftingSettings, OffsetSettings, ProximitySettings, StationSettings,
};
use runline_engine::offset::EdgeStyleRules;
use runline_engine::width::WidthUnits;

/// 把配置文件中的默认值转换为命令参数。
pub fn drafting_settings(config: &AppConfig) -> DraftingSettings {
    let stations = &config.stations;
    let proximity = &config.proximity;
    let offsets = &config.offsets;
    let callouts = &config.callouts;

    DraftingSettings {
        stations: StationSettings {
            interval: stations.interval,
            prefer_below: stations.prefer_below,
            text_height: stations.text_height,
            label_offset: stations.label_offset,
            tick_half_length: stations.tick_half_length,
            flip_distance: stations.flip_distance,
            text_style: stations.text_style.clone(),
        },
        proximity: ProximitySettings {
            fixed_offset: vector(proximity.fixed_offset),
            reversed_offset: vector(proximity.reversed_offset),
            label_offset: proximity.label_offset,
            text_height: proximity.text_height,
            layer: proximity.layer.clone(),
            tolerance: proximity.tolerance,
        },
        offsets: OffsetSettings {
            units: match offsets.width_units {
                WidthUnitsConfig::Inches => WidthUnits::Inches,
                WidthUnitsConfig::Units => WidthUnits::DrawingUnits,
            },
            edges: EdgeStyleRules {
                narrow_threshold: offsets.narrow_threshold,
                narrow_line_type: offsets.narrow_line_type.clone(),
                wide_line_type: offsets.wide_line_type.clone(),
                storm_layer: offsets.storm_layer.clone(),
                storm_edge_layer: offsets.storm_edge_layer.clone(),
            },
        },
        callouts: CalloutSettings {
            matchline_offset: callouts.matchline_offset,
            matchline_text_height: callouts.matchline_text_height,
            span_layer: callouts.span_layer.clone(),
            span_text_height: callouts.span_text_height,
        },
    }
}

#[inline]
fn vector([x, y]: [f64; 2]) -> Vector2 {
    Vector2::new(x, y)
}
