//! 从线型名称中解码管线宽度，例如 `UTILITY12` 表示 12 英寸管径。

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::EngineError;

static DIGIT_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]+").expect("digit pattern is valid"));

const INCHES_PER_FOOT: f64 = 12.0;

/// 线型名中数字的单位。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WidthUnits {
    /// 数字为英寸，图纸单位为英尺。
    #[default]
    Inches,
    /// 数字直接是图纸单位。
    DrawingUnits,
}

/// 返回线型名中第一段数字对应的半宽；没有数字时返回 `None`。
pub fn decode(style_name: &str, units: WidthUnits) -> Option<f64> {
    let digits: f64 = DIGIT_RUN.find(style_name)?.as_str().parse().ok()?;
    let full_width = match units {
        WidthUnits::Inches => digits / INCHES_PER_FOOT,
        WidthUnits::DrawingUnits => digits,
    };
    let half_width = full_width / 2.0;
    half_width.is_finite().then_some(half_width)
}

/// 与 [`decode`] 相同，但无法解码或宽度为零时返回 `InvalidWidth`。
pub fn require_half_width(style_name: &str, units: WidthUnits) -> Result<f64, EngineError> {
    match decode(style_name, units) {
        Some(half_width) if half_width > 0.0 => Ok(half_width),
        Some(_) => Err(EngineError::InvalidWidth(format!(
            "line type {style_name} encodes a zero width"
        ))),
        None => Err(EngineError::InvalidWidth(format!(
            "line type {style_name} encodes no width"
        ))),
    }
}

/// 管线尺寸文字：数字（去掉前导零）+ `"` + 全部字母，如 `GAS04HP → 4"GASHP`。
pub fn utility_label(style_name: &str) -> String {
    let digits: String = style_name.chars().filter(char::is_ascii_digit).collect();
    let letters: String = style_name.chars().filter(|c| c.is_alphabetic()).collect();
    let size = digits.parse::<u64>().unwrap_or(0);
    format!("{size}\"{letters}")
}
