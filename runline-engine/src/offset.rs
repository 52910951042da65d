//! 平行偏移线生成：沿路径左法线两侧各偏移半宽，得到管线的两条边线。
//!
//! 直线段沿各自法线平移后在拐角处求交（超过斜接限制或平行时改为倒角连线）；
//! 与圆弧相接的拐角一律用直线连接。圆弧保持凸度，半径增减偏移量。

use runline_core::document::BYLAYER;
use runline_core::geometry::Point2;
use runline_core::path::{Path, PathError, PathSegment};
use tracing::debug;

use crate::errors::EngineError;
use crate::width::{WidthUnits, require_half_width};

/// 斜接点离原拐角超过 `MITER_LIMIT × 偏移量` 时改为倒角。
pub const MITER_LIMIT: f64 = 4.0;

const JOIN_TOLERANCE: f64 = 1e-9;
const MIN_OFFSET_RADIUS: f64 = 1e-9;
const PARALLEL_TOLERANCE: f64 = 1e-12;

/// 一条路径的两条边线。`outer` 在行进方向左侧，`inner` 在右侧且走向相反。
#[derive(Debug, Clone, PartialEq)]
pub struct OffsetPair {
    pub outer: Path,
    pub inner: Path,
    pub half_width: f64,
}

pub fn offset_pair(path: &Path, half_width: f64) -> Result<OffsetPair, EngineError> {
    if !half_width.is_finite() || half_width <= 0.0 {
        return Err(EngineError::InvalidWidth(format!(
            "half width {half_width} must be positive"
        )));
    }
    let outer = offset_path(path, half_width)?;
    let inner = offset_path(path, -half_width)?.reversed();
    Ok(OffsetPair {
        outer,
        inner,
        half_width,
    })
}

/// 带符号偏移：正值向行进方向左侧，负值向右侧。
pub fn offset_path(path: &Path, distance: f64) -> Result<Path, EngineError> {
    if !distance.is_finite() {
        return Err(EngineError::InvalidWidth(format!(
            "offset distance {distance} is not finite"
        )));
    }
    let source = path.segments();
    let mut shifted = source
        .iter()
        .map(|segment| offset_segment(segment, distance))
        .collect::<Result<Vec<_>, _>>()?;

    let count = shifted.len();
    let joins = if path.is_closed() {
        count
    } else {
        count.saturating_sub(1)
    };
    let mut connectors: Vec<Option<PathSegment>> = vec![None; count];
    for (index, connector) in connectors.iter_mut().enumerate().take(joins) {
        let next = (index + 1) % count;
        *connector = join(&mut shifted, index, next, source[index].end(), distance);
    }

    let mut segments = Vec::with_capacity(count * 2);
    for (segment, connector) in shifted.into_iter().zip(connectors) {
        segments.push(segment);
        segments.extend(connector);
    }
    Ok(Path::from_segments(&segments, path.is_closed())?)
}

fn offset_segment(segment: &PathSegment, distance: f64) -> Result<PathSegment, EngineError> {
    match *segment {
        PathSegment::Line { start, end } => {
            let normal = start
                .vector_to(end)
                .normalize()
                .ok_or(PathError::DegenerateGeometry("zero-length line segment"))?
                .perp()
                .scale(distance);
            Ok(PathSegment::Line {
                start: start.translate(normal),
                end: end.translate(normal),
            })
        }
        PathSegment::Arc {
            center,
            radius,
            start_angle,
            sweep,
        } => {
            // 逆时针圆弧的左法线指向圆心。
            let offset_radius = radius - distance * sweep.signum();
            if offset_radius <= MIN_OFFSET_RADIUS {
                return Err(PathError::DegenerateGeometry("offset collapses an arc segment").into());
            }
            Ok(PathSegment::Arc {
                center,
                radius: offset_radius,
                start_angle,
                sweep,
            })
        }
    }
}

/// 连接第 `current` 段终点与第 `next` 段起点。直线与直线能斜接时直接修剪端点，
/// 否则返回一段直线连接。
fn join(
    segments: &mut [PathSegment],
    current: usize,
    next: usize,
    corner: Point2,
    distance: f64,
) -> Option<PathSegment> {
    let from = segments[current].end();
    let to = segments[next].start();
    if from.distance(to) <= JOIN_TOLERANCE {
        return None;
    }

    if let (
        PathSegment::Line {
            start: first_start,
            end: first_end,
        },
        PathSegment::Line {
            start: second_start,
            end: second_end,
        },
    ) = (segments[current], segments[next])
    {
        let miter = line_intersection(first_start, first_end, second_start, second_end)
            .filter(|point| corner.distance(*point) <= MITER_LIMIT * distance.abs())
            .filter(|point| {
                keeps_direction(first_start, first_end, first_start, *point)
                    && keeps_direction(second_start, second_end, *point, second_end)
            });
        if let Some(point) = miter {
            if let PathSegment::Line { end, .. } = &mut segments[current] {
                *end = point;
            }
            if let PathSegment::Line { start, .. } = &mut segments[next] {
                *start = point;
            }
            return None;
        }
        debug!(
            corner_x = corner.x(),
            corner_y = corner.y(),
            "拐角超出斜接限制，改用倒角"
        );
    }

    Some(PathSegment::Line {
        start: from,
        end: to,
    })
}

fn line_intersection(a0: Point2, a1: Point2, b0: Point2, b1: Point2) -> Option<Point2> {
    let da = a0.vector_to(a1);
    let db = b0.vector_to(b1);
    let denominator = da.cross(db);
    if denominator.abs() <= PARALLEL_TOLERANCE * da.length() * db.length() {
        return None;
    }
    let t = a0.vector_to(b0).cross(db) / denominator;
    Some(a0.translate(da.scale(t)))
}

/// 修剪后的线段仍与原线段同向且长度不为零。
fn keeps_direction(start: Point2, end: Point2, trimmed_start: Point2, trimmed_end: Point2) -> bool {
    start
        .vector_to(end)
        .dot(trimmed_start.vector_to(trimmed_end))
        > 0.0
}

/// 偏移边线的图层与线型规则。
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeStyleRules {
    /// 半宽小于该值时使用细线线型。
    pub narrow_threshold: f64,
    pub narrow_line_type: String,
    pub wide_line_type: String,
    pub storm_layer: String,
    pub storm_edge_layer: String,
}

impl Default for EdgeStyleRules {
    fn default() -> Self {
        Self {
            narrow_threshold: 1.5,
            narrow_line_type: "CONTINUOUS".to_string(),
            wide_line_type: "BLDG".to_string(),
            storm_layer: "STORM".to_string(),
            storm_edge_layer: "STORM2".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeStyle {
    pub layer: String,
    pub line_type: String,
}

impl EdgeStyleRules {
    pub fn classify(&self, source_layer: &str, half_width: f64) -> EdgeStyle {
        if source_layer.eq_ignore_ascii_case(&self.storm_layer) {
            return EdgeStyle {
                layer: self.storm_edge_layer.clone(),
                line_type: BYLAYER.to_string(),
            };
        }
        let line_type = if half_width < self.narrow_threshold {
            &self.narrow_line_type
        } else {
            &self.wide_line_type
        };
        EdgeStyle {
            layer: source_layer.to_string(),
            line_type: line_type.clone(),
        }
    }
}

/// 批量偏移的结果，两组都保持输入顺序。
#[derive(Debug)]
pub struct OffsetBatch<K> {
    pub pairs: Vec<(K, OffsetPair)>,
    pub skipped: Vec<(K, EngineError)>,
}

/// 对每条 `(键, 路径, 线型名)` 生成偏移线；宽度无法解码或几何退化的条目被跳过。
pub fn offset_batch<'a, K, I>(items: I, units: WidthUnits) -> OffsetBatch<K>
where
    K: Copy + std::fmt::Debug,
    I: IntoIterator<Item = (K, &'a Path, &'a str)>,
{
    let mut batch = OffsetBatch {
        pairs: Vec::new(),
        skipped: Vec::new(),
    };
    for (key, path, style_name) in items {
        let result = require_half_width(style_name, units)
            .and_then(|half_width| offset_pair(path, half_width));
        match result {
            Ok(pair) => batch.pairs.push((key, pair)),
            Err(err) => {
                debug!(key = ?key, style = style_name, error = %err, "跳过偏移对象");
                batch.skipped.push((key, err));
            }
        }
    }
    batch
}
