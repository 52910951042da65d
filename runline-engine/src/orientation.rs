//! 文字方向求解：由路径切线得到刻度线方向、可读的文字旋转角和贴靠侧。
//!
//! 角度统一为弧度并规范到 `[0, 2π)`。

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use runline_core::document::AttachmentPoint;
use runline_core::geometry::{Point2, Vector2, normalize_angle};
use runline_core::path::PathError;

use crate::errors::EngineError;

/// 文字相对锚点所在的一侧。`Top`/`Bottom` 用于桩号，`Left`/`Right` 用于图幅接线。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelSide {
    Top,
    Bottom,
    Left,
    Right,
}

impl LabelSide {
    /// 多行文字的对齐点：`Top` 表示锚点在文字顶边。
    pub fn attachment(self) -> AttachmentPoint {
        match self {
            LabelSide::Top => AttachmentPoint::TopCenter,
            LabelSide::Bottom => AttachmentPoint::BottomCenter,
            LabelSide::Left | LabelSide::Right => AttachmentPoint::MiddleCenter,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationRequest {
    pub tangent: Vector2,
    pub prefer_below: bool,
    /// 反转 `prefer_below`。
    pub flip: bool,
    pub label_offset: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    /// 单位切线。
    pub tangent: Vector2,
    /// 切线逆时针旋转 90° 的单位法线。
    pub perpendicular: Vector2,
    /// 刻度线（法线）方向角。
    pub tick_angle: f64,
    pub rotation: f64,
    pub side: LabelSide,
    /// 锚点相对采样点的位移。
    pub anchor_offset: Vector2,
}

impl Orientation {
    #[inline]
    pub fn anchor(&self, sample: Point2) -> Point2 {
        sample.translate(self.anchor_offset)
    }
}

/// 求解单个采样点的文字方向。切线长度为零时返回 `DegenerateGeometry`。
pub fn solve(request: &OrientationRequest) -> Result<Orientation, EngineError> {
    let tangent = unit_tangent(request.tangent)?;
    let perpendicular = tangent.perp();
    let tick_angle = perpendicular.angle();
    let rotation = readable_rotation(tick_angle);

    let below = request.prefer_below != request.flip;
    let upper_half = tick_angle <= PI;
    let (side, anchor_offset) = if below {
        let side = if upper_half {
            LabelSide::Top
        } else {
            LabelSide::Bottom
        };
        (side, perpendicular.scale(-request.label_offset))
    } else {
        let side = if upper_half {
            LabelSide::Bottom
        } else {
            LabelSide::Top
        };
        (side, perpendicular.scale(request.label_offset))
    };

    Ok(Orientation {
        tangent,
        perpendicular,
        tick_angle,
        rotation,
        side,
        anchor_offset,
    })
}

/// 由刻度线方向得到文字旋转角，结果与水平方向的夹角不超过 π/2。
pub fn readable_rotation(tick_angle: f64) -> f64 {
    let theta = normalize_angle(tick_angle);
    let rotation = if theta > FRAC_PI_2 && theta <= PI {
        theta - FRAC_PI_2
    } else if theta > PI {
        theta + FRAC_PI_2
    } else {
        TAU - (theta - FRAC_PI_2).abs()
    };
    normalize_angle(rotation)
}

/// 路径行进方向角（不做可读性翻转）。
pub fn tangent_rotation(tangent: Vector2) -> Result<f64, EngineError> {
    Ok(unit_tangent(tangent)?.angle())
}

/// 沿线方向旋转的文字落点。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TangentPlacement {
    pub rotation: f64,
    pub offset: Vector2,
    /// 路径正好朝 -X 方向，改用固定偏移。
    pub reversed: bool,
}

/// 反向（旋转角恰为 π）时使用的固定偏移。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReversedPolicy {
    pub offset: Vector2,
}

impl Default for ReversedPolicy {
    fn default() -> Self {
        Self {
            offset: Vector2::new(3.0, 3.0),
        }
    }
}

/// 文字沿路径方向旋转，朝左的方向翻转 π 保证可读；恰为 π 时改用 `policy.offset`
/// 且旋转为 0。偏移沿文字的上方向，文字底边对齐时向远离路径的一侧生长。
pub fn along_tangent(
    tangent: Vector2,
    label_offset: f64,
    policy: ReversedPolicy,
) -> Result<TangentPlacement, EngineError> {
    let heading = tangent_rotation(tangent)?;
    if heading == PI {
        return Ok(TangentPlacement {
            rotation: 0.0,
            offset: policy.offset,
            reversed: true,
        });
    }
    let rotation = matchline_rotation(heading);
    Ok(TangentPlacement {
        rotation,
        offset: Vector2::from_angle(rotation + FRAC_PI_2).scale(label_offset),
        reversed: false,
    })
}

/// 把桩号文字翻到线的另一侧：顶边对齐的沿 `rotation - 3π/2` 移动并改为底边对齐，
/// 其余对齐方式一律沿 `rotation + 3π/2` 移动并改为顶边对齐。
pub fn flip_label(
    position: Point2,
    rotation: f64,
    attachment: AttachmentPoint,
    distance: f64,
) -> (Point2, LabelSide) {
    let (direction, side) = if attachment == AttachmentPoint::TopCenter {
        (rotation - 1.5 * PI, LabelSide::Bottom)
    } else {
        (rotation + 1.5 * PI, LabelSide::Top)
    };
    let moved = position.translate(Vector2::from_angle(direction).scale(distance));
    (moved, side)
}

/// 直线标注的可读角度：落在 (π/2, 3π/2) 之间的加 π。
pub fn matchline_rotation(angle: f64) -> f64 {
    let angle = normalize_angle(angle);
    if angle > FRAC_PI_2 && angle < 1.5 * PI {
        normalize_angle(angle + PI)
    } else {
        angle
    }
}

/// 拾取点位于有向线段的左侧（含线上）还是右侧。
pub fn side_of_line(start: Point2, end: Point2, pick: Point2) -> LabelSide {
    let direction = start.vector_to(end);
    let to_pick = start.vector_to(pick);
    if direction.cross(to_pick) >= 0.0 {
        LabelSide::Left
    } else {
        LabelSide::Right
    }
}

fn unit_tangent(tangent: Vector2) -> Result<Vector2, EngineError> {
    tangent
        .normalize()
        .ok_or(EngineError::Path(PathError::DegenerateGeometry(
            "tangent has zero length",
        )))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn request(tangent: Vector2, prefer_below: bool) -> OrientationRequest {
        OrientationRequest {
            tangent,
            prefer_below,
            flip: false,
            label_offset: 2.0,
        }
    }

    #[test]
    fn eastbound_path_reads_horizontally() {
        let orientation = solve(&request(Vector2::new(1.0, 0.0), false)).unwrap();
        assert!((orientation.tick_angle - FRAC_PI_2).abs() < EPS);
        assert!(orientation.rotation.abs() < EPS || (orientation.rotation - TAU).abs() < EPS);
        assert_eq!(orientation.side, LabelSide::Bottom);
        assert!((orientation.anchor_offset.y() - 2.0).abs() < EPS);
    }

    #[test]
    fn westbound_path_keeps_text_upright() {
        let orientation = solve(&request(Vector2::new(-1.0, 0.0), false)).unwrap();
        assert!((orientation.tick_angle - 1.5 * PI).abs() < EPS);
        assert!(orientation.rotation.abs() < EPS);
        // 法线朝下，文字挂在锚点下方。
        assert_eq!(orientation.side, LabelSide::Top);
        assert!((orientation.anchor_offset.y() + 2.0).abs() < EPS);
    }

    #[test]
    fn northbound_path_rotates_text_along_tick() {
        let orientation = solve(&request(Vector2::new(0.0, 1.0), false)).unwrap();
        assert!((orientation.tick_angle - PI).abs() < EPS);
        assert!((orientation.rotation - FRAC_PI_2).abs() < EPS);
        assert_eq!(orientation.side, LabelSide::Bottom);
    }

    #[test]
    fn below_and_flip_mirror_the_anchor() {
        let above = solve(&request(Vector2::new(1.0, 0.0), false)).unwrap();
        let below = solve(&request(Vector2::new(1.0, 0.0), true)).unwrap();
        assert_eq!(below.side, LabelSide::Top);
        assert!((above.anchor_offset.y() + below.anchor_offset.y()).abs() < EPS);

        let flipped = solve(&OrientationRequest {
            flip: true,
            ..request(Vector2::new(1.0, 0.0), true)
        })
        .unwrap();
        assert_eq!(flipped.side, above.side);
    }

    #[test]
    fn zero_tangent_is_degenerate() {
        let err = solve(&request(Vector2::new(0.0, 0.0), false)).unwrap_err();
        assert!(err.is_recoverable());
        assert!(matches!(
            err,
            EngineError::Path(PathError::DegenerateGeometry(_))
        ));
    }

    #[test]
    fn reversed_tangent_uses_policy_offset() {
        let policy = ReversedPolicy::default();
        let placement = along_tangent(Vector2::new(-4.0, 0.0), 2.0, policy).unwrap();
        assert!(placement.reversed);
        assert_eq!(placement.rotation, 0.0);
        assert_eq!(placement.offset, policy.offset);

        let normal = along_tangent(Vector2::new(0.0, 1.0), 2.0, policy).unwrap();
        assert!(!normal.reversed);
        assert!((normal.rotation - FRAC_PI_2).abs() < EPS);
        assert!((normal.offset.x() + 2.0).abs() < EPS);
    }

    #[test]
    fn leftward_tangents_are_turned_upright() {
        let policy = ReversedPolicy::default();
        let placement =
            along_tangent(Vector2::from_angle(0.75 * PI), 2.0, policy).unwrap();
        assert!(!placement.reversed);
        assert!((placement.rotation - 1.75 * PI).abs() < EPS);
        assert!(placement.rotation.cos() > 0.0);
        // 文字上方向朝右上，偏移跟随文字而非原路径左法线。
        let up = Vector2::from_angle(0.25 * PI).scale(2.0);
        assert!((placement.offset.x() - up.x()).abs() < EPS);
        assert!((placement.offset.y() - up.y()).abs() < EPS);

        let south = along_tangent(Vector2::new(0.0, -1.0), 2.0, policy).unwrap();
        assert!((south.rotation - 1.5 * PI).abs() < EPS);
    }

    #[test]
    fn flip_moves_across_the_line() {
        let (moved, side) =
            flip_label(Point2::new(10.0, 2.0), 0.0, AttachmentPoint::TopCenter, 4.2);
        assert_eq!(side, LabelSide::Bottom);
        assert!((moved.x() - 10.0).abs() < EPS);
        assert!((moved.y() - 6.2).abs() < EPS);

        let (back, side) = flip_label(moved, 0.0, side.attachment(), 4.2);
        assert_eq!(side, LabelSide::Top);
        assert!((back.y() - 2.0).abs() < EPS);
    }

    #[test]
    fn flip_treats_middle_aligned_text_as_bottom_aligned() {
        let (moved, side) =
            flip_label(Point2::new(0.0, 0.0), 0.0, AttachmentPoint::MiddleCenter, 4.2);
        assert_eq!(side, LabelSide::Top);
        assert!(moved.x().abs() < EPS);
        assert!((moved.y() + 4.2).abs() < EPS);
    }

    #[test]
    fn matchline_rotation_avoids_upside_down_text() {
        assert!((matchline_rotation(PI) - 0.0).abs() < EPS);
        assert!((matchline_rotation(1.5 * PI) - 1.5 * PI).abs() < EPS);
        assert!((matchline_rotation(FRAC_PI_2) - FRAC_PI_2).abs() < EPS);
        assert!((matchline_rotation(0.75 * PI) - 1.75 * PI).abs() < EPS);
    }

    #[test]
    fn side_of_line_uses_cross_product() {
        let start = Point2::new(0.0, 0.0);
        let end = Point2::new(10.0, 0.0);
        assert_eq!(side_of_line(start, end, Point2::new(5.0, 3.0)), LabelSide::Left);
        assert_eq!(side_of_line(start, end, Point2::new(5.0, -3.0)), LabelSide::Right);
    }
}
