//! 直线类标注：图幅接线（match line）说明与管线尺寸文字。

use runline_core::geometry::Point2;
use runline_core::path::PathError;

use crate::annotator::PlacementRecord;
use crate::errors::EngineError;
use crate::orientation::{LabelSide, matchline_rotation, side_of_line};
use crate::width::utility_label;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchlineOptions {
    /// 文字中心离接线的距离。
    pub offset: f64,
}

impl Default for MatchlineOptions {
    fn default() -> Self {
        Self { offset: 3.75 }
    }
}

/// 在拾取点一侧、与接线平行且相距 `offset` 的线的中点放置 `MATCH LINE - SEE SHEET n`。
pub fn matchline_callout(
    start: Point2,
    end: Point2,
    pick: Point2,
    sheet: &str,
    options: &MatchlineOptions,
) -> Result<PlacementRecord, EngineError> {
    let sheet = sheet.trim();
    if sheet.is_empty() {
        return Err(EngineError::invalid_argument("sheet", "sheet number is empty"));
    }
    let direction = start
        .vector_to(end)
        .normalize()
        .ok_or(PathError::DegenerateGeometry("matchline has zero length"))?;
    let side = side_of_line(start, end, pick);
    let signed_offset = match side {
        LabelSide::Right => -options.offset,
        _ => options.offset,
    };
    Ok(PlacementRecord {
        position: start
            .midpoint(end)
            .translate(direction.perp().scale(signed_offset)),
        rotation: matchline_rotation(direction.angle()),
        side,
        text: format!("MATCH LINE - SEE SHEET {sheet}"),
        distance: start.distance(end) / 2.0,
        tick: None,
    })
}

/// 尺寸文字宽度估算：单字宽约为字高的 0.8 倍。
const CHAR_WIDTH_FACTOR: f64 = 0.8;
/// 断开管线时在文字两端留出的余量。
const GAP_MARGIN: f64 = 1.2;

/// 管线尺寸文字及为文字让出的断口。
#[derive(Debug, Clone, PartialEq)]
pub struct UtilityTextLayout {
    pub record: PlacementRecord,
    /// 原线在断口两侧保留的部分；线太短放不下文字时为 `None`。
    pub pieces: Option<[(Point2, Point2); 2]>,
}

/// 在直线中点沿线方向写 `4"GAS` 之类的尺寸文字，并在文字处断开直线。
pub fn utility_text_callout(
    start: Point2,
    end: Point2,
    line_type: &str,
    text_height: f64,
) -> Result<UtilityTextLayout, EngineError> {
    let direction = start
        .vector_to(end)
        .normalize()
        .ok_or(PathError::DegenerateGeometry("utility line has zero length"))?;
    let text = utility_label(line_type);
    let middle = start.midpoint(end);
    let half_gap = text.chars().count() as f64 * text_height * CHAR_WIDTH_FACTOR / 2.0 * GAP_MARGIN;

    let pieces = (half_gap < start.distance(end) / 2.0).then(|| {
        [
            (start, middle.translate(direction.scale(-half_gap))),
            (middle.translate(direction.scale(half_gap)), end),
        ]
    });

    Ok(UtilityTextLayout {
        record: PlacementRecord {
            position: middle,
            rotation: direction.angle(),
            side: LabelSide::Left,
            text,
            distance: start.distance(end) / 2.0,
            tick: None,
        },
        pieces,
    })
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn matchline_label_sits_on_picked_side() {
        let start = Point2::new(300.0, -50.0);
        let end = Point2::new(300.0, 150.0);
        let options = MatchlineOptions::default();

        let left = matchline_callout(start, end, Point2::new(290.0, 0.0), "12", &options).unwrap();
        assert_eq!(left.side, LabelSide::Left);
        assert!((left.position.x() - 296.25).abs() < EPS);
        assert!((left.position.y() - 50.0).abs() < EPS);
        assert!((left.rotation - FRAC_PI_2).abs() < EPS);
        assert_eq!(left.text, "MATCH LINE - SEE SHEET 12");

        let right = matchline_callout(start, end, Point2::new(310.0, 0.0), "12", &options).unwrap();
        assert_eq!(right.side, LabelSide::Right);
        assert!((right.position.x() - 303.75).abs() < EPS);
    }

    #[test]
    fn westbound_matchline_text_is_turned_upright() {
        let record = matchline_callout(
            Point2::new(100.0, 0.0),
            Point2::new(0.0, 0.0),
            Point2::new(50.0, 10.0),
            "3",
            &MatchlineOptions::default(),
        )
        .unwrap();
        assert!(record.rotation.abs() < EPS);
        assert!((record.position.y() - 3.75).abs() < EPS);
    }

    #[test]
    fn matchline_requires_sheet_and_length() {
        let point = Point2::new(0.0, 0.0);
        assert!(matches!(
            matchline_callout(point, Point2::new(1.0, 0.0), point, " ", &MatchlineOptions::default()),
            Err(EngineError::InvalidArgument { .. })
        ));
        assert!(matchline_callout(point, point, point, "1", &MatchlineOptions::default()).is_err());
    }

    #[test]
    fn utility_text_splits_line_around_label() {
        let layout = utility_text_callout(
            Point2::new(0.0, -40.0),
            Point2::new(100.0, -40.0),
            "GAS04HP",
            2.2,
        )
        .unwrap();
        assert_eq!(layout.record.text, "4\"GASHP");
        assert!((layout.record.position.x() - 50.0).abs() < EPS);
        let [first, second] = layout.pieces.unwrap();
        assert!((first.0.x() - 0.0).abs() < EPS);
        assert!(first.1.x() < 50.0 && second.0.x() > 50.0);
        assert!((second.1.x() - 100.0).abs() < EPS);
        assert!(((50.0 - first.1.x()) - (second.0.x() - 50.0)).abs() < EPS);
    }

    #[test]
    fn short_utility_line_is_not_split() {
        let layout = utility_text_callout(
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            "GAS04HP",
            2.2,
        )
        .unwrap();
        assert!(layout.pieces.is_none());
    }
}
