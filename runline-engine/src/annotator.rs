//! 沿线标注：按固定间距生成桩号，或为靠近路径的对象（块参照）求桩号。

use runline_core::geometry::{Point2, Vector2};
use runline_core::path::{PathSampler, PathSegment};
use tracing::debug;

use crate::errors::EngineError;
use crate::orientation::{LabelSide, OrientationRequest, ReversedPolicy, along_tangent, solve};
use crate::station::{StationValue, format_callout_station, station_from_distance};

const COUNT_EPSILON: f64 = 1e-9;

/// 垂直于路径、穿过采样点的刻度短线。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickMark {
    pub start: Point2,
    pub end: Point2,
}

/// 一个待落图的标注。
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementRecord {
    pub position: Point2,
    /// 弧度，`[0, 2π)`。
    pub rotation: f64,
    pub side: LabelSide,
    pub text: String,
    /// 采样处的沿线距离。
    pub distance: f64,
    pub tick: Option<TickMark>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalOptions {
    pub interval: f64,
    pub prefer_below: bool,
    pub label_offset: f64,
    pub tick_half_length: f64,
}

impl Default for IntervalOptions {
    fn default() -> Self {
        Self {
            interval: 100.0,
            prefer_below: false,
            label_offset: 2.0,
            tick_half_length: 1.5,
        }
    }
}

/// 在 `interval, 2·interval, …` 处生成桩号与刻度线，按距离递增输出。
pub fn interval_labels(
    sampler: &PathSampler,
    options: &IntervalOptions,
) -> Result<Vec<PlacementRecord>, EngineError> {
    let interval = options.interval;
    if !interval.is_finite() || interval <= 0.0 {
        return Err(EngineError::InvalidInterval(interval));
    }
    let count = (sampler.length() / interval + COUNT_EPSILON).floor() as usize;

    let mut records = Vec::new();
    for step in 1..=count {
        let distance = step as f64 * interval;
        match interval_record(sampler, distance, options) {
            Ok(record) => records.push(record),
            Err(err) if err.is_recoverable() => {
                debug!(distance, error = %err, "跳过无法定向的桩号");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(records)
}

fn interval_record(
    sampler: &PathSampler,
    distance: f64,
    options: &IntervalOptions,
) -> Result<PlacementRecord, EngineError> {
    let sample = sampler.point_at(distance);
    let tangent = sampler.tangent_at_distance(distance)?;
    let orientation = solve(&OrientationRequest {
        tangent,
        prefer_below: options.prefer_below,
        flip: false,
        label_offset: options.label_offset,
    })?;
    let half_tick = orientation.perpendicular.scale(options.tick_half_length);
    Ok(PlacementRecord {
        position: orientation.anchor(sample),
        rotation: orientation.rotation,
        side: orientation.side,
        text: station_from_distance(distance)?,
        distance,
        tick: Some(TickMark {
            start: sample.translate(half_tick.reversed()),
            end: sample.translate(half_tick),
        }),
    })
}

/// 待求桩号的离散对象。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityCandidate {
    pub id: u64,
    pub position: Point2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProximityOptions {
    /// 文字沿路径方向旋转；否则水平放在固定偏移处。
    pub rotate: bool,
    pub fixed_offset: Vector2,
    pub reversed_offset: Vector2,
    pub label_offset: f64,
    /// 非空时追加 `" LINE n"`。
    pub line_number: Option<String>,
}

impl Default for ProximityOptions {
    fn default() -> Self {
        Self {
            rotate: false,
            fixed_offset: Vector2::new(-5.0, 5.0),
            reversed_offset: ReversedPolicy::default().offset,
            label_offset: 2.0,
            line_number: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProximityLabel {
    pub candidate_id: u64,
    pub record: PlacementRecord,
}

/// 只为落在路径上（容差内）的候选生成标注，其余静默跳过；输出保持输入顺序。
pub fn proximity_labels<I>(
    sampler: &PathSampler,
    candidates: I,
    options: &ProximityOptions,
) -> Vec<ProximityLabel>
where
    I: IntoIterator<Item = ProximityCandidate>,
{
    candidates
        .into_iter()
        .filter(|candidate| {
            let reachable = sampler.reaches(candidate.position);
            if !reachable {
                debug!(candidate = candidate.id, "候选对象超出路径范围，跳过");
            }
            reachable
        })
        .filter_map(|candidate| match proximity_record(sampler, candidate, options) {
            Ok(record) => Some(ProximityLabel {
                candidate_id: candidate.id,
                record,
            }),
            Err(err) => {
                debug!(candidate = candidate.id, error = %err, "候选对象不在路径上，跳过");
                None
            }
        })
        .collect()
}

fn proximity_record(
    sampler: &PathSampler,
    candidate: ProximityCandidate,
    options: &ProximityOptions,
) -> Result<PlacementRecord, EngineError> {
    let distance = sampler.distance_at(candidate.position)?;
    let text = format_callout_station(
        StationValue::from_distance(distance)?,
        options.line_number.as_deref(),
    );
    let (position, rotation) = if options.rotate {
        let tangent = sampler.tangent_at_distance(distance)?;
        let placement = along_tangent(
            tangent,
            options.label_offset,
            ReversedPolicy {
                offset: options.reversed_offset,
            },
        )?;
        (candidate.position.translate(placement.offset), placement.rotation)
    } else {
        (candidate.position.translate(options.fixed_offset), 0.0)
    };
    Ok(PlacementRecord {
        position,
        rotation,
        side: LabelSide::Bottom,
        text,
        distance,
        tick: None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpanOptions {
    pub label_offset: f64,
}

impl Default for SpanOptions {
    fn default() -> Self {
        Self { label_offset: 2.0 }
    }
}

/// 架空线档距：每个顶点间的直线段在弦中点标注 `长度'`，圆弧段不标。
pub fn span_labels(sampler: &PathSampler, options: &SpanOptions) -> Vec<PlacementRecord> {
    let mut records = Vec::new();
    let mut travelled = 0.0;
    for segment in sampler.segments() {
        let length = segment.length();
        if let PathSegment::Line { start, end } = *segment {
            match span_record(start, end, travelled + length / 2.0, options) {
                Ok(record) => records.push(record),
                Err(err) => debug!(error = %err, "跳过退化档距"),
            }
        }
        travelled += length;
    }
    records
}

fn span_record(
    start: Point2,
    end: Point2,
    distance: f64,
    options: &SpanOptions,
) -> Result<PlacementRecord, EngineError> {
    let orientation = solve(&OrientationRequest {
        tangent: start.vector_to(end),
        prefer_below: false,
        flip: false,
        label_offset: options.label_offset,
    })?;
    let chord = StationValue::from_distance(start.distance(end))?;
    Ok(PlacementRecord {
        position: orientation.anchor(start.midpoint(end)),
        rotation: orientation.rotation,
        side: orientation.side,
        text: format!("{}'", chord.get()),
        distance,
        tick: None,
    })
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use runline_core::path::Path;

    use super::*;

    const EPS: f64 = 1e-9;

    fn straight(length: f64) -> PathSampler {
        PathSampler::new(
            Path::from_line(Point2::new(0.0, 0.0), Point2::new(length, 0.0)).unwrap(),
        )
    }

    #[test]
    fn interval_labels_cover_whole_intervals_only() {
        let records = interval_labels(&straight(250.0), &IntervalOptions::default()).unwrap();
        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["1+00", "2+00"]);
        assert!((records[0].position.x() - 100.0).abs() < EPS);
        assert!((records[0].position.y() - 2.0).abs() < EPS);
        let tick = records[0].tick.unwrap();
        assert!((tick.start.y() + 1.5).abs() < EPS);
        assert!((tick.end.y() - 1.5).abs() < EPS);
    }

    #[test]
    fn interval_labels_include_the_end_station() {
        let records = interval_labels(&straight(300.0), &IntervalOptions::default()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].text, "3+00");
    }

    #[test]
    fn short_path_yields_no_labels() {
        let records = interval_labels(&straight(99.0), &IntervalOptions::default()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn invalid_interval_is_fatal() {
        for interval in [0.0, -10.0, f64::NAN, f64::INFINITY] {
            let options = IntervalOptions {
                interval,
                ..IntervalOptions::default()
            };
            assert!(matches!(
                interval_labels(&straight(250.0), &options),
                Err(EngineError::InvalidInterval(_))
            ));
        }
    }

    #[test]
    fn small_intervals_are_not_capped() {
        let options = IntervalOptions {
            interval: 1.0,
            ..IntervalOptions::default()
        };
        let records = interval_labels(&straight(200_001.0), &options).unwrap();
        assert_eq!(records.len(), 200_001);
        assert_eq!(records[200_000].text, "2000+01");
    }

    #[test]
    fn prefer_below_moves_labels_under_the_line() {
        let options = IntervalOptions {
            prefer_below: true,
            ..IntervalOptions::default()
        };
        let records = interval_labels(&straight(250.0), &options).unwrap();
        assert!(records.iter().all(|r| r.position.y() < 0.0));
        assert!(records.iter().all(|r| r.side == LabelSide::Top));
    }

    #[test]
    fn proximity_labels_only_candidates_on_the_path() {
        let candidates = [
            ProximityCandidate {
                id: 1,
                position: Point2::new(35.0, 0.0),
            },
            ProximityCandidate {
                id: 2,
                position: Point2::new(40.0, 3.0),
            },
            ProximityCandidate {
                id: 3,
                position: Point2::new(1234.0, 0.0),
            },
        ];
        let labels = proximity_labels(&straight(2000.0), candidates, &ProximityOptions::default());
        let ids: Vec<u64> = labels.iter().map(|l| l.candidate_id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(labels[0].record.text, "0+35");
        assert_eq!(labels[1].record.text, "12+34");
        assert!((labels[0].record.position.x() - 30.0).abs() < EPS);
        assert!((labels[0].record.position.y() - 5.0).abs() < EPS);
        assert_eq!(labels[0].record.rotation, 0.0);
    }

    #[test]
    fn proximity_rotation_follows_path_direction() {
        let sampler = PathSampler::new(
            Path::from_line(Point2::new(0.0, 0.0), Point2::new(0.0, 100.0)).unwrap(),
        );
        let options = ProximityOptions {
            rotate: true,
            line_number: Some("2".to_string()),
            ..ProximityOptions::default()
        };
        let labels = proximity_labels(
            &sampler,
            [ProximityCandidate {
                id: 7,
                position: Point2::new(0.0, 50.0),
            }],
            &options,
        );
        let record = &labels[0].record;
        assert_eq!(record.text, "0+50 LINE 2");
        assert!((record.rotation - PI / 2.0).abs() < EPS);
        assert!((record.position.x() + 2.0).abs() < EPS);
    }

    #[test]
    fn westbound_proximity_uses_reversed_offset() {
        let sampler = PathSampler::new(
            Path::from_line(Point2::new(100.0, 0.0), Point2::new(0.0, 0.0)).unwrap(),
        );
        let options = ProximityOptions {
            rotate: true,
            ..ProximityOptions::default()
        };
        let labels = proximity_labels(
            &sampler,
            [ProximityCandidate {
                id: 1,
                position: Point2::new(40.0, 0.0),
            }],
            &options,
        );
        let record = &labels[0].record;
        assert_eq!(record.text, "0+60");
        assert_eq!(record.rotation, 0.0);
        assert!((record.position.x() - 43.0).abs() < EPS);
        assert!((record.position.y() - 3.0).abs() < EPS);
    }

    #[test]
    fn span_labels_use_rounded_chord_lengths() {
        let sampler = PathSampler::new(
            Path::from_points([
                Point2::new(0.0, 0.0),
                Point2::new(120.4, 0.0),
                Point2::new(120.4, 80.6),
            ])
            .unwrap(),
        );
        let records = span_labels(&sampler, &SpanOptions::default());
        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["120'", "81'"]);
        assert!((records[0].position.x() - 60.2).abs() < EPS);
        assert!((records[1].distance - (120.4 + 40.3)).abs() < EPS);
    }
}
