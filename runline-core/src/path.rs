//! 沿线路径（running line / utility line）的几何模型与采样器。
//!
//! `Path` 只保存顶点与凸度；`PathSampler` 预先展开线段并累计弧长，
//! 提供弧长 ↔ 坐标、切线等查询。两者都不修改输入几何。

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::{Polyline, PolylineVertex};
use crate::geometry::{Bounds2D, Point2, Vector2, normalize_angle};

/// 判定点是否落在路径上的默认容差（图纸单位）。
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

const MIN_SEGMENT_LENGTH: f64 = 1e-9;
const MIN_BULGE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PathError {
    #[error("path needs at least two distinct vertices")]
    EmptyPath,
    #[error("path vertex {index} is not finite")]
    NonFiniteVertex { index: usize },
    #[error("point ({x:.4}, {y:.4}) is {gap:.6} away from the path")]
    NotOnPath { x: f64, y: f64, gap: f64 },
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(&'static str),
}

/// 由顶点序列构成的路径，可带圆弧段。构造后不可变。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    vertices: Vec<PolylineVertex>,
    is_closed: bool,
}

impl Path {
    /// 构造路径：剔除零长度线段，少于两个有效顶点时返回 `EmptyPath`。
    pub fn new(
        vertices: impl IntoIterator<Item = PolylineVertex>,
        is_closed: bool,
    ) -> Result<Self, PathError> {
        let mut cleaned: Vec<PolylineVertex> = Vec::new();
        for (index, vertex) in vertices.into_iter().enumerate() {
            if !vertex.position.is_finite() || !vertex.bulge.is_finite() {
                return Err(PathError::NonFiniteVertex { index });
            }
            let duplicate = cleaned
                .last()
                .is_some_and(|last| last.position.distance(vertex.position) < MIN_SEGMENT_LENGTH);
            if !duplicate {
                cleaned.push(vertex);
            } else if let Some(last) = cleaned.last_mut() {
                // 重复顶点：保留位置，后续线段沿用被丢弃顶点的凸度
                last.bulge = vertex.bulge;
            }
        }

        if is_closed
            && cleaned.len() > 2
            && cleaned[cleaned.len() - 1].position.distance(cleaned[0].position)
                < MIN_SEGMENT_LENGTH
        {
            cleaned.pop();
        }

        if cleaned.len() < 2 {
            return Err(PathError::EmptyPath);
        }
        Ok(Self {
            vertices: cleaned,
            is_closed,
        })
    }

    /// 由直线段顶点构造开放路径。
    pub fn from_points(points: impl IntoIterator<Item = Point2>) -> Result<Self, PathError> {
        Self::new(points.into_iter().map(PolylineVertex::new), false)
    }

    #[inline]
    pub fn from_line(start: Point2, end: Point2) -> Result<Self, PathError> {
        Self::from_points([start, end])
    }

    #[inline]
    pub fn from_polyline(polyline: &Polyline) -> Result<Self, PathError> {
        Self::new(polyline.vertices.iter().copied(), polyline.is_closed)
    }

    #[inline]
    pub fn vertices(&self) -> &[PolylineVertex] {
        &self.vertices
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.is_closed
    }

    #[inline]
    pub fn start(&self) -> Point2 {
        self.vertices[0].position
    }

    /// 路径终点；闭合路径回到起点。
    pub fn end(&self) -> Point2 {
        if self.is_closed {
            self.start()
        } else {
            self.vertices[self.vertices.len() - 1].position
        }
    }

    /// 展开为线段序列，闭合路径包含收尾段。
    pub fn segments(&self) -> Vec<PathSegment> {
        let count = self.vertices.len();
        let segment_count = if self.is_closed { count } else { count - 1 };
        (0..segment_count)
            .map(|i| {
                let start = self.vertices[i];
                let end = self.vertices[(i + 1) % count];
                PathSegment::from_bulge(start.position, end.position, start.bulge)
            })
            .collect()
    }

    pub fn length(&self) -> f64 {
        self.segments().iter().map(PathSegment::length).sum()
    }

    pub fn bounds(&self) -> Bounds2D {
        let mut bounds = Bounds2D::empty();
        for segment in self.segments() {
            bounds.include_bounds(&segment.bounds());
        }
        bounds
    }

    /// 反转走向：顶点逆序，凸度随线段移位并取反。
    pub fn reversed(&self) -> Path {
        let count = self.vertices.len();
        let vertices = (0..count)
            .map(|k| {
                let position = self.vertices[count - 1 - k].position;
                let bulge = if !self.is_closed && k == count - 1 {
                    0.0
                } else {
                    -self.vertices[(2 * count - 2 - k) % count].bulge
                };
                PolylineVertex::with_bulge(position, bulge)
            })
            .collect();
        Path {
            vertices,
            is_closed: self.is_closed,
        }
    }

    /// 由线段序列重新拼装路径（首尾相接的线段共享顶点）。
    pub fn from_segments(segments: &[PathSegment], is_closed: bool) -> Result<Self, PathError> {
        let mut vertices: Vec<PolylineVertex> = segments
            .iter()
            .map(|segment| PolylineVertex::with_bulge(segment.start(), segment.bulge()))
            .collect();
        if !is_closed {
            if let Some(last) = segments.last() {
                vertices.push(PolylineVertex::new(last.end()));
            }
        }
        Self::new(vertices, is_closed)
    }

    pub fn to_polyline(&self, layer: impl Into<String>, line_type: impl Into<String>) -> Polyline {
        Polyline {
            vertices: self.vertices.clone(),
            is_closed: self.is_closed,
            layer: layer.into(),
            line_type: line_type.into(),
        }
    }
}

/// 路径上的单个线段：直线或圆弧。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSegment {
    Line {
        start: Point2,
        end: Point2,
    },
    /// `sweep` 为带符号圆心角，正值为逆时针。
    Arc {
        center: Point2,
        radius: f64,
        start_angle: f64,
        sweep: f64,
    },
}

impl PathSegment {
    /// 按 AutoCAD 多段线凸度约定构造线段。
    pub fn from_bulge(start: Point2, end: Point2, bulge: f64) -> Self {
        if bulge.abs() < MIN_BULGE {
            return PathSegment::Line { start, end };
        }
        let chord = start.vector_to(end);
        let chord_length = chord.length();
        let Some(direction) = chord.normalize() else {
            return PathSegment::Line { start, end };
        };
        let sweep = 4.0 * bulge.atan();
        let signed_radius = chord_length / (2.0 * (sweep / 2.0).sin());
        let center = start
            .midpoint(end)
            .translate(direction.perp().scale(signed_radius * (sweep / 2.0).cos()));
        let start_angle = center.vector_to(start).angle();
        PathSegment::Arc {
            center,
            radius: signed_radius.abs(),
            start_angle,
            sweep,
        }
    }

    pub fn start(&self) -> Point2 {
        match *self {
            PathSegment::Line { start, .. } => start,
            PathSegment::Arc {
                center,
                radius,
                start_angle,
                ..
            } => center.translate(Vector2::from_angle(start_angle).scale(radius)),
        }
    }

    pub fn end(&self) -> Point2 {
        match *self {
            PathSegment::Line { end, .. } => end,
            PathSegment::Arc {
                center,
                radius,
                start_angle,
                sweep,
            } => center.translate(Vector2::from_angle(start_angle + sweep).scale(radius)),
        }
    }

    pub fn length(&self) -> f64 {
        match *self {
            PathSegment::Line { start, end } => start.distance(end),
            PathSegment::Arc { radius, sweep, .. } => radius * sweep.abs(),
        }
    }

    pub fn bulge(&self) -> f64 {
        match *self {
            PathSegment::Line { .. } => 0.0,
            PathSegment::Arc { sweep, .. } => (sweep / 4.0).tan(),
        }
    }

    /// 线段内弧长 `s`（自动截断到 `[0, length]`）处的点。
    pub fn point_at(&self, s: f64) -> Point2 {
        let length = self.length();
        let t = if length > 0.0 {
            (s / length).clamp(0.0, 1.0)
        } else {
            0.0
        };
        match *self {
            PathSegment::Line { start, end } => {
                Point2::from_vec(start.as_vec2().lerp(end.as_vec2(), t))
            }
            PathSegment::Arc {
                center,
                radius,
                start_angle,
                sweep,
            } => center.translate(Vector2::from_angle(start_angle + sweep * t).scale(radius)),
        }
    }

    /// 弧长 `s` 处的单位切线（沿走向）。
    pub fn tangent_at(&self, s: f64) -> Result<Vector2, PathError> {
        match *self {
            PathSegment::Line { start, end } => start
                .vector_to(end)
                .normalize()
                .ok_or(PathError::DegenerateGeometry("zero-length line segment")),
            PathSegment::Arc {
                radius,
                start_angle,
                sweep,
                ..
            } => {
                if radius <= f64::EPSILON {
                    return Err(PathError::DegenerateGeometry("zero-radius arc segment"));
                }
                let t = (s / self.length()).clamp(0.0, 1.0);
                let radial = Vector2::from_angle(start_angle + sweep * t);
                let tangent = if sweep > 0.0 {
                    radial.perp()
                } else {
                    radial.perp().reversed()
                };
                Ok(tangent)
            }
        }
    }

    /// 求线段上距 `point` 最近的位置，返回 `(线段内弧长, 距离)`。
    pub fn project(&self, point: Point2) -> (f64, f64) {
        match *self {
            PathSegment::Line { start, end } => {
                let direction = start.vector_to(end);
                let length_squared = direction.length_squared();
                if length_squared <= f64::EPSILON {
                    return (0.0, start.distance(point));
                }
                let t = (direction.dot(start.vector_to(point)) / length_squared).clamp(0.0, 1.0);
                let foot = Point2::from_vec(start.as_vec2().lerp(end.as_vec2(), t));
                (t * length_squared.sqrt(), foot.distance(point))
            }
            PathSegment::Arc {
                center,
                radius,
                start_angle,
                sweep,
            } => {
                let radial = center.vector_to(point);
                let angle = radial.angle();
                let relative = if sweep > 0.0 {
                    normalize_angle(angle - start_angle)
                } else {
                    normalize_angle(start_angle - angle)
                };
                if relative <= sweep.abs() {
                    return (relative * radius, (radial.length() - radius).abs());
                }
                let to_start = self.start().distance(point);
                let to_end = self.end().distance(point);
                if to_start <= to_end {
                    (0.0, to_start)
                } else {
                    (self.length(), to_end)
                }
            }
        }
    }

    pub fn bounds(&self) -> Bounds2D {
        let mut bounds = Bounds2D::empty();
        bounds.include_point(self.start());
        bounds.include_point(self.end());
        if let PathSegment::Arc {
            center,
            radius,
            start_angle,
            sweep,
        } = *self
        {
            // 圆弧跨过的坐标轴方向也要计入
            for quadrant in 0..4 {
                let axis = quadrant as f64 * TAU / 4.0;
                let relative = if sweep > 0.0 {
                    normalize_angle(axis - start_angle)
                } else {
                    normalize_angle(start_angle - axis)
                };
                if relative <= sweep.abs() {
                    bounds.include_point(center.translate(Vector2::from_angle(axis).scale(radius)));
                }
            }
        }
        bounds
    }
}

/// 最近点查询结果。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPoint {
    /// 沿路径的累计弧长。
    pub distance: f64,
    /// 查询点到路径的距离。
    pub gap: f64,
    pub segment_index: usize,
    pub point: Point2,
}

/// 路径采样器：预先展开线段与累计弧长。
#[derive(Debug, Clone)]
pub struct PathSampler {
    path: Path,
    segments: Vec<PathSegment>,
    starts: Vec<f64>,
    length: f64,
    tolerance: f64,
    /// 路径范围外扩容差，用于快速排除远处的点。
    reach: Bounds2D,
}

impl PathSampler {
    pub fn new(path: Path) -> Self {
        let segments = path.segments();
        let mut starts = Vec::with_capacity(segments.len());
        let mut length = 0.0;
        for segment in &segments {
            starts.push(length);
            length += segment.length();
        }
        let reach = path.bounds().inflate(DEFAULT_TOLERANCE);
        Self {
            path,
            segments,
            starts,
            length,
            tolerance: DEFAULT_TOLERANCE,
            reach,
        }
    }

    /// 调整“点在路径上”的判定容差，非正值回退到默认容差。
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = if tolerance.is_finite() && tolerance > 0.0 {
            tolerance
        } else {
            DEFAULT_TOLERANCE
        };
        self.reach = self.path.bounds().inflate(self.tolerance);
        self
    }

    /// 点是否落在外扩容差后的路径范围内；范围外的点一定不在路径上。
    #[inline]
    pub fn reaches(&self, point: Point2) -> bool {
        self.reach.contains(point)
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.length
    }

    #[inline]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// 最近点；距离相同时取走向上靠前的线段。
    pub fn closest(&self, point: Point2) -> ClosestPoint {
        let mut best = ClosestPoint {
            distance: 0.0,
            gap: f64::INFINITY,
            segment_index: 0,
            point: self.path.start(),
        };
        for (index, segment) in self.segments.iter().enumerate() {
            let (local, gap) = segment.project(point);
            if gap < best.gap {
                best = ClosestPoint {
                    distance: self.starts[index] + local,
                    gap,
                    segment_index: index,
                    point: segment.point_at(local),
                };
            }
        }
        best
    }

    /// 点到路径起点的弧长；点不在路径上（超出容差）时返回 `NotOnPath`。
    pub fn distance_at(&self, point: Point2) -> Result<f64, PathError> {
        let closest = self.closest(point);
        if closest.gap > self.tolerance {
            return Err(PathError::NotOnPath {
                x: point.x(),
                y: point.y(),
                gap: closest.gap,
            });
        }
        Ok(closest.distance.clamp(0.0, self.length))
    }

    /// 给定弧长处的点，弧长截断到 `[0, length]`。
    pub fn point_at(&self, distance: f64) -> Point2 {
        let (index, local) = self.locate(distance);
        self.segments[index].point_at(local)
    }

    /// 给定弧长处的单位切线。顶点处取从该顶点出发的线段，终点取最后一段。
    pub fn tangent_at_distance(&self, distance: f64) -> Result<Vector2, PathError> {
        let (index, local) = self.locate(distance);
        self.segments[index].tangent_at(local)
    }

    /// 距 `point` 最近位置的单位切线。
    pub fn tangent_at(&self, point: Point2) -> Result<Vector2, PathError> {
        let closest = self.closest(point);
        self.tangent_at_distance(closest.distance)
    }

    fn locate(&self, distance: f64) -> (usize, f64) {
        let distance = if distance.is_nan() {
            0.0
        } else {
            distance.clamp(0.0, self.length)
        };
        let index = match self.starts.partition_point(|start| *start <= distance) {
            0 => 0,
            n => n - 1,
        };
        (index, distance - self.starts[index])
    }
}
