pub mod path;

pub mod geometry {
    use std::f64::consts::TAU;

    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示，所有计算都在 XY 工作平面内完成。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        #[inline]
        pub fn distance(self, other: Point2) -> f64 {
            self.0.distance(other.0)
        }

        #[inline]
        pub fn midpoint(self, other: Point2) -> Point2 {
            Self((self.0 + other.0) * 0.5)
        }

        #[inline]
        pub fn is_finite(self) -> bool {
            self.0.is_finite()
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量。切线、法线与标注偏移都用它表达。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        /// 由极角构造单位向量。
        #[inline]
        pub fn from_angle(angle: f64) -> Self {
            Self(DVec2::new(angle.cos(), angle.sin()))
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        /// 归一化；长度过小时返回 `None`，调用方据此判定退化几何。
        #[inline]
        pub fn normalize(self) -> Option<Self> {
            let len = self.0.length();
            if !len.is_finite() || len <= f64::EPSILON {
                None
            } else {
                Some(Self(self.0 / len))
            }
        }

        /// 逆时针旋转 90°（左法线）。
        #[inline]
        pub fn perp(self) -> Self {
            Self(self.0.perp())
        }

        #[inline]
        pub fn scale(self, factor: f64) -> Self {
            Self(self.0 * factor)
        }

        #[inline]
        pub fn reversed(self) -> Self {
            Self(-self.0)
        }

        #[inline]
        pub fn dot(self, other: Vector2) -> f64 {
            self.0.dot(other.0)
        }

        /// 二维叉积（z 分量），正值表示 `other` 位于左侧。
        #[inline]
        pub fn cross(self, other: Vector2) -> f64 {
            self.0.perp_dot(other.0)
        }

        /// 方向角，归一化到 `[0, 2π)`。
        #[inline]
        pub fn angle(self) -> f64 {
            normalize_angle(self.0.y.atan2(self.0.x))
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 将任意角度折算到 `[0, 2π)`。
    ///
    /// `rem_euclid` 对极小的负数会返回 `2π` 本身，这里统一收敛为 0。
    #[inline]
    pub fn normalize_angle(angle: f64) -> f64 {
        let wrapped = angle.rem_euclid(TAU);
        if wrapped >= TAU { 0.0 } else { wrapped }
    }

    /// 轴对齐边界框，用于路径范围估算与邻近筛选。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        /// 向四周扩张 `margin`，空边界框保持为空。
        pub fn inflate(&self, margin: f64) -> Bounds2D {
            if self.is_empty() {
                return *self;
            }
            let delta = DVec2::splat(margin);
            Bounds2D::new(
                Point2::from_vec(self.min.as_vec2() - delta),
                Point2::from_vec(self.max.as_vec2() + delta),
            )
        }

        #[inline]
        pub fn contains(&self, point: Point2) -> bool {
            !self.is_empty()
                && point.x() >= self.min.x()
                && point.x() <= self.max.x()
                && point.y() >= self.min.y()
                && point.y() <= self.max.y()
        }
    }
}

pub mod document {
    use std::collections::HashMap;

    use serde::{Deserialize, Serialize};

    use crate::geometry::Point2;

    /// 未显式指定线型时沿用图层线型。
    pub const BYLAYER: &str = "BYLAYER";

    fn default_line_type() -> String {
        BYLAYER.to_string()
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    pub struct EntityId(u64);

    impl EntityId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于序列化或日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Layer {
        pub name: String,
        pub is_visible: bool,
    }

    impl Layer {
        #[inline]
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                is_visible: true,
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub enum Entity {
        Line(Line),
        Polyline(Polyline),
        MText(MText),
        BlockReference(BlockReference),
    }

    impl Entity {
        #[inline]
        pub fn layer_name(&self) -> &str {
            match self {
                Entity::Line(line) => &line.layer,
                Entity::Polyline(polyline) => &polyline.layer,
                Entity::MText(mtext) => &mtext.layer,
                Entity::BlockReference(reference) => &reference.layer,
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point2,
        pub end: Point2,
        pub layer: String,
        #[serde(default = "default_line_type")]
        pub line_type: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Polyline {
        pub vertices: Vec<PolylineVertex>,
        pub is_closed: bool,
        pub layer: String,
        #[serde(default = "default_line_type")]
        pub line_type: String,
    }

    /// 多段线顶点；`bulge` 描述从该顶点出发那一段的圆弧（tan(圆心角/4)，正值为逆时针）。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct PolylineVertex {
        pub position: Point2,
        #[serde(default)]
        pub bulge: f64,
    }

    impl PolylineVertex {
        #[inline]
        pub fn new(position: Point2) -> Self {
            Self {
                position,
                bulge: 0.0,
            }
        }

        #[inline]
        pub fn with_bulge(position: Point2, bulge: f64) -> Self {
            Self { position, bulge }
        }
    }

    /// 多行文字的对齐方式，只保留标注命令用到的三种。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum AttachmentPoint {
        TopCenter,
        MiddleCenter,
        BottomCenter,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct MText {
        pub insert: Point2,
        pub content: String,
        pub height: f64,
        pub rotation: f64,
        pub attachment: AttachmentPoint,
        pub style: Option<String>,
        #[serde(default)]
        pub background_fill: bool,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct BlockReference {
        pub name: String,
        pub insert: Point2,
        pub rotation: f64,
        pub layer: String,
    }

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    pub struct Document {
        layers: HashMap<String, Layer>,
        entities: Vec<(EntityId, Entity)>,
        next_entity_id: u64,
    }

    impl Document {
        pub fn new() -> Self {
            let mut doc = Self::default();
            doc.ensure_layer("0");
            doc
        }

        pub fn ensure_layer(&mut self, name: impl AsRef<str>) {
            let key = name.as_ref();
            self.layers
                .entry(key.to_string())
                .or_insert_with(|| Layer::new(key));
        }

        pub fn add_line(
            &mut self,
            start: Point2,
            end: Point2,
            layer: impl Into<String>,
        ) -> EntityId {
            self.add_line_styled(start, end, layer, BYLAYER)
        }

        pub fn add_line_styled(
            &mut self,
            start: Point2,
            end: Point2,
            layer: impl Into<String>,
            line_type: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let id = self.next_id();
            self.entities.push((
                id,
                Entity::Line(Line {
                    start,
                    end,
                    layer,
                    line_type: line_type.into(),
                }),
            ));
            id
        }

        pub fn add_polyline<I>(
            &mut self,
            vertices: I,
            is_closed: bool,
            layer: impl Into<String>,
        ) -> EntityId
        where
            I: IntoIterator<Item = Point2>,
        {
            let collected = vertices
                .into_iter()
                .map(PolylineVertex::new)
                .collect::<Vec<_>>();
            self.add_polyline_with_vertices(collected, is_closed, layer, BYLAYER)
        }

        pub fn add_polyline_with_vertices<I>(
            &mut self,
            vertices: I,
            is_closed: bool,
            layer: impl Into<String>,
            line_type: impl Into<String>,
        ) -> EntityId
        where
            I: IntoIterator<Item = PolylineVertex>,
        {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let collected: Vec<PolylineVertex> = vertices.into_iter().collect();
            let id = self.next_id();
            self.entities.push((
                id,
                Entity::Polyline(Polyline {
                    vertices: collected,
                    is_closed,
                    layer,
                    line_type: line_type.into(),
                }),
            ));
            id
        }

        pub fn add_mtext(&mut self, mtext: MText) -> EntityId {
            self.ensure_layer(&mtext.layer);
            let id = self.next_id();
            self.entities.push((id, Entity::MText(mtext)));
            id
        }

        pub fn add_block_reference(
            &mut self,
            name: impl Into<String>,
            insert: Point2,
            rotation: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let id = self.next_id();
            self.entities.push((
                id,
                Entity::BlockReference(BlockReference {
                    name: name.into(),
                    insert,
                    rotation,
                    layer,
                }),
            ));
            id
        }

        pub fn add_entity(&mut self, entity: Entity) -> EntityId {
            self.ensure_layer(entity.layer_name());
            let id = self.next_id();
            self.entities.push((id, entity));
            id
        }

        #[inline]
        pub fn layers(&self) -> impl Iterator<Item = &Layer> {
            self.layers.values()
        }

        #[inline]
        pub fn entities(&self) -> impl Iterator<Item = &(EntityId, Entity)> {
            self.entities.iter()
        }

        /// 按插入顺序列出全部块参照。
        pub fn block_references(&self) -> impl Iterator<Item = (EntityId, &BlockReference)> {
            self.entities.iter().filter_map(|(id, entity)| match entity {
                Entity::BlockReference(reference) => Some((*id, reference)),
                _ => None,
            })
        }

        #[inline]
        pub fn entity(&self, id: EntityId) -> Option<&Entity> {
            self.entities
                .iter()
                .find_map(|(entity_id, entity)| (*entity_id == id).then_some(entity))
        }

        #[inline]
        pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
            self.entities
                .iter_mut()
                .find_map(|(entity_id, entity)| (*entity_id == id).then_some(entity))
        }

        fn next_id(&mut self) -> EntityId {
            let id = EntityId::new(self.next_entity_id);
            self.next_entity_id += 1;
            id
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::geometry::{Bounds2D, Point2, Vector2, normalize_angle};
        use std::f64::consts::{FRAC_PI_2, PI, TAU};

        #[test]
        fn document_stores_entities() {
            let mut doc = Document::new();
            let line_id = doc.add_line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), "0");
            let polyline_id = doc.add_polyline(
                [
                    Point2::new(0.0, 0.0),
                    Point2::new(2.0, 2.0),
                    Point2::new(4.0, 0.0),
                ],
                false,
                "RUNNING",
            );
            let block_id = doc.add_block_reference("PP", Point2::new(2.0, 2.0), 0.0, "POLES");
            let text_id = doc.add_mtext(MText {
                insert: Point2::new(1.0, 1.0),
                content: "1+00".to_string(),
                height: 2.2,
                rotation: 0.0,
                attachment: AttachmentPoint::BottomCenter,
                style: Some("ROMANS".to_string()),
                background_fill: true,
                layer: "ANNOT".to_string(),
            });

            assert_eq!(line_id.get(), 0);
            assert_eq!(polyline_id.get(), 1);
            assert_eq!(block_id.get(), 2);
            assert_eq!(text_id.get(), 3);
            assert_eq!(doc.entities().count(), 4);

            let layers: Vec<_> = doc.layers().map(|l| l.name.clone()).collect();
            for expected in ["0", "RUNNING", "POLES", "ANNOT"] {
                assert!(layers.contains(&expected.to_string()));
            }

            match doc.entity(line_id) {
                Some(Entity::Line(line)) => assert_eq!(line.line_type, BYLAYER),
                other => panic!("unexpected entity lookup result: {other:?}"),
            }

            let blocks: Vec<_> = doc.block_references().collect();
            assert_eq!(blocks.len(), 1);
            assert_eq!(blocks[0].0, block_id);
            assert_eq!(blocks[0].1.name, "PP");
        }

        #[test]
        fn entity_mut_allows_in_place_edit() {
            let mut doc = Document::new();
            let id = doc.add_line_styled(
                Point2::new(0.0, 0.0),
                Point2::new(0.0, 5.0),
                "UTIL",
                "GAS4",
            );
            if let Some(Entity::Line(line)) = doc.entity_mut(id) {
                line.end = Point2::new(0.0, 2.5);
            }
            match doc.entity(id) {
                Some(Entity::Line(line)) => {
                    assert_eq!(line.line_type, "GAS4");
                    assert!((line.end.y() - 2.5).abs() < f64::EPSILON);
                }
                _ => panic!("expected line entity"),
            }
            assert!(doc.entity_mut(EntityId::new(42)).is_none());
        }

        #[test]
        fn document_round_trips_through_json() {
            let mut doc = Document::new();
            doc.add_polyline_with_vertices(
                [
                    PolylineVertex::with_bulge(Point2::new(0.0, 0.0), 1.0),
                    PolylineVertex::new(Point2::new(10.0, 0.0)),
                ],
                false,
                "UTIL",
                "WATER8",
            );
            let json = serde_json::to_string(&doc).expect("serialize document");
            let restored: Document = serde_json::from_str(&json).expect("deserialize document");
            match restored.entities().next() {
                Some((_, Entity::Polyline(polyline))) => {
                    assert_eq!(polyline.line_type, "WATER8");
                    assert!((polyline.vertices[0].bulge - 1.0).abs() < f64::EPSILON);
                }
                other => panic!("unexpected entity: {other:?}"),
            }
        }

        #[test]
        fn angles_are_normalized_into_full_turn() {
            assert!((normalize_angle(-FRAC_PI_2) - 3.0 * FRAC_PI_2).abs() < 1e-12);
            assert_eq!(normalize_angle(TAU), 0.0);
            assert_eq!(normalize_angle(-1e-18), 0.0);
            assert!((Vector2::new(-1.0, 0.0).angle() - PI).abs() < 1e-12);
            assert!((Vector2::new(0.0, -1.0).angle() - 3.0 * FRAC_PI_2).abs() < 1e-12);
        }

        #[test]
        fn bounds_inflate_and_contains() {
            let mut bounds = Bounds2D::empty();
            assert!(!bounds.contains(Point2::new(0.0, 0.0)));
            bounds.include_point(Point2::new(0.0, 0.0));
            bounds.include_point(Point2::new(4.0, 2.0));
            let grown = bounds.inflate(1.0);
            assert!(grown.contains(Point2::new(-0.5, 2.5)));
            assert!(!bounds.contains(Point2::new(-0.5, 2.5)));
            assert!(Bounds2D::empty().inflate(5.0).is_empty());
        }
    }
}
