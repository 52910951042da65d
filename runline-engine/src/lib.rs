pub mod annotator;
pub mod callout;
pub mod command;
pub mod offset;
pub mod orientation;
pub mod station;
pub mod width;

pub mod errors {
    use runline_core::path::PathError;
    use thiserror::Error;

    #[derive(Debug, Clone, PartialEq, Error)]
    pub enum EngineError {
        #[error(transparent)]
        Path(#[from] PathError),
        #[error("invalid offset width: {0}")]
        InvalidWidth(String),
        #[error("station value {0} is negative or not a number")]
        InvalidStationValue(f64),
        #[error("station interval {0} must be a positive finite number")]
        InvalidInterval(f64),
        #[error("entity with id {0} not found")]
        EntityNotFound(u64),
        #[error("invalid argument {name}: {reason}")]
        InvalidArgument { name: String, reason: String },
    }

    impl EngineError {
        pub fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
            EngineError::InvalidArgument {
                name: name.into(),
                reason: reason.into(),
            }
        }

        /// 单个对象失败、批处理可以跳过继续的错误。
        pub fn is_recoverable(&self) -> bool {
            matches!(
                self,
                EngineError::Path(PathError::NotOnPath { .. })
                    | EngineError::Path(PathError::DegenerateGeometry(_))
                    | EngineError::InvalidWidth(_)
            )
        }
    }
}

pub mod scene {
    use std::collections::BTreeSet;

    use runline_core::document::{Document, Entity, EntityId, PolylineVertex};
    use runline_core::geometry::Point2;
    use tracing::debug;

    use crate::errors::EngineError;

    /// 引擎层负责维护 `Document` 和运行时状态（选中集）。
    #[derive(Debug, Default)]
    pub struct Scene {
        document: Document,
        selected: BTreeSet<EntityId>,
    }

    #[derive(Debug, Clone, Copy)]
    pub struct DemoEntities {
        pub running_line: EntityId,
        pub utility: EntityId,
        pub aerial: EntityId,
        pub matchline: EntityId,
        pub gas_line: EntityId,
        pub blocks: [EntityId; 4],
    }

    impl Scene {
        pub fn new() -> Self {
            Self::default()
        }

        /// 使用现有文档初始化场景。
        pub fn with_document(document: Document) -> Self {
            let mut scene = Self::new();
            scene.load_document(document);
            scene
        }

        /// 替换当前文档并清空选中集。
        pub fn load_document(&mut self, document: Document) {
            self.document = document;
            self.selected.clear();
        }

        #[inline]
        pub fn selection_len(&self) -> usize {
            self.selected.len()
        }

        /// 选中指定实体。若实体不存在则返回错误。
        pub fn select(&mut self, id: EntityId) -> Result<(), EngineError> {
            if self.document.entity(id).is_none() {
                return Err(EngineError::EntityNotFound(id.get()));
            }
            self.selected.insert(id);
            Ok(())
        }

        #[inline]
        pub fn clear_selection(&mut self) {
            self.selected.clear();
        }

        /// 按实体 ID 升序返回选中集，命令输出因此是确定的。
        #[inline]
        pub fn selection(&self) -> impl Iterator<Item = EntityId> + '_ {
            self.selected.iter().copied()
        }

        /// 选中集快照，便于在遍历时修改文档。
        pub fn selected_ids(&self) -> Vec<EntityId> {
            self.selected.iter().copied().collect()
        }

        #[inline]
        pub fn document(&self) -> &Document {
            &self.document
        }

        #[inline]
        pub fn document_mut(&mut self) -> &mut Document {
            &mut self.document
        }

        pub fn entity(&self, id: EntityId) -> Option<&Entity> {
            self.document().entity(id)
        }

        /// 为 CLI / 快速验证填充一组示例实体，返回关键实体 ID。
        pub fn populate_demo(&mut self) -> DemoEntities {
            self.clear_selection();

            let running_line = self.document.add_polyline_with_vertices(
                [
                    PolylineVertex::new(Point2::new(0.0, 0.0)),
                    PolylineVertex::new(Point2::new(180.0, 0.0)),
                    PolylineVertex::with_bulge(Point2::new(240.0, 30.0), 0.25),
                    PolylineVertex::new(Point2::new(280.0, 90.0)),
                ],
                false,
                "C-ROAD-CNTR",
                "CONTINUOUS",
            );
            let utility = self.document.add_polyline_with_vertices(
                [
                    PolylineVertex::new(Point2::new(0.0, -20.0)),
                    PolylineVertex::new(Point2::new(150.0, -20.0)),
                    PolylineVertex::new(Point2::new(220.0, -60.0)),
                ],
                false,
                "WATER",
                "UTILITY12",
            );
            let aerial = self.document.add_polyline(
                [
                    Point2::new(0.0, 60.0),
                    Point2::new(120.4, 60.0),
                    Point2::new(230.0, 95.0),
                ],
                false,
                "D-OH",
            );
            let matchline =
                self.document
                    .add_line(Point2::new(300.0, -50.0), Point2::new(300.0, 150.0), "MATCH");
            let gas_line = self.document.add_line_styled(
                Point2::new(0.0, -40.0),
                Point2::new(100.0, -40.0),
                "GAS",
                "GAS04HP",
            );
            let blocks = [
                self.document
                    .add_block_reference("VALVE", Point2::new(35.0, 0.0), 0.0, "V-UTIL"),
                self.document
                    .add_block_reference("VALVE", Point2::new(120.0, 0.0), 0.0, "V-UTIL"),
                self.document
                    .add_block_reference("VALVE", Point2::new(90.0, 12.0), 0.0, "V-UTIL"),
                self.document
                    .add_block_reference("HYDRANT", Point2::new(180.0, 0.0), 0.0, "V-UTIL"),
            ];

            let ids = DemoEntities {
                running_line,
                utility,
                aerial,
                matchline,
                gas_line,
                blocks,
            };

            debug!(
                running_line = ids.running_line.get(),
                utility = ids.utility.get(),
                aerial = ids.aerial.get(),
                matchline = ids.matchline.get(),
                gas_line = ids.gas_line.get(),
                "已创建演示实体"
            );

            ids
        }
    }

}
