use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};
use runline_core::document::{Document, EntityId};
use runline_engine::scene::{DemoEntities, Scene};
use tracing::info;

/// 场景来源：JSON 文档或内置示例。
pub enum DocumentSource {
    Json,
    Demo(DemoEntities),
}

pub fn load_scene(input: Option<&Path>) -> Result<(Scene, DocumentSource)> {
    match input {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("无法打开文档 {}", path.display()))?;
            let document: Document = serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("无法解析文档 {}", path.display()))?;
            info!(
                path = %path.display(),
                entities = document.entities().count(),
                "已加载 JSON 文档"
            );
            Ok((Scene::with_document(document), DocumentSource::Json))
        }
        None => {
            let mut scene = Scene::new();
            let ids = scene.populate_demo();
            Ok((scene, DocumentSource::Demo(ids)))
        }
    }
}

pub fn save_document(document: &Document, output: &Path) -> Result<()> {
    let file = File::create(output)
        .with_context(|| format!("无法创建输出文件 {}", output.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), document)
        .with_context(|| format!("无法写入输出文件 {}", output.display()))?;
    info!(path = %output.display(), "已写出文档");
    Ok(())
}

/// 未指定 `--select` 时，演示文档按命令选中对应的示例实体。
pub fn demo_selection(command: &str, ids: &DemoEntities) -> Vec<EntityId> {
    match command {
        "station" | "block_station" => vec![ids.running_line],
        "offset_utility" => vec![ids.utility],
        "span" => vec![ids.aerial],
        "matchline" => vec![ids.matchline],
        "utility_text" => vec![ids.gas_line],
        _ => Vec::new(),
    }
}
