use std::collections::HashMap;

use runline_core::document::{BYLAYER, Entity, EntityId, Line, MText};
use runline_core::geometry::{Point2, Vector2};
use runline_core::path::{DEFAULT_TOLERANCE, Path, PathSampler};
use tracing::{debug, info, warn};

use crate::annotator::{
    IntervalOptions, PlacementRecord, ProximityCandidate, ProximityOptions, SpanOptions,
    interval_labels, proximity_labels, span_labels,
};
use crate::callout::{MatchlineOptions, matchline_callout, utility_text_callout};
use crate::errors::EngineError;
use crate::offset::{EdgeStyleRules, offset_batch};
use crate::orientation::flip_label;
use crate::scene::Scene;
use crate::width::WidthUnits;

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    pub fn new(name: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse;
}

/// 桩号文字与刻度线的默认参数。
#[derive(Debug, Clone, PartialEq)]
pub struct StationSettings {
    pub interval: f64,
    pub prefer_below: bool,
    pub text_height: f64,
    pub label_offset: f64,
    pub tick_half_length: f64,
    pub flip_distance: f64,
    pub text_style: String,
}

impl Default for StationSettings {
    fn default() -> Self {
        Self {
            interval: 100.0,
            prefer_below: false,
            text_height: 2.2,
            label_offset: 2.0,
            tick_half_length: 1.5,
            flip_distance: 4.2,
            text_style: "ROMANS".to_string(),
        }
    }
}

/// 块参照桩号的默认参数。
#[derive(Debug, Clone, PartialEq)]
pub struct ProximitySettings {
    pub fixed_offset: Vector2,
    pub reversed_offset: Vector2,
    pub label_offset: f64,
    pub text_height: f64,
    pub layer: String,
    pub tolerance: f64,
}

impl Default for ProximitySettings {
    fn default() -> Self {
        let options = ProximityOptions::default();
        Self {
            fixed_offset: options.fixed_offset,
            reversed_offset: options.reversed_offset,
            label_offset: options.label_offset,
            text_height: 2.0,
            layer: "NPLT".to_string(),
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OffsetSettings {
    pub units: WidthUnits,
    pub edges: EdgeStyleRules,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalloutSettings {
    pub matchline_offset: f64,
    pub matchline_text_height: f64,
    pub span_layer: String,
    pub span_text_height: f64,
}

impl Default for CalloutSettings {
    fn default() -> Self {
        Self {
            matchline_offset: MatchlineOptions::default().offset,
            matchline_text_height: 5.0,
            span_layer: "D-OH".to_string(),
            span_text_height: 2.2,
        }
    }
}

/// 命令的默认参数，由应用层从配置文件填充。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DraftingSettings {
    pub stations: StationSettings,
    pub proximity: ProximitySettings,
    pub offsets: OffsetSettings,
    pub callouts: CalloutSettings,
}

pub struct CommandContext<'a> {
    pub scene: &'a mut Scene,
    pub settings: &'a DraftingSettings,
}

impl<'a> CommandContext<'a> {
    pub fn new(scene: &'a mut Scene, settings: &'a DraftingSettings) -> Self {
        Self { scene, settings }
    }
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(StationCommand);
        bus.register(BlockStationCommand);
        bus.register(OffsetUtilityCommand);
        bus.register(SpanCommand);
        bus.register(MatchlineCommand);
        bus.register(FlipStationCommand);
        bus.register(UtilityTextCommand);
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if let Some(handler) = self.handlers.get(request.name.as_str()) {
            handler.execute(request, context)
        } else {
            CommandResponse::err(format!("未知命令: {}", request.name))
        }
    }

    /// 已注册命令名，按字母序。
    pub fn available_commands(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

/// `key=value` 形式的命令参数。
#[derive(Debug, Default)]
pub struct CommandArgs {
    values: HashMap<String, String>,
}

impl CommandArgs {
    /// 解析参数；键不区分大小写，不在 `allowed` 中的键视为错误。
    pub fn parse(args: &[String], allowed: &[&str]) -> Result<Self, EngineError> {
        let mut values = HashMap::new();
        for raw in args {
            let (key, value) = raw
                .split_once('=')
                .ok_or_else(|| EngineError::invalid_argument(raw.as_str(), "expected key=value"))?;
            let key = key.trim().to_ascii_lowercase();
            if !allowed.contains(&key.as_str()) {
                return Err(EngineError::invalid_argument(key, "unknown argument"));
            }
            values.insert(key, value.trim().to_string());
        }
        Ok(Self { values })
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn require(&self, name: &str) -> Result<&str, EngineError> {
        self.str(name)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| EngineError::invalid_argument(name, "missing value"))
    }

    pub fn f64_or(&self, name: &str, default: f64) -> Result<f64, EngineError> {
        match self.str(name) {
            None => Ok(default),
            Some(raw) => raw
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| EngineError::invalid_argument(name, format!("not a number: {raw}"))),
        }
    }

    pub fn bool_or(&self, name: &str, default: bool) -> Result<bool, EngineError> {
        match self.str(name).map(str::to_ascii_lowercase).as_deref() {
            None => Ok(default),
            Some("true" | "yes" | "y" | "1") => Ok(true),
            Some("false" | "no" | "n" | "0") => Ok(false),
            Some(other) => Err(EngineError::invalid_argument(
                name,
                format!("not a boolean: {other}"),
            )),
        }
    }

    /// `x,y` 形式的坐标。
    pub fn point(&self, name: &str) -> Result<Point2, EngineError> {
        let raw = self.require(name)?;
        let parsed = raw
            .split_once(',')
            .and_then(|(x, y)| Some((x.trim().parse::<f64>().ok()?, y.trim().parse::<f64>().ok()?)));
        match parsed {
            Some((x, y)) if x.is_finite() && y.is_finite() => Ok(Point2::new(x, y)),
            _ => Err(EngineError::invalid_argument(
                name,
                format!("expected x,y: {raw}"),
            )),
        }
    }
}

/// 命令执行过程中新建与跳过的对象计数。
#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    created: usize,
    skipped: usize,
}

impl Tally {
    fn report(self, command: &str) -> CommandResponse {
        info!(
            command,
            created = self.created,
            skipped = self.skipped,
            "命令执行完成"
        );
        CommandResponse::ok(format!(
            "{command}: 生成 {} 个对象，跳过 {} 个",
            self.created, self.skipped
        ))
    }
}

fn respond(command: &str, result: Result<Tally, EngineError>) -> CommandResponse {
    match result {
        Ok(tally) => tally.report(command),
        Err(err) => {
            warn!(command, error = %err, "命令执行失败");
            CommandResponse::err(format!("{command}: {err}"))
        }
    }
}

fn ensure_selection(scene: &Scene) -> Result<(), EngineError> {
    if scene.selection_len() == 0 {
        return Err(EngineError::invalid_argument("selection", "no entities selected"));
    }
    Ok(())
}

/// 选中集中可作为路径的实体（多段线、直线）。
struct PathSource {
    id: EntityId,
    path: Path,
    layer: String,
    line_type: String,
}

fn selected_paths(scene: &Scene, tally: &mut Tally) -> Vec<PathSource> {
    let mut sources = Vec::new();
    for id in scene.selection() {
        let (path, layer, line_type) = match scene.entity(id) {
            Some(Entity::Polyline(polyline)) => (
                Path::from_polyline(polyline),
                &polyline.layer,
                &polyline.line_type,
            ),
            Some(Entity::Line(line)) => (
                Path::from_line(line.start, line.end),
                &line.layer,
                &line.line_type,
            ),
            _ => {
                debug!(entity = id.get(), "实体不是路径，跳过");
                tally.skipped += 1;
                continue;
            }
        };
        match path {
            Ok(path) => sources.push(PathSource {
                id,
                path,
                layer: layer.clone(),
                line_type: line_type.clone(),
            }),
            Err(err) => {
                warn!(entity = id.get(), error = %err, "路径无效，跳过");
                tally.skipped += 1;
            }
        }
    }
    sources
}

fn selected_lines(scene: &Scene, tally: &mut Tally) -> Vec<(EntityId, Line)> {
    let mut lines = Vec::new();
    for id in scene.selection() {
        match scene.entity(id) {
            Some(Entity::Line(line)) => lines.push((id, line.clone())),
            _ => {
                debug!(entity = id.get(), "实体不是直线，跳过");
                tally.skipped += 1;
            }
        }
    }
    lines
}

fn label_mtext(record: &PlacementRecord, height: f64, layer: &str) -> MText {
    MText {
        insert: record.position,
        content: record.text.clone(),
        height,
        rotation: record.rotation,
        attachment: record.side.attachment(),
        style: None,
        background_fill: false,
        layer: layer.to_string(),
    }
}

struct StationCommand;

impl StationCommand {
    fn run(args: &[String], context: &mut CommandContext<'_>) -> Result<Tally, EngineError> {
        let args = CommandArgs::parse(args, &["interval", "side"])?;
        let defaults = &context.settings.stations;
        let prefer_below = match args.str("side").map(str::to_ascii_lowercase).as_deref() {
            None => defaults.prefer_below,
            Some("top") => false,
            Some("bottom") => true,
            Some(other) => {
                return Err(EngineError::invalid_argument(
                    "side",
                    format!("expected top or bottom: {other}"),
                ));
            }
        };
        let options = IntervalOptions {
            interval: args.f64_or("interval", defaults.interval)?,
            prefer_below,
            label_offset: defaults.label_offset,
            tick_half_length: defaults.tick_half_length,
        };
        if !options.interval.is_finite() || options.interval <= 0.0 {
            return Err(EngineError::InvalidInterval(options.interval));
        }
        ensure_selection(context.scene)?;

        let mut tally = Tally::default();
        for source in selected_paths(context.scene, &mut tally) {
            let sampler = PathSampler::new(source.path);
            let records = match interval_labels(&sampler, &options) {
                Ok(records) => records,
                Err(err) => {
                    warn!(entity = source.id.get(), error = %err, "路径无法生成桩号，跳过");
                    tally.skipped += 1;
                    continue;
                }
            };
            debug!(entity = source.id.get(), count = records.len(), "生成间距桩号");
            let document = context.scene.document_mut();
            for record in &records {
                let mut text = label_mtext(record, defaults.text_height, &source.layer);
                text.style = Some(defaults.text_style.clone());
                text.background_fill = true;
                document.add_mtext(text);
                if let Some(tick) = record.tick {
                    document.add_line(tick.start, tick.end, source.layer.as_str());
                }
                tally.created += 1;
            }
        }
        Ok(tally)
    }
}

impl CommandHandler for StationCommand {
    fn name(&self) -> &'static str {
        "station"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        respond(self.name(), Self::run(&request.args, context))
    }
}

struct BlockStationCommand;

impl BlockStationCommand {
    fn run(args: &[String], context: &mut CommandContext<'_>) -> Result<Tally, EngineError> {
        let args = CommandArgs::parse(args, &["rotate", "line"])?;
        let defaults = &context.settings.proximity;
        let options = ProximityOptions {
            rotate: args.bool_or("rotate", false)?,
            fixed_offset: defaults.fixed_offset,
            reversed_offset: defaults.reversed_offset,
            label_offset: defaults.label_offset,
            line_number: args.str("line").map(str::to_string),
        };
        ensure_selection(context.scene)?;

        let candidates: Vec<ProximityCandidate> = context
            .scene
            .document()
            .block_references()
            .map(|(id, reference)| ProximityCandidate {
                id: id.get(),
                position: reference.insert,
            })
            .collect();

        let mut tally = Tally::default();
        for source in selected_paths(context.scene, &mut tally) {
            let sampler = PathSampler::new(source.path).with_tolerance(defaults.tolerance);
            let labels = proximity_labels(&sampler, candidates.iter().copied(), &options);
            debug!(
                entity = source.id.get(),
                candidates = candidates.len(),
                labelled = labels.len(),
                "块参照桩号"
            );
            for label in &labels {
                context.scene.document_mut().add_mtext(label_mtext(
                    &label.record,
                    defaults.text_height,
                    &defaults.layer,
                ));
                tally.created += 1;
            }
        }
        Ok(tally)
    }
}

impl CommandHandler for BlockStationCommand {
    fn name(&self) -> &'static str {
        "block_station"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        respond(self.name(), Self::run(&request.args, context))
    }
}

struct OffsetUtilityCommand;

impl OffsetUtilityCommand {
    fn run(args: &[String], context: &mut CommandContext<'_>) -> Result<Tally, EngineError> {
        let args = CommandArgs::parse(args, &["units"])?;
        let defaults = &context.settings.offsets;
        let units = match args.str("units").map(str::to_ascii_lowercase).as_deref() {
            None => defaults.units,
            Some("inches" | "in") => WidthUnits::Inches,
            Some("units" | "drawing") => WidthUnits::DrawingUnits,
            Some(other) => {
                return Err(EngineError::invalid_argument(
                    "units",
                    format!("expected inches or units: {other}"),
                ));
            }
        };
        ensure_selection(context.scene)?;

        let mut tally = Tally::default();
        let sources = selected_paths(context.scene, &mut tally);
        let batch = offset_batch(
            sources
                .iter()
                .enumerate()
                .map(|(index, source)| (index, &source.path, source.line_type.as_str())),
            units,
        );
        tally.skipped += batch.skipped.len();

        let document = context.scene.document_mut();
        for (index, pair) in batch.pairs {
            let source = &sources[index];
            let style = defaults.edges.classify(&source.layer, pair.half_width);
            for edge in [&pair.outer, &pair.inner] {
                document.add_entity(Entity::Polyline(
                    edge.to_polyline(style.layer.as_str(), style.line_type.as_str()),
                ));
                tally.created += 1;
            }
            debug!(
                entity = source.id.get(),
                half_width = pair.half_width,
                layer = %style.layer,
                "生成管线边线"
            );
        }
        Ok(tally)
    }
}

impl CommandHandler for OffsetUtilityCommand {
    fn name(&self) -> &'static str {
        "offset_utility"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        respond(self.name(), Self::run(&request.args, context))
    }
}

struct SpanCommand;

impl SpanCommand {
    fn run(args: &[String], context: &mut CommandContext<'_>) -> Result<Tally, EngineError> {
        CommandArgs::parse(args, &[])?;
        let defaults = &context.settings.callouts;
        let options = SpanOptions {
            label_offset: context.settings.stations.label_offset,
        };
        ensure_selection(context.scene)?;

        let mut tally = Tally::default();
        for source in selected_paths(context.scene, &mut tally) {
            let sampler = PathSampler::new(source.path);
            for record in span_labels(&sampler, &options) {
                context.scene.document_mut().add_mtext(label_mtext(
                    &record,
                    defaults.span_text_height,
                    &defaults.span_layer,
                ));
                tally.created += 1;
            }
        }
        Ok(tally)
    }
}

impl CommandHandler for SpanCommand {
    fn name(&self) -> &'static str {
        "span"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        respond(self.name(), Self::run(&request.args, context))
    }
}

struct MatchlineCommand;

impl MatchlineCommand {
    fn run(args: &[String], context: &mut CommandContext<'_>) -> Result<Tally, EngineError> {
        let args = CommandArgs::parse(args, &["pick", "sheet"])?;
        let pick = args.point("pick")?;
        let sheet = args.require("sheet")?;
        let defaults = &context.settings.callouts;
        let options = MatchlineOptions {
            offset: defaults.matchline_offset,
        };
        ensure_selection(context.scene)?;

        let mut tally = Tally::default();
        for (id, line) in selected_lines(context.scene, &mut tally) {
            match matchline_callout(line.start, line.end, pick, sheet, &options) {
                Ok(record) => {
                    context.scene.document_mut().add_mtext(label_mtext(
                        &record,
                        defaults.matchline_text_height,
                        &line.layer,
                    ));
                    tally.created += 1;
                }
                Err(err) if err.is_recoverable() => {
                    debug!(entity = id.get(), error = %err, "跳过接线");
                    tally.skipped += 1;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(tally)
    }
}

impl CommandHandler for MatchlineCommand {
    fn name(&self) -> &'static str {
        "matchline"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        respond(self.name(), Self::run(&request.args, context))
    }
}

struct FlipStationCommand;

impl FlipStationCommand {
    fn run(args: &[String], context: &mut CommandContext<'_>) -> Result<Tally, EngineError> {
        let args = CommandArgs::parse(args, &["distance"])?;
        let distance = args.f64_or("distance", context.settings.stations.flip_distance)?;
        ensure_selection(context.scene)?;

        let mut tally = Tally::default();
        for id in context.scene.selected_ids() {
            let Some(Entity::MText(text)) = context.scene.document_mut().entity_mut(id) else {
                debug!(entity = id.get(), "实体不是多行文字，跳过");
                tally.skipped += 1;
                continue;
            };
            let (insert, side) = flip_label(text.insert, text.rotation, text.attachment, distance);
            text.insert = insert;
            text.attachment = side.attachment();
            tally.created += 1;
        }
        Ok(tally)
    }
}

impl CommandHandler for FlipStationCommand {
    fn name(&self) -> &'static str {
        "flip_station"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        respond(self.name(), Self::run(&request.args, context))
    }
}

struct UtilityTextCommand;

impl UtilityTextCommand {
    fn run(args: &[String], context: &mut CommandContext<'_>) -> Result<Tally, EngineError> {
        let args = CommandArgs::parse(args, &["height"])?;
        let height = args.f64_or("height", context.settings.stations.text_height)?;
        if height <= 0.0 {
            return Err(EngineError::invalid_argument("height", "must be positive"));
        }
        ensure_selection(context.scene)?;

        let mut tally = Tally::default();
        for (id, line) in selected_lines(context.scene, &mut tally) {
            let layout = match utility_text_callout(line.start, line.end, &line.line_type, height) {
                Ok(layout) => layout,
                Err(err) => {
                    debug!(entity = id.get(), error = %err, "跳过管线文字");
                    tally.skipped += 1;
                    continue;
                }
            };
            let document = context.scene.document_mut();
            document.add_mtext(label_mtext(&layout.record, height, &line.layer));
            tally.created += 1;

            // 在文字处断开原线，两段都改用图层线型。
            if let Some([first, second]) = layout.pieces {
                if let Some(Entity::Line(original)) = document.entity_mut(id) {
                    original.start = first.0;
                    original.end = first.1;
                    original.line_type = BYLAYER.to_string();
                }
                document.add_line_styled(second.0, second.1, line.layer.as_str(), BYLAYER);
                tally.created += 1;
            }
        }
        Ok(tally)
    }
}

impl CommandHandler for UtilityTextCommand {
    fn name(&self) -> &'static str {
        "utility_text"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        respond(self.name(), Self::run(&request.args, context))
    }
}
