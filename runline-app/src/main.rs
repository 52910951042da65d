use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::Parser;
use runline_config::{AppConfig, ConfigError};
use runline_core::document::EntityId;
use runline_engine::command::{CommandBus, CommandContext, CommandRequest};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod document_io;
mod settings;

use document_io::DocumentSource;

/// 沿线桩号、图幅接线与管线偏移标注。
#[derive(Debug, Parser)]
#[command(name = "runline", version)]
struct Cli {
    /// 配置文件路径，缺省时读取 RUNLINE_CONFIG 或 ./config/default.toml。
    #[arg(long)]
    config: Option<PathBuf>,
    /// JSON 文档；缺省时使用内置示例。
    #[arg(long)]
    input: Option<PathBuf>,
    /// 执行命令后把文档写成 JSON。
    #[arg(long)]
    output: Option<PathBuf>,
    /// 列出可用命令。
    #[arg(long)]
    list: bool,
    /// 选中的实体 ID，可重复。
    #[arg(long = "select", value_name = "ID")]
    select: Vec<u64>,
    /// 命令名。
    command: Option<String>,
    /// 命令参数，形如 key=value。
    #[arg(value_name = "ARG=VALUE")]
    args: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    let (config, fallback) = load_configuration(cli.config.as_deref());
    init_logging(&config);
    if let Some(err) = fallback {
        warn_config_fallback(&err);
    }

    if let Err(err) = run(cli, &config) {
        error!(error = %err, "命令执行失败");
        eprintln!("错误: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli, config: &AppConfig) -> Result<()> {
    let bus = CommandBus::new();
    if cli.list {
        println!("支持的命令: {}", bus.available_commands().join(", "));
        return Ok(());
    }
    let Some(command) = cli.command else {
        bail!("需要指定命令，可用 --list 查看");
    };

    let (mut scene, source) = document_io::load_scene(cli.input.as_deref())?;
    let selection: Vec<EntityId> = match (&source, cli.select.is_empty()) {
        (DocumentSource::Demo(ids), true) => {
            let ids = document_io::demo_selection(&command, ids);
            info!(count = ids.len(), "使用演示选中集");
            ids
        }
        _ => cli.select.iter().copied().map(EntityId::new).collect(),
    };
    for id in selection {
        scene.select(id)?;
    }

    let settings = settings::drafting_settings(config);
    let request = CommandRequest::new(command, cli.args);
    let response = {
        let mut context = CommandContext::new(&mut scene, &settings);
        bus.dispatch(&request, &mut context)
    };
    let message = response.message.unwrap_or_default();
    if !response.success {
        bail!(message);
    }
    println!("{message}");
    println!("文档实体数: {}", scene.document().entities().count());

    if let Some(output) = cli.output.as_deref() {
        document_io::save_document(scene.document(), output)?;
    }
    Ok(())
}

/// 加载失败时返回内建默认值和失败原因；原因留到日志初始化之后再输出。
fn load_configuration(explicit: Option<&Path>) -> (AppConfig, Option<ConfigError>) {
    match AppConfig::load(explicit) {
        Ok(cfg) => (cfg, None),
        Err(err) => (AppConfig::default(), Some(err)),
    }
}

fn warn_config_fallback(err: &ConfigError) {
    match err {
        ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
            warn!(path = %path.display(), error = %err, "加载配置失败，使用内建默认值");
        }
        ConfigError::Context { .. } | ConfigError::Invalid { .. } => {
            warn!(error = %err, "加载配置失败，使用内建默认值");
        }
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
