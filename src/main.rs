//! Chips Modules 命令行入口
//!
//! 对模块目录中的清单进行依赖分析，并执行生命周期操作。
//!
//! # 命令概览
//!
//! - `list` - 列出全部已知模块及其状态
//! - `status` - 查询单个模块状态
//! - `order` - 输出确定性的安装顺序
//! - `cycles` - 输出依赖环
//! - `impact` - 分析模块影响
//! - `hubs` - 识别枢纽模块
//! - `clusters` - 输出模块集群
//! - `install` / `enable` / `disable` / `remove` / `update` - 生命周期操作
//! - `check-config` - 验证配置文件
//! - `version` - 显示版本信息
//!
//! # 使用示例
//!
//! ```bash
//! # 分析 ./modules 下的模块
//! chips-modules --module-dir ./modules order
//!
//! # 安装并启用模块，状态持久化到 registry.json
//! chips-modules --module-dir ./modules --registry registry.json install auth
//! chips-modules --module-dir ./modules --registry registry.json enable auth
//!
//! # 检查配置文件
//! chips-modules check-config -c chips-modules.yaml
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};

use chips_modules::{
    CoreConfig, CoreError, LifecycleManager, Logger, LoggerConfig, ModuleManifest,
    ModuleRegistry, ModuleState, DEFAULT_ENV_PREFIX,
};

/// Chips Modules - 模块依赖解析与生命周期管理
#[derive(Parser, Debug)]
#[command(name = "chips-modules")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, global = true, default_value = "chips-modules.yaml")]
    config: PathBuf,

    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// 模块目录（可多次指定）
    #[arg(short = 'm', long = "module-dir", global = true)]
    module_dirs: Vec<PathBuf>,

    /// 注册表文件路径
    #[arg(short, long, global = true)]
    registry: Option<PathBuf>,

    /// 子命令
    #[command(subcommand)]
    command: Commands,
}

/// 子命令定义
#[derive(Subcommand, Debug)]
enum Commands {
    /// 列出全部已知模块及其状态
    List,

    /// 查询模块状态
    Status {
        /// 模块名
        name: String,
    },

    /// 输出安装顺序（依赖在前）
    Order,

    /// 输出依赖环
    Cycles,

    /// 分析模块影响
    Impact {
        /// 模块名
        name: String,
    },

    /// 识别枢纽模块
    Hubs {
        /// 直接被依赖数阈值（不指定则使用配置值）
        #[arg(short, long)]
        threshold: Option<usize>,
    },

    /// 输出模块集群
    Clusters,

    /// 安装模块
    Install {
        /// 模块名
        name: String,
        /// 跳过依赖与冲突检查
        #[arg(short, long)]
        force: bool,
    },

    /// 启用模块
    Enable {
        /// 模块名
        name: String,
        /// 跳过依赖与冲突检查
        #[arg(short, long)]
        force: bool,
    },

    /// 禁用模块
    Disable {
        /// 模块名
        name: String,
        /// 跳过反向依赖检查
        #[arg(short, long)]
        force: bool,
    },

    /// 移除模块
    Remove {
        /// 模块名
        name: String,
        /// 跳过反向依赖检查
        #[arg(short, long)]
        force: bool,
    },

    /// 使用新清单更新模块
    Update {
        /// 模块名
        name: String,
        /// 新清单文件路径
        #[arg(long)]
        manifest: PathBuf,
    },

    /// 验证配置文件
    CheckConfig,

    /// 显示版本信息
    Version,
}

/// `list` 命令的输出行
#[derive(Debug, Serialize)]
struct ModuleRow {
    name: String,
    version: String,
    state: ModuleState,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("错误: {:#}", e);
            match e.downcast_ref::<CoreError>() {
                Some(core) if core.is_policy_violation() => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Version => {
            print_version();
            return Ok(());
        }
        Commands::CheckConfig => {
            let config = CoreConfig::from_file(&cli.config).await?;
            println!("配置文件有效: {}", cli.config.display());
            print_json(&config)?;
            return Ok(());
        }
        _ => {}
    }

    let config = load_config(&cli).await?;
    let _log_guard = Logger::try_init(LoggerConfig::from_log_config(&config.logging));
    debug!(config = ?config, "配置已加载");

    let registry = ModuleRegistry::from_config(&config);
    let loaded = registry.load().await?;
    info!(entries = loaded, "注册表已加载");

    let manager = LifecycleManager::from_config(registry, &config);

    match cli.command {
        Commands::List => {
            let snapshot = manager.registry().snapshot().await?;
            let rows: Vec<ModuleRow> = snapshot
                .manifests
                .values()
                .map(|m| ModuleRow {
                    name: m.name.clone(),
                    version: m.version.clone(),
                    state: snapshot.state(&m.name),
                })
                .collect();
            print_json(&rows)?;
        }
        Commands::Status { name } => {
            print_json(&manager.status(&name).await?)?;
        }
        Commands::Order => {
            print_json(&manager.install_order().await?)?;
        }
        Commands::Cycles => {
            print_json(&manager.cycles().await?)?;
        }
        Commands::Impact { name } => {
            print_json(&manager.analyze(&name).await?)?;
        }
        Commands::Hubs { threshold } => {
            print_json(&manager.hubs(threshold).await?)?;
        }
        Commands::Clusters => {
            print_json(&manager.clusters().await?)?;
        }
        Commands::Install { name, force } => {
            manager.install(&name, force).await?;
            print_state(&manager, &name).await?;
        }
        Commands::Enable { name, force } => {
            manager.enable(&name, force).await?;
            print_state(&manager, &name).await?;
        }
        Commands::Disable { name, force } => {
            manager.disable(&name, force).await?;
            print_state(&manager, &name).await?;
        }
        Commands::Remove { name, force } => {
            manager.remove(&name, force).await?;
            print_state(&manager, &name).await?;
        }
        Commands::Update { name, manifest } => {
            let manifest = ModuleManifest::parse_file(&manifest).await?;
            manager.update(&name, manifest).await?;
            print_state(&manager, &name).await?;
        }
        Commands::CheckConfig | Commands::Version => {}
    }

    Ok(())
}

/// 加载配置
///
/// 优先级（低到高）：默认值 → 配置文件 → 环境变量 → 命令行参数。
async fn load_config(cli: &Cli) -> anyhow::Result<CoreConfig> {
    let mut config = if cli.config.exists() {
        CoreConfig::from_file(&cli.config).await?
    } else {
        CoreConfig::default()
    };

    config.apply_env(DEFAULT_ENV_PREFIX)?;

    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if !cli.module_dirs.is_empty() {
        config.modules.module_dirs = cli.module_dirs.clone();
    }
    if let Some(path) = &cli.registry {
        config.modules.registry_path = Some(path.clone());
    }

    config.validate()?;
    Ok(config)
}

async fn print_state(manager: &LifecycleManager, name: &str) -> anyhow::Result<()> {
    let state = manager.status(name).await?;
    println!("{}: {}", name, state);
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// 打印版本信息
fn print_version() {
    println!("Chips Modules - 模块依赖解析与生命周期管理");
    println!("  版本:     {}", chips_modules::VERSION);
    println!("  目标平台: {}", std::env::consts::ARCH);
    println!("  操作系统: {}", std::env::consts::OS);
}
