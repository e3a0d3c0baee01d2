// ==========================================
// 后厨出餐引擎 - 命令行入口
// ==========================================
// 用途: 初始化数据、手工拆分订单、推进出餐项、查看看板
// 输出: JSON(便于脚本/看板调试)
// ==========================================

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use kitchen_fulfillment::api::{KitchenError, UrgencyTarget};
use kitchen_fulfillment::app::{get_default_db_path, AppState};
use kitchen_fulfillment::domain::PrepState;
use serde::Serialize;
use std::path::PathBuf;

/// 后厨出餐引擎命令行
#[derive(Parser)]
#[command(name = "kitchen-fulfillment")]
#[command(author, version, about = "后厨出餐引擎命令行")]
struct Cli {
    /// 数据库路径(默认: KITCHEN_DB_PATH 或用户数据目录)
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 从 CSV 导入工位
    ImportStations { csv: PathBuf },

    /// 从 CSV 导入产品-工位关联
    ImportAssignments { csv: PathBuf },

    /// 拆分已落库的订单(幂等)
    Decompose { order_id: String },

    /// 推进出餐项状态 (pending / in_progress / ready / delivered)
    Advance { item_id: String, state: String },

    /// 查询订单进度
    Progress { order_id: String },

    /// 查询紧急度
    Urgency {
        #[arg(value_enum)]
        kind: UrgencyKind,
        id: String,
    },

    /// 查询工位队列
    Queue { station_id: String },

    /// 启用中的工位
    Stations,

    /// 订单看板
    Orders,
}

#[derive(Clone, Copy, ValueEnum)]
enum UrgencyKind {
    Item,
    Order,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    kitchen_fulfillment::logging::init();

    let cli = Cli::parse();
    let db_path = cli.db.unwrap_or_else(get_default_db_path);
    tracing::info!("{} v{} 使用数据库: {}", kitchen_fulfillment::APP_NAME, kitchen_fulfillment::VERSION, db_path);

    let state = AppState::new(db_path)
        .await
        .map_err(anyhow::Error::msg)
        .context("无法初始化AppState")?;
    let api = state.kitchen_api.clone();

    match cli.command {
        Commands::ImportStations { csv } => {
            let summary = state
                .station_importer
                .import_file(&csv)
                .with_context(|| format!("导入工位失败: {}", csv.display()))?;
            api.refresh_stations()?;
            print_json(&summary)?;
        }
        Commands::ImportAssignments { csv } => {
            let summary = state
                .assignment_importer
                .import_file(&csv)
                .with_context(|| format!("导入产品-工位关联失败: {}", csv.display()))?;
            print_json(&summary)?;
        }
        Commands::Decompose { order_id } => {
            let items = api
                .decompose_order_by_id(&order_id)
                .with_context(|| format!("拆分订单失败: {}", order_id))?;
            print_json(&items)?;
        }
        Commands::Advance { item_id, state: target } => {
            let target: PrepState = target.parse().map_err(anyhow::Error::msg)?;
            match api.transition(&item_id, target) {
                Ok(item) => print_json(&item)?,
                Err(KitchenError::StaleTransition { current, requested, .. }) => {
                    // 已被其他工位推进,不算失败
                    print_json(&serde_json::json!({
                        "item_id": item_id,
                        "stale": true,
                        "current": current,
                        "requested": requested,
                    }))?;
                }
                Err(e) => return Err(e).with_context(|| format!("推进出餐项失败: {}", item_id)),
            }
        }
        Commands::Progress { order_id } => {
            print_json(&api.get_order_progress(&order_id)?)?;
        }
        Commands::Urgency { kind, id } => {
            let target = match kind {
                UrgencyKind::Item => UrgencyTarget::Item(id),
                UrgencyKind::Order => UrgencyTarget::Order(id),
            };
            print_json(&api.get_urgency(&target)?)?;
        }
        Commands::Queue { station_id } => {
            print_json(&api.get_station_queue(&station_id)?)?;
        }
        Commands::Stations => {
            print_json(&api.list_stations()?)?;
        }
        Commands::Orders => {
            print_json(&api.get_order_view()?)?;
        }
    }

    state.shutdown();
    Ok(())
}
