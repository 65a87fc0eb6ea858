use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dotenv::dotenv;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{error, info};

use rust_pullback::app_config::log::setup_logging;
use rust_pullback::app_config::AppConfig;
use rust_pullback::trading::indicator::{BreakGuard, PullbackConfig};
use rust_pullback::trading::model::market::candles::CandleFilter;
use rust_pullback::trading::services::{DashboardData, PullbackService};

/// 结构突破与回调检测
#[derive(Parser, Debug)]
#[command(name = "rust_pullback", version, about = "Structural break & pullback detection over OHLCV candles")]
struct Cli {
    /// K线文件（JSON 数组），每个文件独立检测
    #[arg(short, long = "input", required = true, num_args = 1..)]
    inputs: Vec<PathBuf>,

    /// 品种名，默认取文件名
    #[arg(long)]
    asset: Option<String>,

    /// 周期
    #[arg(long)]
    interval: Option<String>,

    /// 保留最近的K线数量
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u16).range(1..=1000))]
    limit: u16,

    /// 起始时间（毫秒）
    #[arg(long)]
    start_time: Option<i64>,

    /// 阈值（只透传到结果中）
    #[arg(long)]
    threshold: Option<f64>,

    /// 突破确认规则: strict | unguarded
    #[arg(long)]
    break_guard: Option<BreakGuard>,

    /// 不标记局部高低点
    #[arg(long)]
    no_pivots: bool,

    /// 输出文件，默认 stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long)]
    pretty: bool,
}

impl Cli {
    fn pullback_config(&self, base: &PullbackConfig) -> PullbackConfig {
        PullbackConfig {
            threshold: self.threshold.unwrap_or(base.threshold),
            break_guard: self.break_guard.unwrap_or(base.break_guard),
            mark_pivots: base.mark_pivots && !self.no_pivots,
        }
    }
}

fn asset_for(input: &Path, explicit: Option<&str>, fallback: &str) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| input.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| fallback.to_string())
}

// 读取单个输入并检测；读取失败也返回一份 success=false 的结果
async fn run_input(
    service: Arc<PullbackService>,
    input: PathBuf,
    filter: CandleFilter,
    asset: String,
    interval: String,
) -> anyhow::Result<DashboardData> {
    let candles = match PullbackService::load_candles(&input, &filter).await {
        Ok(candles) => candles,
        Err(e) => {
            error!("读取K线失败 {}: {}", input.display(), e);
            return Ok(DashboardData::failure(&asset, &interval, e));
        }
    };
    let data = tokio::task::spawn_blocking(move || {
        service.get_dashboard_data(&asset, &interval, &candles)
    })
    .await?;
    Ok(data)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let app_config = AppConfig::from_env()?;
    setup_logging(&app_config.log)?;

    let config = cli.pullback_config(&app_config.pullback);
    info!(
        "启动检测: inputs={}, threshold={}, guard={}, pivots={}, max_workers={}",
        cli.inputs.len(),
        config.threshold,
        config.break_guard,
        config.mark_pivots,
        app_config.max_workers
    );

    let service = Arc::new(PullbackService::new(config));
    let semaphore = Arc::new(Semaphore::new(app_config.max_workers));
    let filter = CandleFilter {
        start_time: cli.start_time,
        limit: cli.limit as usize,
    };
    let interval = cli
        .interval
        .clone()
        .unwrap_or_else(|| app_config.default_interval.clone());

    let mut tasks = Vec::with_capacity(cli.inputs.len());
    for input in cli.inputs.iter().cloned() {
        let asset = asset_for(&input, cli.asset.as_deref(), &app_config.default_asset);
        let interval = interval.clone();
        let service = Arc::clone(&service);
        let semaphore = Arc::clone(&semaphore);

        tasks.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await?;
            run_input(service, input, filter, asset, interval).await
        }));
    }

    let mut reports = Vec::with_capacity(tasks.len());
    for result in join_all(tasks).await {
        reports.push(result??);
    }

    let json = if cli.pretty {
        serde_json::to_string_pretty(&reports)?
    } else {
        serde_json::to_string(&reports)?
    };

    match &cli.output {
        Some(path) => {
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("结果已写入 {}", path.display());
        }
        None => println!("{}", json),
    }

    let failed = reports.iter().filter(|r| !r.success).count();
    if failed > 0 {
        error!("{} / {} 个输入检测失败", failed, reports.len());
    }
    Ok(())
}
