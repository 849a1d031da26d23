/// 数字卫兵 安防监控面板 (Security Monitoring Dashboard)
///
/// 系统架构:
/// 1. 摄像头线程: 取帧与模拟告警 (每路一个独立工作线程)
/// 2. 定时线程:   演示告警 (可取消)
/// 3. 主线程:     面板渲染 (macroquad事件循环 + egui)
use anyhow::Context;
use clap::Parser;
use macroquad::prelude::*;
use sentinel_rs::input::default_backend;
use sentinel_rs::renderer::Renderer;
use sentinel_rs::{ChannelSink, Monitor, MonitorCommands, SentinelConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// 监控面板参数
#[derive(Parser, Debug)]
#[command(author, version, about = "数字卫兵 - 安防监控面板", long_about = None)]
struct Args {
    /// 配置文件 (不存在时写出默认配置)
    #[arg(short, long, default_value = "sentinel.json")]
    config: PathBuf,

    /// 不自动开始演示
    #[arg(long)]
    no_demo: bool,

    /// 日志过滤 (RUST_LOG 优先)
    #[arg(long, default_value = "sentinel=info,sentinel_rs=info")]
    log: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = args.log.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = SentinelConfig::load(&args.config)
        .with_context(|| format!("加载配置失败: {}", args.config.display()))?;
    if args.no_demo {
        config.demo.enabled = false;
    }
    config.print_summary();

    tracing::info!("🚀 数字卫兵系统启动");

    let window = Conf {
        window_title: config.window.title.clone(),
        window_width: config.window.width,
        window_height: config.window.height,
        window_resizable: true,
        high_dpi: false,
        ..Default::default()
    };
    macroquad::Window::from_config(window, run(config));
    Ok(())
}

async fn run(config: SentinelConfig) {
    // 关闭窗口时先停止监控线程
    prevent_quit();

    let (sink, events) = ChannelSink::new();
    let monitor = Monitor::new(&config, Arc::new(sink), default_backend());
    monitor.enroll(&config.cameras);
    let devices = monitor.capture_backend().list_devices();

    let commands: Arc<dyn MonitorCommands> = Arc::new(monitor.clone());
    let mut renderer = Renderer::new(
        events,
        commands,
        &monitor.cameras(),
        &config.presets,
        &devices,
        monitor.confidence_threshold(),
    );

    monitor.schedule_demo();
    tracing::info!("✅ 系统就绪");

    loop {
        if is_quit_requested() || is_key_pressed(KeyCode::Escape) {
            break;
        }
        renderer.update();
        renderer.draw();
        next_frame().await;
    }

    monitor.shutdown();
}
