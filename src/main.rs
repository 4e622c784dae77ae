//! 数据库网关主入口

use db_gateway::{
    auth::PasswordHasher,
    config::AppConfig,
    db,
    handlers::health,
    middleware::AppState,
    repository::{PgCredentialStore, PgStatementExecutor},
    routes, telemetry,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ===== CLI 参数处理 =====
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--version" => {
                println!("db-gateway {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_help();
                return Ok(());
            }
            "--hash-password" => {
                let password = args
                    .get(2)
                    .ok_or_else(|| anyhow::anyhow!("--hash-password requires a password argument"))?;
                let hash = PasswordHasher::new()
                    .hash(password)
                    .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
                println!("{}", hash);
                return Ok(());
            }
            _ => {
                eprintln!("未知参数: {}", args[1]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    // 加载 .env 文件（开发环境）
    // 生产环境应该直接设置环境变量，不依赖 .env 文件
    if let Ok(env) = std::env::var("GATEWAY_ENV") {
        dotenv::from_filename(format!(".env.{}", env)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::from_filename(".env.development").ok();
        dotenv::dotenv().ok();
    }

    health::set_start_time();

    // 1. 加载配置（缺少签名密钥时直接退出）
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    // 2. 初始化日志
    telemetry::init_telemetry(&config.logging);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "DB gateway starting...");

    // 3. 数据库连接池
    let db_pool = db::create_pool(&config.database).await?;

    // 4. 构建应用状态
    let app_state = Arc::new(AppState::new(
        &config,
        Arc::new(PgCredentialStore::new(db_pool.clone())),
        Arc::new(PgStatementExecutor::new(db_pool.clone())),
    )?);

    // 5. 构建路由
    let app = routes::create_router(app_state);

    // 6. 启动服务器
    let addr = &config.server.addr;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "Server listening");

    // 7. 优雅关闭
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.graceful_shutdown_timeout_secs))
        .await?;

    db_pool.close().await;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// 优雅关闭信号处理
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Terminate signal received, starting graceful shutdown");
        },
    }

    // 超时后强制退出
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(timeout_secs)).await;
        tracing::warn!("Graceful shutdown timeout reached, forcing exit");
        std::process::exit(1);
    });
}

/// 打印帮助信息
fn print_help() {
    println!("db-gateway {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("用法: db-gateway [选项]");
    println!();
    println!("选项:");
    println!("  --version                 打印版本信息并退出");
    println!("  --help                    打印此帮助信息并退出");
    println!("  --hash-password <密码>    输出 Argon2id 密码摘要并退出");
    println!();
    println!("环境变量:");
    println!("  GATEWAY_DATABASE__URL         数据库连接 URL（必填）");
    println!("  GATEWAY_SECURITY__JWT_SECRET  令牌签名密钥，至少 32 字符（必填）");
    println!("  GATEWAY_TABLES__ALLOWED       允许访问的表，格式 table:key_column,...");
    println!("  GATEWAY_TABLES__DATE_COLUMNS  日期列名，逗号分隔");
}
