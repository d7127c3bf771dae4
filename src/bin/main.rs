use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::time::Duration;
use tracing::{info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use layered_cache::config::{self, ApplicationConfig, LogConfig};
use layered_cache::redis::ConnectionPool;
use layered_cache::serializer::ConfiguredSerializer;
use layered_cache::{
    CacheBuilder, CacheError, CallContext, GetOptions, Layer, LayeredCache, MokaStore, RedisStore,
    SetOptions,
};

/// 分層快取命令行工具
#[derive(Parser, Debug)]
#[command(name = "layered_cache", version, about = "兩層快取的命令行工具")]
struct Cli {
    /// 每個命令的逾時（毫秒）
    #[arg(long, global = true, default_value_t = 5_000)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 讀取字串值
    Get { key: String },
    /// 寫入字串值
    Set {
        key: String,
        value: String,
        /// 內存層 TTL（秒）
        #[arg(long)]
        memory_ttl: Option<u64>,
        /// 遠端層 TTL（秒）
        #[arg(long)]
        remote_ttl: Option<u64>,
    },
    /// 從兩層刪除
    Delete { key: String },
    /// 查詢剩餘存活時間
    Ttl {
        key: String,
        #[arg(long, value_enum, default_value_t = LayerArg::Remote)]
        layer: LayerArg,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LayerArg {
    Memory,
    Remote,
}

impl From<LayerArg> for Layer {
    fn from(arg: LayerArg) -> Self {
        match arg {
            LayerArg::Memory => Layer::Memory,
            LayerArg::Remote => Layer::Remote,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let app_config = config::init_config()?;
    let _log_guard = init_logging(&app_config.log)?;

    let cache = build_cache(app_config)?;
    let ctx = CallContext::background().with_timeout(Duration::from_millis(cli.timeout_ms));

    match cli.command {
        Command::Get { key } => match cache.get::<String>(&ctx, &key, GetOptions::new()).await {
            Ok(value) => println!("{}", value),
            Err(CacheError::NotFound) => println!("(不存在)"),
            Err(e) => return Err(e).context(format!("讀取 {} 失敗", key)),
        },
        Command::Set {
            key,
            value,
            memory_ttl,
            remote_ttl,
        } => {
            let mut opts = SetOptions::new();
            if let Some(secs) = memory_ttl {
                opts = opts.memory_ttl(Duration::from_secs(secs));
            }
            if let Some(secs) = remote_ttl {
                opts = opts.remote_ttl(Duration::from_secs(secs));
            }
            cache
                .set(&ctx, &key, &value, opts)
                .await
                .with_context(|| format!("寫入 {} 失敗", key))?;
            println!("OK");
        }
        Command::Delete { key } => {
            cache
                .delete(&ctx, &key)
                .await
                .with_context(|| format!("刪除 {} 失敗", key))?;
            println!("OK");
        }
        Command::Ttl { key, layer } => match cache.ttl(&ctx, &key, layer.into()).await {
            Ok(Some(ttl)) => println!("{:?}", ttl),
            Ok(None) => println!("(永不過期)"),
            Err(CacheError::NotFound) => println!("(不存在)"),
            Err(e) => return Err(e).context(format!("查詢 {} 的 TTL 失敗", key)),
        },
    }

    Ok(())
}

/// 依配置建立快取實例
fn build_cache(config: &ApplicationConfig) -> Result<LayeredCache<ConfiguredSerializer>> {
    let cache_config = &config.cache;
    let mut builder = CacheBuilder::from_config(cache_config);

    if cache_config.memory_enabled {
        builder = builder.memory(MokaStore::new(cache_config.memory_capacity_bytes)?);
    }

    if cache_config.remote_enabled {
        let pool = ConnectionPool::new(&config.redis)?;
        let mut store = RedisStore::new(pool);
        if let Some(namespace) = &cache_config.key_namespace {
            store = store.with_namespace(namespace.clone());
        }
        builder = builder.remote(store);
    }

    info!(
        serializer = cache_config.serializer.as_str(),
        "快取層配置完成"
    );
    Ok(builder.build()?)
}

fn init_logging(log_config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let level = match log_config.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO, // 默認為INFO
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let (writer, guard) = match &log_config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "layered_cache.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stdout), None),
    };

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(writer);

    let result = if log_config.format.eq_ignore_ascii_case("json") {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.map_err(|e| anyhow!("設置日誌系統失敗: {}", e))?;

    info!("日誌系統初始化完成");
    Ok(guard)
}
