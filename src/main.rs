use std::net::SocketAddr;

use clap::Parser;
use shuati::{db::Db, services::token::TokenService, wechat::WechatApi, AppState, CorsPolicy};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// SQLite database URL.
    #[arg(long, env, default_value = "sqlite://shuati.db")]
    database_url: String,

    /// The address to bind to.
    #[arg(short, long, env, default_value = "0.0.0.0:8080")]
    address: String,

    /// Secret used to sign access tokens.
    #[arg(long, env, hide_env_values = true)]
    jwt_secret: String,

    /// Lifetime of issued tokens.
    #[arg(long, env, default_value_t = 24)]
    token_ttl_hours: i64,

    /// WeChat mini-program credentials. WeChat login is off without both.
    #[arg(long, env = "WX_APPID")]
    wx_appid: Option<String>,

    #[arg(long, env = "WX_SECRET", hide_env_values = true)]
    wx_secret: Option<String>,

    /// Comma-separated origins, or `*`. Localhost is always allowed.
    #[arg(long, env)]
    allowed_origins: Option<String>,

    /// Password of the `admin` account seeded on first start.
    #[arg(long, env, default_value = "123456", hide_env_values = true)]
    admin_password: String,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "axum=info,shuati=debug".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
        .init();

    let args = Args::parse();

    let db = Db::new(&args.database_url).await?;
    if db.ensure_default_admin(&args.admin_password).await? {
        tracing::warn!("seeded default admin account, change its password");
    }

    let wechat = WechatApi::from_credentials(args.wx_appid, args.wx_secret);
    if wechat.is_none() {
        tracing::info!("WeChat login disabled");
    }

    let tokens = TokenService::new(&args.jwt_secret, args.token_ttl_hours);
    let cors = CorsPolicy::parse(args.allowed_origins.as_deref());
    let app = shuati::router(AppState::new(db, tokens, wechat, cors));

    let address = args.address.parse::<SocketAddr>()?;
    let listener = tokio::net::TcpListener::bind(address).await?;
    tracing::info!("listening on {address}");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("could not listen for shutdown signal: {e}");
    }
}
