use std::path::PathBuf;

use clap::Parser;
use course_server::{
    api::{self, AppState},
    config::Config,
    utils::init_log,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(Debug, Parser)]
struct Args {
    /// Path to a toml config file; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(short, long)]
    database: Option<PathBuf>,
    #[arg(short = 'H', long)]
    host: Option<String>,
    #[arg(short, long)]
    port: Option<u16>,
    /// Log directory; logs go to stdout when absent
    #[arg(short, long)]
    log: Option<PathBuf>,
    /// Enable the dev_login route (development only)
    #[arg(long)]
    dev_login: bool,
}

#[derive(OpenApi)]
#[openapi(paths(
    course_server::api::courses::list,
    course_server::api::courses::detail,
    course_server::api::courses::enroll,
    course_server::api::chapters::detail,
    course_server::api::chapters::progress,
    course_server::api::evaluations::questions,
    course_server::api::evaluations::submit,
    course_server::api::dev_login,
))]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _guard = init_log(args.log.clone());

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(database) = args.database {
        config.database = database;
    }
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    config.dev_login |= args.dev_login;

    let options = SqliteConnectOptions::new()
        .filename(&config.database)
        .create_if_missing(true)
        .foreign_keys(true);
    let database = SqlitePoolOptions::new().connect_with(options).await?;
    sqlx::migrate!().run(&database).await?;

    let state = AppState {
        db: database,
        dev_login: config.dev_login,
    };
    let app = api::router(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!("listening on http://{}", listener.local_addr()?);
    println!(
        "Swagger UI available at http://{}:{}/swagger-ui/",
        config.host, config.port
    );
    axum::serve(listener, app).await?;

    Ok(())
}
