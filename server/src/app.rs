//! Process orchestration: CLI dispatch, config/logging bootstrap, and
//! assembling one run epoch's registry, brokers, updater, and IO adapters.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::broker::Broker;
use crate::client::Client;
use crate::core::cli::{self, CliConfig, Commands};
use crate::core::config::AppConfig;
use crate::core::{logging, supervisor};
use crate::io::{HttpPlugin, LoopPlugin, MqttInPlugin, MqttOutPlugin};
use crate::model::native::NativeAppLib;
use crate::model::AppLib;
use crate::registry::{AppRegistration, CommandRegistration, CompoundRegistration, Registration};
use crate::updater;

/// Entry point invoked by `main`: parses the CLI, loads configuration, and
/// dispatches to the subcommand that was asked for.
pub struct CoreApp;

impl CoreApp {
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        logging::init();

        let (cli_config, command) = cli::parse();

        match command {
            Commands::Run => Self::run_once(&cli_config).await,
            Commands::Serve => Self::serve(&cli_config).await,
            Commands::Post { topic, payload } => Self::post(&cli_config, &topic, &payload).await,
            Commands::Get { view } => Self::get(&cli_config, &view).await,
        }
    }

    async fn run_once(cli_config: &CliConfig) -> Result<()> {
        let config = AppConfig::load(cli_config, false)?;
        let token = watch_for_ctrl_c();
        run_epoch(token, config).await
    }

    async fn serve(cli_config: &CliConfig) -> Result<()> {
        let config = AppConfig::load(cli_config, true)?;
        let config_dir = config
            .app
            .config
            .parent()
            .map(std::path::Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let token = watch_for_ctrl_c();
        supervisor::run_with_reload(token, config_dir, move |epoch_token| {
            let config = config.clone();
            async move { run_epoch(epoch_token, config).await }
        })
        .await
    }

    async fn post(cli_config: &CliConfig, topic: &str, payload: &str) -> Result<()> {
        let config = AppConfig::load(cli_config, false)?;
        let client = Client::new(config.http.port);
        client.post(topic, payload).await?;
        Ok(())
    }

    async fn get(cli_config: &CliConfig, view: &str) -> Result<()> {
        let config = AppConfig::load(cli_config, false)?;
        let client = Client::new(config.http.port);
        let body = client.get(view).await?;
        println!("{body}");
        Ok(())
    }
}

/// Returns a token that is cancelled when the process receives Ctrl+C.
fn watch_for_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let watched = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received ctrl-c, shutting down");
            watched.cancel();
        }
    });
    token
}

/// Assembles and runs one epoch: a fresh registry, three brokers, the
/// updater, and whichever IO adapters are enabled. Returns once `token` is
/// cancelled and every spawned task has joined.
async fn run_epoch(token: CancellationToken, config: AppConfig) -> Result<()> {
    // No expression-language `AppLib` is wired in yet (out of scope), so the
    // epoch boots with an empty native app library; the broker, updater,
    // command, and IO pipeline are fully live regardless, which is what
    // makes this a runnable binary rather than a library fragment.
    let app_lib: Arc<dyn AppLib> = Arc::new(NativeAppLib::new(Default::default()));

    let registration = CompoundRegistration::new(vec![
        Arc::new(AppRegistration::new(app_lib)),
        Arc::new(CommandRegistration),
    ]);
    let registry = Arc::new(registration.register().await?);

    let source = Arc::new(Broker::new());
    let view = Arc::new(Broker::new());
    let sink = Arc::new(Broker::new());

    let tracker = TaskTracker::new();

    updater::spawn(
        registry.clone(),
        source.clone(),
        view.clone(),
        sink.clone(),
        &tracker,
        token.clone(),
    );

    LoopPlugin.start(token.clone(), &tracker, source.clone(), sink.clone());

    if config.mqtt.enabled {
        MqttInPlugin::new(config.mqtt.clone()).start(
            token.clone(),
            &tracker,
            registry.clone(),
            source.clone(),
        );
        MqttOutPlugin::new(config.mqtt.clone()).start(token.clone(), &tracker, sink.clone());
    }

    if config.http.enabled {
        HttpPlugin::new(config.http.port).start(
            token.clone(),
            &tracker,
            registry.clone(),
            source.clone(),
            view.clone(),
            sink.clone(),
        );
    }

    tracker.close();
    tracker.wait().await;
    Ok(())
}
