use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    AppEvent, Application, HeadlessSurface, HttpServerApi, LayerEvent, LayerManager,
    LayerOptions, PushChannel, ServerEventRouter, LAYER_CHANGE, NOTIFY, RENDER_TASKS,
};
use shared::domain::{CatalogKind, LayerId};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod presets;

use config::load_settings;
use presets::{parse_open, PRESETS};

#[derive(Parser, Debug)]
struct Args {
    /// Overrides the configured server base url.
    #[arg(long)]
    server_url: Option<String>,
    /// Panel to open, as `preset[:key=value,...]`. Repeatable; the last one is shown.
    #[arg(long = "open")]
    open: Vec<String>,
    #[arg(long)]
    list_presets: bool,
}

const HOME_MARKUP: &str = "<section class=\"home\"></section>";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = load_settings()?;
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter)),
        )
        .init();

    if args.list_presets {
        for preset in PRESETS {
            println!("{:<32} {:?}", preset.name, preset.source);
        }
        return Ok(());
    }

    let api = Arc::new(
        HttpServerApi::new(&settings.server_url)
            .with_context(|| format!("invalid server url '{}'", settings.server_url))?,
    );
    let home = LayerId::from(settings.home_layer.as_str());
    let surface = HeadlessSurface::new().with_prerendered(home.clone(), HOME_MARKUP);
    let mut layers = LayerManager::with_home(Box::new(surface), home.clone());
    layers.on(LAYER_CHANGE, |event: &LayerEvent| {
        if let LayerEvent::Changed { layer, fell_back } = event {
            info!(%layer, fell_back, "showing layer");
        }
        Ok(())
    });

    let mut app = Application::new_with_dependencies(
        layers,
        ServerEventRouter::standard(),
        api.clone(),
        api.clone(),
        api.clone(),
    );
    register_listeners(&mut app);

    app.open_layer(&LayerOptions::adopt(home), None)
        .context("failed to adopt the home layer")?;
    for raw in &args.open {
        let request = parse_open(raw)?;
        let preset = request.preset()?;
        let id = app
            .open_and_show(&preset.options(), request.params.clone())
            .with_context(|| format!("failed to open '{raw}'"))?;
        if let Some(params) = &request.params {
            for (key, value) in params {
                app.set_context(key.clone(), value.clone());
            }
        }
        info!(layer = %id, "opened panel");
    }

    for (key, value) in &settings.preferences {
        app.set_setting(key.clone(), value.clone());
    }
    app.bootstrap_catalog();
    app.sync_settings();

    let stream_url = api.endpoint(&settings.stream_path)?;
    let push = PushChannel::new(api.http_client(), stream_url)
        .with_reconnect_delay(settings.reconnect_delay())
        .spawn(app.inbox());

    app.run_until(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
        }
    })
    .await;
    push.abort();
    Ok(())
}

fn register_listeners(app: &mut Application) {
    app.on(RENDER_TASKS, |event: &AppEvent| {
        if let AppEvent::TasksChanged(tasks) = event {
            info!(count = tasks.len(), "task list");
            for task in tasks {
                info!(task = %task.id, name = %task.name, status = %task.status, "  task");
            }
        }
        Ok(())
    });
    for kind in CatalogKind::ALL {
        app.on(kind.render_event(), |event: &AppEvent| {
            if let AppEvent::CatalogChanged { kind, records } = event {
                let names: Vec<&str> = records.iter().filter_map(|record| record.name()).collect();
                info!(%kind, count = records.len(), names = ?names, "catalog");
            }
            Ok(())
        });
    }
    app.on(NOTIFY, |event: &AppEvent| {
        if let AppEvent::Notification(text) = event {
            info!(message = %text, "server update");
        }
        Ok(())
    });
}
