//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize all subsystems in dependency order
//! - Start background tasks (message loop, liveness sweep)
//! - Open the demo tab when configured
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - The gateway is built last, once the interception point is running

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::RouterConfig;
use crate::consumer::ConsumerSession;
use crate::demo;
use crate::error::RouterResult;
use crate::http::{AppState, GatewayServer};
use crate::interception::{ClientHost, InterceptionPoint, Tab, TabHost};
use crate::lifecycle::shutdown::Shutdown;
use crate::transport::BroadcastBus;

/// Running router services.
pub struct Services {
    pub config: Arc<RouterConfig>,
    pub bus: BroadcastBus,
    pub host: Arc<TabHost>,
    pub point: Arc<InterceptionPoint>,
    pub shutdown: Shutdown,
    /// Demo consumer session and its tab, when enabled.
    pub demo: Option<(ConsumerSession, Tab)>,
    tasks: Vec<JoinHandle<()>>,
}

/// Bring up the bus, the interception point and the demo tab.
pub async fn start(config: RouterConfig) -> RouterResult<Services> {
    let config = Arc::new(config);
    let shutdown = Shutdown::new();

    let bus = BroadcastBus::new(config.interception.bus_capacity);
    let host = Arc::new(TabHost::new(Duration::from_secs(config.listener.client_idle_secs)));
    let point = InterceptionPoint::new(
        &bus,
        Arc::clone(&host) as Arc<dyn ClientHost>,
        config.interception.clone(),
    );
    let tasks = point.start(&shutdown);

    let demo = if config.demo.enabled {
        Some(demo::open_demo_tab(&config, &bus, &host, &point).await?)
    } else {
        None
    };

    tracing::info!(
        channel = %config.interception.channel_name,
        demo = config.demo.enabled,
        snapshot = ?config.interception.snapshot_path,
        "Services started"
    );

    Ok(Services {
        config,
        bus,
        host,
        point,
        shutdown,
        demo,
        tasks,
    })
}

impl Services {
    /// Gateway serving this router's interception point.
    pub fn gateway(&self) -> GatewayServer {
        GatewayServer::new(AppState::new(
            Arc::clone(&self.point),
            Arc::clone(&self.host),
            Arc::clone(&self.config),
        ))
    }

    /// Signal every background task and wait for them to finish.
    pub async fn stop(self) {
        self.shutdown.trigger();
        if let Some((session, _)) = &self.demo {
            session.close();
        }
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Background task ended abnormally");
            }
        }
        tracing::info!("Services stopped");
    }
}
