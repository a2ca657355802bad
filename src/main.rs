use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use rand::Rng;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use colony_sync_server::colony::permissions::Rank;
use colony_sync_server::colony::work_order::{self, BuildOrder, DecorationOrder, LoadSummary, WorkOrder, WorkOrderRegistry};
use colony_sync_server::colony::Colony;
use colony_sync_server::config::SyncConfig;
use colony_sync_server::metrics::{self, SyncMetrics};
use colony_sync_server::net::sink::ChannelSink;
use colony_sync_server::persist::TagCompound;
use colony_sync_server::sync::{ConnectedClient, SyncCoordinator, WorldSnapshot};
use colony_sync_server::util::vec3::{BlockPos, Vec3};

/// Work order sweep interval in ticks
const SWEEP_INTERVAL: u64 = 200;
const SIMULATED_VISITORS: usize = 8;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Colony Sync Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = SyncConfig::load_or_default();
    config.validate().map_err(anyhow::Error::msg)?;
    let radii = config.interest_radii();
    info!(
        "Configuration loaded: working_range={} (join {}, retain {}), tick_rate={}Hz",
        config.working_range, radii.join, radii.retain, config.tick_rate
    );

    // Registry must be in place before anything is loaded
    let registry = work_order::registry::install(WorkOrderRegistry::with_builtin_kinds()?)?;
    info!("Work order kinds: {:?}", registry.names());

    let metrics = Arc::new(SyncMetrics::new());

    let (mut colony, owner) = match &config.save_path {
        Some(path) if path.exists() => {
            let (colony, summary) = load_colony(path, registry.clone()).await?;
            metrics.record_load(&summary);
            let owner = colony.permissions().owner().unwrap_or_else(Uuid::new_v4);
            (colony, owner)
        }
        _ => seed_colony(registry.clone()),
    };
    info!(
        "Colony {} '{}' ready: {} citizen(s), {} building(s), {} work order(s)",
        colony.id(),
        colony.name(),
        colony.citizens().len(),
        colony.buildings().len(),
        colony.work_manager().len()
    );

    let metrics_clone = metrics.clone();
    let metrics_port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = metrics::start_metrics_server(metrics_clone, metrics_port).await {
            error!("Metrics server error: {}", e);
        }
    });

    // Transport stand-in: drain encoded messages off the tick thread
    let (mut sink, outbound) = ChannelSink::unbounded();
    let drain = tokio::task::spawn_blocking(move || {
        let mut bytes = 0usize;
        for message in outbound.iter() {
            bytes += message.payload.len();
            debug!("-> {} ({} bytes)", message.client, message.payload.len());
        }
        bytes
    });

    let mut clients = spawn_clients(owner, colony.center());
    let mut coordinator = SyncCoordinator::new(radii, config.ticks_per_hour);
    let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / config.tick_rate as f64));
    let mut tick: u64 = 0;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                tick += 1;
                wander(&mut clients, colony.center());
                simulate_colony(&mut colony, tick);

                let world = WorldSnapshot::new(clients.clone(), [colony.dimension()]);
                let start = Instant::now();
                let outcome = coordinator.update_subscribers(&mut colony, Some(&world), &mut sink);
                metrics.record_pass(&outcome, start.elapsed());
            }
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                }
                info!("Shutdown signal received");
                break;
            }
        }
    }

    if let Some(path) = &config.save_path {
        save_colony(&colony, path).await?;
        info!("Colony saved to {}", path.display());
    }

    drop(sink);
    match drain.await {
        Ok(bytes) => info!("Sent {} bytes to clients", bytes),
        Err(e) => error!("Outbound drain task failed: {}", e),
    }
    info!("Server stopped");

    Ok(())
}

async fn load_colony(path: &Path, registry: Arc<WorkOrderRegistry>) -> anyhow::Result<(Colony, LoadSummary)> {
    let data = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let tag: TagCompound = serde_json::from_str(&data)?;
    let (colony, summary) = Colony::read_from_tag(&tag, registry)?;
    if summary.dropped() > 0 {
        warn!(
            "Dropped {} work order(s) while loading ({} unknown, {} corrupt, {} duplicate)",
            summary.dropped(),
            summary.unknown,
            summary.corrupt,
            summary.duplicate
        );
    }
    Ok((colony, summary))
}

async fn save_colony(colony: &Colony, path: &Path) -> anyhow::Result<()> {
    let mut tag = TagCompound::new();
    colony.write_to_tag(&mut tag)?;
    let data = serde_json::to_string_pretty(&tag)?;
    tokio::fs::write(path, data)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Demo colony with a few buildings, citizens and open work orders
fn seed_colony(registry: Arc<WorkOrderRegistry>) -> (Colony, Uuid) {
    let center = BlockPos::new(0, 64, 0);
    let mut colony = Colony::new(1, "Founders' Rest", 0, center, registry);
    let owner = Uuid::new_v4();
    colony.permissions_mut().set_rank(owner, "founder", Rank::Owner);

    colony.buildings_mut().add_building(center, "townhall");
    let houses = [BlockPos::new(24, 64, 8), BlockPos::new(-20, 64, 14), BlockPos::new(6, 64, -30)];
    for (i, pos) in houses.iter().enumerate() {
        colony.buildings_mut().add_building(*pos, "house");
        colony
            .work_manager_mut()
            .add_work_order(WorkOrder::new(BuildOrder::new(*pos, "house", 1)));
        colony.citizens_mut().spawn_citizen(format!("Settler {}", i + 1));
    }
    colony
        .work_manager_mut()
        .add_work_order(WorkOrder::new(BuildOrder::new(center, "townhall", 2)));
    colony
        .work_manager_mut()
        .add_work_order(WorkOrder::new(DecorationOrder::new("fountain", BlockPos::new(4, 64, 4))));
    colony.schematics_mut().set_styles(vec!["medieval".to_string(), "nordic".to_string()]);

    (colony, owner)
}

fn spawn_clients(owner: Uuid, center: BlockPos) -> Vec<ConnectedClient> {
    let mut rng = rand::thread_rng();
    let origin = center.as_vec3();
    let mut clients = vec![ConnectedClient::new(owner, "founder", 0, origin + Vec3::new(2_000.0, 0.0, 0.0))];
    for i in 0..SIMULATED_VISITORS {
        let offset = Vec3::new(rng.gen_range(-600.0..600.0), 0.0, rng.gen_range(-600.0..600.0));
        clients.push(ConnectedClient::new(Uuid::new_v4(), format!("visitor{}", i), 0, origin + offset));
    }
    clients
}

/// Random walk, pulled back towards the colony when far away
fn wander(clients: &mut [ConnectedClient], center: BlockPos) {
    let mut rng = rand::thread_rng();
    let origin = center.as_vec3();
    for client in clients.iter_mut() {
        let step = Vec3::new(rng.gen_range(-4.0..4.0), 0.0, rng.gen_range(-4.0..4.0));
        client.position = client.position + step;
        let away = client.position - origin;
        if away.length() > 800.0 {
            client.position = client.position - Vec3::new(away.x * 0.01, 0.0, away.z * 0.01);
        }
    }
}

/// Citizens pick up and finish work now and then
fn simulate_colony(colony: &mut Colony, tick: u64) {
    let mut rng = rand::thread_rng();

    if rng.gen_bool(0.01) {
        let citizen = colony
            .citizens()
            .citizens()
            .map(|c| c.id())
            .find(|id| !colony.work_manager().work_orders().any(|o| o.is_claimed_by(*id)));
        let order = colony.work_manager().unassigned_work_order().map(WorkOrder::id);
        if let (Some(citizen), Some(order)) = (citizen, order) {
            colony.work_manager_mut().claim(order, citizen);
            debug!("Citizen {} claimed work order #{}", citizen, order);
        }
    }

    if rng.gen_bool(0.005) {
        let done = colony
            .work_manager()
            .work_orders()
            .find(|o| o.is_claimed())
            .map(|o| (o.id(), o.kind_as::<BuildOrder>().map(BuildOrder::building)));
        if let Some((id, building)) = done {
            colony.work_manager_mut().remove_work_order(id);
            if let Some(pos) = building {
                colony.buildings_mut().upgrade(pos);
            }
            info!("Work order #{} completed", id);
        }
    }

    if tick % SWEEP_INTERVAL == 0 {
        let removed = colony.sweep_work_orders();
        if removed > 0 {
            info!("Swept {} invalid work order(s)", removed);
        }
    }
}
