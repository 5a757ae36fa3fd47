use openping::config::app_config::{load_config, setup_resolver, setup_tls_connector};
use openping::config::probe_config::TargetConfig;
use openping::http_probe::report;
use openping::http_probe::prelude::*;
use openping::store::{MeasurementStore, MemoryStore, MongoStore};

fn to_fixed_width(input: &str, width: usize) -> String {
    use unicode_truncate::UnicodeTruncateStr;

    let (truncated, _) = input.unicode_truncate(width);
    format!("{:<width$}", truncated, width = width)
}

/// Probes every target once, in order, and records each bundle. Failed probes
/// are recorded too so downtime is visible in the store.
async fn run_cycle<S: MeasurementStore>(
    transport: &ProbeTransport,
    store: &mut S,
    targets: &[TargetConfig],
    width: usize,
) {
    for target in targets {
        let label = to_fixed_width(&target.url, width);
        let request = match ProbeRequest::get(&target.url) {
            Ok(request) => request,
            Err(e) => {
                log::error!("[{label}] ❌ Skipping target: {}", report(&e));
                continue;
            }
        };

        let bundle = match probe(transport, &request).await {
            Ok(bundle) => {
                let marker = if bundle.uptime.up { "✅" } else { "❌" };
                log::info!(
                    "[{label}] {marker} Status: {}, Elapsed: {:.2}ms, Bytes: {}, SHA-256: {}",
                    bundle.uptime.status_code,
                    bundle.latency.total_latency.as_secs_f64() * 1000.0,
                    bundle.metadata.byte_count,
                    bundle.metadata.content_hash.get(..12).unwrap_or_default(),
                );
                bundle
            }
            Err(failure) => {
                log::error!("[{label}] ❌ Probe error: {}", report(&failure.error));
                failure.bundle
            }
        };

        if let Err(e) = store.record_measurement(bundle).await {
            log::error!("[{label}] Failed to store measurement: {}", report(&e));
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let app_config = load_config()?;
    let resolver = setup_resolver(&app_config.dns_hosts)?;
    let tls = setup_tls_connector(app_config.probe.accept_invalid_certs)?;
    let transport = ProbeTransport::new(resolver, tls).with_max_redirects(app_config.probe.max_redirects);

    let targets = &app_config.probe.targets;
    let width = app_config.max_host_width;

    match &app_config.mongo {
        Some(mongo) => {
            log::info!("Storing measurements in document store at {}", mongo.address());
            let mut store = MongoStore::connect(mongo).await?;
            run_cycle(&transport, &mut store, targets, width).await;
        }
        None => {
            log::info!("MONGO_HOST not set, keeping measurements in memory");
            let mut store = MemoryStore::new();
            run_cycle(&transport, &mut store, targets, width).await;
            for host in store.hosts() {
                log::info!("{host}: {} measurement(s) recorded", store.history(host).len());
            }
        }
    }

    Ok(())
}
