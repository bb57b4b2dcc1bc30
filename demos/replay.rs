use std::{fs, str::FromStr, time::Duration};

use anyhow::Context;
use clap::Parser;
use hwaddr::HwAddr;
use log::{info, warn};
use mac_learning::{spawn_maintenance, LearningConfig, MacLearning, MaintenanceOptions};

#[derive(Parser)]
#[command(about, long_about = None)]
struct ReplayArgs {
    /// toml config file with a [mac_learning] section
    #[arg(short, long)]
    toml: Option<String>,

    /// trace file, one observed frame per line: `MAC VLAN PORT`
    #[arg(long)]
    trace: String,
}

/// Parse one trace line. Blank lines and `#` comments yield `None`.
fn parse_trace_line(line: &str) -> anyhow::Result<Option<(HwAddr, u16, u32)>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let mut fields = line.split_whitespace();
    let mac = fields.next().context("missing mac")?;
    let vlan = fields.next().context("missing vlan")?;
    let port = fields.next().context("missing port")?;
    let mac = HwAddr::from_str(mac).map_err(|_| anyhow::anyhow!("invalid mac: {}", mac))?;
    Ok(Some((
        mac,
        vlan.parse().with_context(|| format!("invalid vlan: {vlan}"))?,
        port.parse().with_context(|| format!("invalid port: {port}"))?,
    )))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = ReplayArgs::parse();

    let config = match &args.toml {
        Some(path) => LearningConfig::from_file(path)?,
        None => LearningConfig::default(),
    };
    let table: MacLearning<u32> = MacLearning::new(config.idle_time);
    config.apply(&mut *table.write().await);

    let maintenance = spawn_maintenance(table.clone(), MaintenanceOptions::default(), || {
        info!("bindings changed");
    });

    let trace = fs::read_to_string(&args.trace)
        .with_context(|| format!("failed to read trace: {}", args.trace))?;
    let mut frames = Vec::new();
    for (lineno, line) in trace.lines().enumerate() {
        match parse_trace_line(line) {
            Ok(Some(frame)) => frames.push(frame),
            Ok(None) => {}
            Err(err) => warn!("line {}: {:?}", lineno + 1, err),
        }
    }

    for (mac, vlan, port) in &frames {
        let mut guard = table.write().await;
        if !guard.may_learn(*mac, *vlan) {
            continue;
        }
        let id = guard.insert(*mac, *vlan);
        guard.set_port(id, Some(*port));
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    let guard = table.read().await;
    for (mac, vlan, _) in &frames {
        match guard.lookup(*mac, *vlan) {
            Some(port) => println!("{mac} vlan {vlan} -> port {port}"),
            None => println!("{mac} vlan {vlan} -> flood"),
        }
    }
    for usage in guard.port_usage() {
        println!("port {}: {} entries", usage.port(), usage.count());
    }
    println!("{} entries, {:?}", guard.len(), guard.stats());
    drop(guard);

    maintenance.abort();
    Ok(())
}
