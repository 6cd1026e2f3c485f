use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use drivemind_graph::spatial::distance_between;
use drivemind_graph::{NodeId, RoadGraphStore, RoadNetwork, SegmentId, VehicleType};
use drivemind_routing::{Constraints, Endpoint, PlannerConfig, RoutePlanner, RouteRequest};
use serde_json::{Value as JsonValue, json};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Segments shorter than this fraction of the straight-line distance
/// between their endpoints are reported as suspicious.
const MIN_LENGTH_RATIO: f64 = 0.9;

#[derive(Parser, Debug)]
#[command(name = "drivemind-cli", author, version, about, long_about = None)]
struct Cli {
    /// Path to the road network JSON file
    #[arg(env)]
    network: PathBuf,

    /// Subcommand/tool to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Summarize the network and flag likely data errors
    Inspect,
    /// Pretty-print a segment along with its endpoints
    GetSegment {
        /// Segment ID
        segment_id: u64,
    },
    /// Plan a route at free flow
    Plan {
        /// Node ID or `lat,lng`
        source: String,
        /// Node ID or `lat,lng`
        destination: String,
        /// Skip toll segments
        #[arg(long)]
        avoid_tolls: bool,
        /// Only use segments open to this vehicle type
        #[arg(long)]
        vehicle: Option<VehicleType>,
        /// Total number of routes to return
        #[arg(long, default_value = "1")]
        alternates: usize,
    },
}

fn parse_endpoint(input: &str) -> anyhow::Result<Endpoint> {
    if let Ok(id) = input.parse::<u64>() {
        return Ok(Endpoint::Node(NodeId::new(id)));
    }

    if let Some((lat, lng)) = input.split_once(',') {
        let lat = lat.trim().parse().context("invalid latitude in waypoint")?;
        let lng = lng.trim().parse().context("invalid longitude in waypoint")?;
        return Ok(Endpoint::Waypoint { lat, lng });
    }

    Err(anyhow!(
        "Unrecognized endpoint format. Use a node ID or lat,lng"
    ))
}

fn inspect(network: &RoadNetwork) -> JsonValue {
    let isolated: Vec<NodeId> = network
        .nodes()
        .iter()
        .filter(|node| network.segments_at(node.id).next().is_none())
        .map(|node| node.id)
        .collect();

    let suspicious: Vec<JsonValue> = network
        .segments()
        .iter()
        .filter_map(|segment| {
            let from = network.node(segment.from)?;
            let to = network.node(segment.to)?;
            let straight_line = distance_between(from, to);
            (segment.length_m < straight_line * MIN_LENGTH_RATIO).then(|| {
                json!({
                    "segment": segment.id,
                    "lengthM": segment.length_m,
                    "straightLineM": straight_line.round(),
                })
            })
        })
        .collect();

    json!({
        "nodes": network.node_count(),
        "segments": network.segment_count(),
        "oneway": network.segments().iter().filter(|s| s.oneway).count(),
        "toll": network.segments().iter().filter(|s| s.toll).count(),
        "totalLengthM": network.segments().iter().map(|s| s.length_m).sum::<f64>(),
        "isolatedNodes": isolated,
        "shorterThanStraightLine": suspicious,
    })
}

fn describe_segment(network: &RoadNetwork, id: SegmentId) -> anyhow::Result<JsonValue> {
    let segment = network
        .segment(id)
        .ok_or_else(|| anyhow!("{id} does not exist in the network"))?;
    let from = network.node(segment.from);
    let to = network.node(segment.to);
    let straight_line = from.zip(to).map(|(a, b)| distance_between(a, b).round());

    Ok(json!({
        "segment": segment,
        "from": from,
        "to": to,
        "straightLineM": straight_line,
    }))
}

fn plan(network: RoadNetwork, request: &RouteRequest, alternates: usize) -> anyhow::Result<JsonValue> {
    let config = PlannerConfig {
        max_alternates: alternates
            .try_into()
            .context("at least one route must be requested")?,
        ..PlannerConfig::default()
    };
    let planner = RoutePlanner::new(Arc::new(RoadGraphStore::new(network)), config);
    let routes = planner.plan_alternates(request, alternates)?;
    if routes.len() < alternates {
        warn!(
            requested = alternates,
            found = routes.len(),
            "Fewer distinct routes exist than were requested"
        );
    }
    Ok(serde_json::to_value(routes)?)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        // Standard logger, configured via the RUST_LOG env variable
        .with(tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env()))
        .init();

    let cli = Cli::parse();
    let network = RoadNetwork::from_json_file(&cli.network)
        .with_context(|| format!("Failed to load road network from {}", cli.network.display()))?;
    info!(
        path = %cli.network.display(),
        nodes = network.node_count(),
        segments = network.segment_count(),
        "Loaded road network"
    );

    let output = match cli.command {
        Commands::Inspect => inspect(&network),
        Commands::GetSegment { segment_id } => {
            describe_segment(&network, SegmentId::new(segment_id))?
        }
        Commands::Plan {
            source,
            destination,
            avoid_tolls,
            vehicle,
            alternates,
        } => {
            let request = RouteRequest::new(parse_endpoint(&source)?, parse_endpoint(&destination)?)
                .with_constraints(Constraints {
                    avoid_tolls,
                    vehicle,
                });
            plan(network, &request, alternates)?
        }
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
