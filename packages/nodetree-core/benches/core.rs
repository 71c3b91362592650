use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use nodetree_core::{CollectionCodec, NodeStore, StoreConfig, TreeStores};

const CI_CONFIG: &[(u64, u64)] = &[(100, 5), (1_000, 1), (10_000, 1)];

const LOCAL_CONFIG: &[(u64, u64)] = &[(1, 1), (10, 1), (100, 1), (1_000, 1), (10_000, 1)];

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct Output {
    implementation: &'static str,
    storage: &'static str,
    workload: String,
    timestamp: String,
    name: String,
    total_ops: u64,
    duration_ms: f64,
    ops_per_sec: f64,
    extra: Extra,
    source_file: Option<String>,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct Extra {
    count: u64,
    mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    iterations: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    avg_duration_ms: Option<f64>,
}

#[derive(Clone, Copy)]
enum Workload {
    /// Children created before parents: every node but the root waits in the
    /// reconstruction queue until the root arrives.
    ReverseChain,
    /// Fan-out tree encoded and decoded once.
    ForestRoundTrip,
}

impl Workload {
    fn name(self) -> &'static str {
        match self {
            Workload::ReverseChain => "reverse-chain",
            Workload::ForestRoundTrip => "forest-round-trip",
        }
    }

    fn ops(self, count: u64) -> u64 {
        match self {
            Workload::ReverseChain => count,
            Workload::ForestRoundTrip => count * 2,
        }
    }
}

fn is_ci() -> bool {
    env::var("CI").map(|v| v == "true").unwrap_or(false)
}

fn config_for(count: u64) -> StoreConfig {
    StoreConfig {
        max_indexed_nodes: count as usize,
        ..Default::default()
    }
}

fn reverse_chain(count: u64) -> f64 {
    let mut store = NodeStore::<u64, u64>::new(config_for(count));
    let start = Instant::now();
    for i in (0..count).rev() {
        let parent = i.checked_sub(1);
        store.create(i, i, parent).unwrap();
    }
    store.attempt(true);
    let elapsed = start.elapsed().as_secs_f64() * 1000.0;
    assert_eq!(store.len() as u64, count);
    elapsed
}

fn forest_round_trip(count: u64) -> f64 {
    let mut stores = TreeStores::new(config_for(count));
    let store = stores.store_mut::<u64, u64>();
    let root = store.insert_root(0u64, 0u64).handle().unwrap();
    for i in 1..count {
        // Ten children per node, breadth-first.
        store.create(i, i, Some((i - 1) / 10)).unwrap();
    }
    let entry = stores.forest_entry::<u64, u64>(root);
    let codec = CollectionCodec::default();

    let start = Instant::now();
    let bytes = codec.encode(&stores, &[entry]).unwrap();
    let mut target = TreeStores::new(config_for(count));
    target.register_type::<u64, u64>();
    let decoded = codec.decode(&mut target, &bytes).unwrap();
    let elapsed = start.elapsed().as_secs_f64() * 1000.0;
    assert_eq!(decoded.digest_matches, Some(true));
    elapsed
}

fn run_benchmark(workload: Workload, count: u64) -> f64 {
    match workload {
        Workload::ReverseChain => reverse_chain(count),
        Workload::ForestRoundTrip => forest_round_trip(count),
    }
}

fn main() {
    let is_ci_env = is_ci();
    let config: &[(u64, u64)] = if is_ci_env { CI_CONFIG } else { LOCAL_CONFIG };

    let mut out_dir: Option<PathBuf> = None;
    let mut custom_config: Option<Vec<(u64, u64)>> = None;
    for arg in env::args().skip(1) {
        if let Some(val) = arg.strip_prefix("--count=") {
            let count = val.parse().unwrap_or(500);
            custom_config = Some(vec![(count, 1)]);
        } else if let Some(val) = arg.strip_prefix("--counts=") {
            let parsed: Vec<(u64, u64)> = val
                .split(',')
                .filter_map(|s| s.trim().parse::<u64>().ok())
                .map(|c| (c, 1))
                .collect();
            if !parsed.is_empty() {
                custom_config = Some(parsed);
            }
        } else if let Some(val) = arg.strip_prefix("--out-dir=") {
            out_dir = Some(PathBuf::from(val));
        }
    }

    let config = custom_config.as_deref().unwrap_or(config);
    let out_dir = out_dir.unwrap_or_else(|| PathBuf::from("benchmarks/core"));
    fs::create_dir_all(&out_dir).expect("mkdirs");

    for workload in [Workload::ReverseChain, Workload::ForestRoundTrip] {
        for &(count, iterations) in config {
            let count = count.max(1);
            let (duration_ms, iterations_opt, avg_duration_ms) = if iterations > 1 {
                let durations: Vec<f64> = (0..iterations)
                    .map(|_| run_benchmark(workload, count))
                    .collect();
                let avg = durations.iter().sum::<f64>() / durations.len() as f64;
                (avg, Some(iterations), Some(avg))
            } else {
                (run_benchmark(workload, count), None, None)
            };

            let workload_name = format!("{}-{}", workload.name(), count);
            let out_path = out_dir.join(format!("memory-{}.json", workload_name));
            let total_ops = workload.ops(count);

            let output = Output {
                implementation: "core-nodetree",
                storage: "memory",
                workload: workload_name.clone(),
                timestamp: chrono::Utc::now().to_rfc3339(),
                name: workload_name,
                total_ops,
                duration_ms,
                ops_per_sec: if duration_ms > 0.0 {
                    total_ops as f64 / duration_ms * 1000.0
                } else {
                    f64::INFINITY
                },
                extra: Extra {
                    count,
                    mode: "sequential",
                    iterations: iterations_opt,
                    avg_duration_ms,
                },
                source_file: Some(out_path.display().to_string()),
            };

            let json = serde_json::to_string_pretty(&output).expect("serialize");
            fs::write(&out_path, &json).expect("write output");
            println!("{}", json);
        }
    }
}
