use std::path::PathBuf;

use portage_explorer::{Explorer, ExplorerConfig, NativeEvaluator};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(target) = args.next() else {
        eprintln!("usage: explore_tree <source-root | config.toml> [--native]");
        std::process::exit(2);
    };
    let native = args.any(|a| a == "--native");

    let target = PathBuf::from(target);
    let config = if target.extension().and_then(|s| s.to_str()) == Some("toml") {
        ExplorerConfig::from_file(&target).expect("failed to load config")
    } else {
        ExplorerConfig::new(target)
    };

    let output = if native {
        Explorer::with_evaluator(config, NativeEvaluator).and_then(|e| e.run())
    } else {
        Explorer::new(config).and_then(|e| e.run())
    }
    .expect("exploration failed");

    for target in &output.build_targets {
        if let Some(base) = output.base_profile(&target.name) {
            eprintln!("{:<24} {}", target.name, base.id);
        }
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&output).expect("failed to serialize output")
    );
}
