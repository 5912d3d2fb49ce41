use std::fmt::Write as _;

use doorwatch_config::{Config, render_config};
use doorwatch_core::{GateScope, PipelineConfig};

use crate::cli::{CheckArgs, GlobalOpts};
use crate::error::CliError;

pub fn handle(args: &CheckArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = super::load(global)?;
    let pipeline = cfg.to_pipeline_config()?;
    let classifier = cfg.classifier_settings()?;

    let source = global
        .config
        .clone()
        .unwrap_or_else(doorwatch_config::config_path);
    println!("config: {}", source.display());
    print!("{}", summary(&cfg, &pipeline, classifier.endpoint.as_str()));

    if args.show {
        println!();
        print!("{}", render_config(&cfg)?);
    }
    println!("configuration OK");
    Ok(())
}

fn summary(cfg: &Config, pipeline: &PipelineConfig, endpoint: &str) -> String {
    let scope = match pipeline.gate_scope {
        GateScope::Global => "global",
        GateScope::PerSite => "per-site",
    };
    let suppressed = if pipeline.suppress_labels.is_empty() {
        "(none)".to_owned()
    } else {
        pipeline.suppress_labels.join(", ")
    };

    let mut out = String::new();
    let _ = writeln!(out, "gate scope: {scope}");
    for route in &pipeline.routes {
        let _ = writeln!(out, "  route: {}* -> site {}", route.prefix, route.site);
    }
    if let Some(site) = pipeline.default_site {
        let _ = writeln!(out, "  default site: {site}");
    }
    let _ = writeln!(out, "timezone: {}", pipeline.timezone.name());
    let _ = writeln!(out, "labels: {}", pipeline.labels.join(", "));
    let _ = writeln!(out, "suppressed labels: {suppressed}");
    let _ = writeln!(out, "classifier: {endpoint}");
    let _ = writeln!(out, "poll inbox: {}", cfg.paths.poll_inbox.display());
    let _ = writeln!(out, "camera inbox: {}", cfg.paths.camera_inbox.display());
    let _ = writeln!(out, "outbox: {}", cfg.paths.outbox.display());
    let _ = writeln!(out, "state dir: {}", cfg.paths.state_dir.display());
    out
}
