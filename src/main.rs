//! Contact Handler CLI Application

use anyhow::Context;
use clap::Parser;
use contact_handler::config::ScenarioConfig;
use contact_handler::contact::{CollisionHandler, ConstraintInfo};
use contact_handler::io::state::StateCounts;
use contact_handler::io::{write_replay_report, ReplayReport, StateBuffer};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

mod cli;
use cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    // Dispatch to command handlers
    match cli.command {
        Commands::Info { input } => cmd_info(&input),
        Commands::Replay {
            input,
            output,
            checkpoint,
            all_steps,
        } => cmd_replay(&input, output, checkpoint, all_steps),
        Commands::State { input } => cmd_state(&input),
    }
}

fn load_scenario(input: &Path) -> anyhow::Result<ScenarioConfig> {
    ScenarioConfig::from_file(input)
        .with_context(|| format!("Failed to load scenario {}", input.display()))
}

fn cmd_info(input: &Path) -> anyhow::Result<()> {
    let config = load_scenario(input)?;
    let handler = config.build_handler()?;

    println!("\n{}", "=".repeat(60));
    println!("SCENARIO INFORMATION");
    println!("{}", "=".repeat(60));
    println!();
    for idx in 0..2 {
        let body = handler.body(idx)?;
        let mesh = body.collision_mesh();
        println!(
            "  Body {}: {} ({})",
            idx,
            body.name(),
            if body.is_low_dof() { "rigid" } else { "deformable" }
        );
        println!("    Vertices:   {}", mesh.num_vertices());
        println!("    Faces:      {}", mesh.num_faces());
        println!("    Mass:       {:.6}", body.mass());
    }
    println!();
    println!("  Method:          {:?}", handler.method());
    println!("  Friction:        {}", handler.friction());
    println!("  Penetration Tol: {}", handler.penetration_tol());
    println!("  Compliance:      {}", handler.compliance());
    println!("  Damping:         {}", handler.damping());
    println!("  Attachments:     {}", config.attachments.len());
    println!("  Steps:           {}", config.steps.len());
    println!("{}", "=".repeat(60));

    Ok(())
}

fn cmd_replay(
    input: &Path,
    output: Option<PathBuf>,
    checkpoint: Option<PathBuf>,
    all_steps: bool,
) -> anyhow::Result<()> {
    let config = load_scenario(input)?;
    let mut handler = config.build_handler()?;
    let mut collider = config.build_collider();
    let attachments = config.build_attachments();

    let mut report = ReplayReport::new(
        input.display().to_string(),
        [
            handler.body(0)?.name().to_string(),
            handler.body(1)?.name().to_string(),
        ],
        handler.method(),
        handler.behavior().clone(),
    );

    log::info!("Replaying {} steps from {}", config.steps.len(), input.display());

    let progress = ProgressBar::new(config.steps.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} steps {msg}")?
            .progress_chars("=> "),
    );

    for (i, step) in config.steps.iter().enumerate() {
        let max_penetration = handler
            .compute_collision_constraints(&mut collider, &attachments)
            .with_context(|| format!("Step {} failed", i))?;
        solve_step(&mut handler, &step.impulses)?;

        let metrics = handler.last_metrics().clone();
        if all_steps {
            progress.suspend(|| metrics.print_summary(i));
        }
        report.add_step(i, max_penetration, metrics);
        progress.set_message(format!("max pen {:.4}", max_penetration));
        progress.inc(1);
    }
    progress.finish_and_clear();

    if let Some(last) = report.steps.last() {
        if !all_steps {
            last.metrics.print_summary(last.step);
        }
    }
    println!("Max penetration over run: {:.6}", report.max_penetration());

    if let Some(path) = output {
        write_replay_report(&report, &path)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        println!("Report written to {}", path.display());
    }

    if let Some(path) = checkpoint {
        let mut buf = StateBuffer::new();
        handler.get_aux_state(&mut buf)?;
        buf.write_file(&path)
            .with_context(|| format!("Failed to write checkpoint {}", path.display()))?;
        println!("Checkpoint written to {} ({} bytes)", path.display(), buf.len());
    }

    Ok(())
}

/// Hand the constraints to a stand-in solver that returns recorded impulses
fn solve_step(handler: &mut CollisionHandler, impulses: &[f64]) -> anyhow::Result<()> {
    let num_bilateral = handler.num_bilateral_constraints();
    let total = num_bilateral + handler.num_unilateral_constraints();

    let mut infos = vec![ConstraintInfo::default(); total];
    let idx = handler.get_bilateral_info(&mut infos, 0)?;
    handler.get_unilateral_info(&mut infos, idx)?;

    if impulses.is_empty() {
        return Ok(());
    }
    if impulses.len() != total {
        log::warn!(
            "Step has {} recorded impulses for {} constraints",
            impulses.len(),
            total
        );
    }
    let mut lam = impulses.to_vec();
    lam.resize(total, 0.0);
    let idx = handler.set_bilateral_impulses(&lam, 0)?;
    handler.set_unilateral_impulses(&lam, idx)?;
    Ok(())
}

fn cmd_state(input: &Path) -> anyhow::Result<()> {
    let mut buf = StateBuffer::read_file(input)
        .with_context(|| format!("Failed to read checkpoint {}", input.display()))?;
    let counts = StateCounts::read(&mut buf)?;
    buf.rewind();
    CollisionHandler::skip_aux_state(&mut buf).context("Checkpoint is corrupt")?;

    println!("\n{}", "=".repeat(60));
    println!("CHECKPOINT: {}", input.display());
    println!("{}", "=".repeat(60));
    println!();
    println!("  Bilateral (body 0): {}", counts.bilaterals0);
    println!("  Bilateral (body 1): {}", counts.bilaterals1);
    println!("  Unilateral:         {}", counts.unilaterals);
    println!("  Size:               {} bytes", buf.len());
    if buf.remaining() > 0 {
        println!("  Trailing bytes:     {}", buf.remaining());
    }
    println!("{}", "=".repeat(60));

    Ok(())
}
