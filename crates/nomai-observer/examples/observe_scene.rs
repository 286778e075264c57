//! Observe a small hand-built level and write its snapshots to disk.
//!
//! Run with:
//!   cargo run --example observe_scene -p nomai-observer [-- CONFIG.json [RULES.json]]
//!
//! Snapshots land in `$TMPDIR/nomai-snapshots/`. Set `RUST_LOG=info` to see
//! per-stage logging.

use std::path::PathBuf;

use anyhow::Context;
use nomai_observer::prelude::*;
use nomai_scene::prelude::*;

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Writes every snapshot as pretty JSON, one file per trigger.
struct JsonDirSink {
    dir: PathBuf,
}

impl SnapshotSink for JsonDirSink {
    fn persist(&mut self, snapshot: &WorldSnapshot, token: CaptureToken) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let path = self
            .dir
            .join(format!("{}-{}.json", snapshot.trigger, snapshot.timestamp));
        let json = snapshot.to_json_pretty()?;
        std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        println!("wrote {}", path.display());
        token.release();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scene setup
// ---------------------------------------------------------------------------

fn build_level() -> anyhow::Result<SceneWorld> {
    let mut world = SceneWorld::with_builtins("Level01");

    let cam = world.spawn(
        NodeSpec::new("Main Camera")
            .with_tag(MAIN_CAMERA_TAG)
            .with_position(Vec3::new(0.0, 2.0, -10.0)),
    );
    world.add_component(cam, Camera::default())?;

    let ground = world.spawn(NodeSpec::new("Ground").with_scale(Vec3::new(50.0, 1.0, 50.0)));
    world.add_component(ground, Collider::cuboid(Vec3::new(1.0, 0.1, 1.0)))?;

    // Two crates stacked into each other.
    for (name, y) in [("Crate", 0.5), ("Crate", 1.2)] {
        let id = world.spawn(NodeSpec::new(name).with_position(Vec3::new(2.0, y, 5.0)));
        world.add_component(id, Collider::cuboid(Vec3::ONE))?;
    }

    // Interactive lever with no collider, and a speck nobody will ever see.
    world.spawn(NodeSpec::new("Lever").with_layer(8).with_position(Vec3::new(-2.0, 1.0, 4.0)));
    world.spawn(NodeSpec::new("Dust").with_scale(Vec3::splat(0.001)));
    world.spawn(NodeSpec::new("Backstage").with_position(Vec3::new(0.0, 0.0, -50.0)));

    let hud = world.spawn(NodeSpec::new("HUD"));
    world.add_component(hud, Canvas::default())?;
    let play = world.spawn_child(hud, NodeSpec::new("Play"))?;
    world.add_component(
        play,
        UiRect::new(UiKind::Button, Vec2::new(860.0, 500.0), Vec2::new(200.0, 60.0)),
    )?;
    let fade = world.spawn_child(hud, NodeSpec::new("Fade"))?;
    world.add_component(
        fade,
        UiRect::new(UiKind::Image, Vec2::ZERO, Vec2::new(1920.0, 1080.0)),
    )?;

    Ok(world)
}

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => {
            let text = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            ObserverConfig::from_json_str(&text)?
        }
        None => ObserverConfig::default(),
    };

    let mut observer = WorldObserver::new(config);
    if let Some(rules) = args.next() {
        let added = observer.load_rule_file(&rules);
        println!("loaded {added} rule(s) from {rules}");
    }
    observer.add_sink(JsonDirSink {
        dir: std::env::temp_dir().join("nomai-snapshots"),
    });

    let mut world = build_level()?;
    let TriggerOutcome::Captured(snapshot) = observer.on_trigger(&world, "sceneLoaded") else {
        anyhow::bail!("observer unexpectedly busy");
    };

    let spatial = snapshot.spatial_report.as_ref();
    let validation = snapshot.validation_report.as_ref();
    println!("hash:          {}", snapshot.content_hash);
    println!("nodes:         {}", snapshot.capture_stats.as_ref().map_or(0, |s| s.nodes));
    println!("off-screen:    {}", spatial.map_or(0, |s| s.off_screen_count));
    println!("scale issues:  {}", spatial.map_or(0, |s| s.scale_anomaly_count));
    println!("overlaps:      {}", spatial.map_or(0, |s| s.overlap_count));
    println!("errors:        {}", validation.map_or(0, |v| v.error_count));
    println!("warnings:      {}", validation.map_or(0, |v| v.warning_count));
    if let Some(ui) = &snapshot.ui_graph {
        for element in ui.find_blocked_elements() {
            println!(
                "blocked:       {} (by {})",
                element.path,
                element.blocked_by.as_deref().unwrap_or("?")
            );
        }
    }

    // A router fixes the validation error and changes the hash.
    let router = world.spawn(NodeSpec::new("EventSystem"));
    world.add_component(router, InputRouter::default())?;
    if let TriggerOutcome::Captured(after) = observer.on_trigger(&world, "playModeEntered") {
        println!("hash changed:  {}", after.content_hash != snapshot.content_hash);
    }
    Ok(())
}
