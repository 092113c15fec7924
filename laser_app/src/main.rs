//! Laser picking demo
//!
//! Loads the level and four characters into a headless scene, sweeps the
//! camera across them and labels whichever character the laser is on. At
//! exit the instance counters are printed and checked for leaks.

use laser_engine::foundation::logging;
use laser_engine::prelude::*;
use std::path::PathBuf;
use std::rc::Rc;
use thiserror::Error;

/// Config file read when no path is given on the command line
const DEFAULT_CONFIG: &str = "laser_demo.toml";

/// Loop iterations before the headless device closes
const DEMO_CYCLES: u64 = 240;

/// Loop iterations the camera spends on each waypoint
const CYCLES_PER_WAYPOINT: u64 = 30;

#[derive(Error, Debug)]
enum DemoError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Range(#[from] RangeError),

    #[error("instance counters out of balance:\n{0}")]
    Leaks(String),
}

/// Where the camera watches the cast from
const CAMERA_POSITION: [f32; 3] = [50.0, 50.0, -60.0];

/// Where each character stands and how it faces
const CAST: [(CharacterKind, &str, [f32; 3], f32); 4] = [
    (CharacterKind::Faerie, "Faerie", [-90.0, -25.0, 20.0], -90.0),
    (CharacterKind::Ninja, "Ninja", [-75.0, -66.0, -80.0], 0.0),
    (CharacterKind::Dwarf, "Dwarf", [-70.0, -66.0, -30.0], -90.0),
    (CharacterKind::Yodan, "Yodan", [-90.0, -25.0, -140.0], -90.0),
];

fn spawn(engine: &Engine) -> Result<Vec<ObjectHandle>, DemoError> {
    let mut cast = Vec::with_capacity(CAST.len());
    for (kind, name, [x, y, z], heading) in CAST {
        let object = ObjectHandle::create(engine, kind, name)?;
        object.position(x, y, z);
        object.rotation(Angle::new(0.0)?, Angle::new(heading)?, Angle::new(0.0)?);

        // the node keeps its own reference to the selector
        {
            let selector = Selector::create(engine, &object)?;
            object.attach_selector(&selector);
        }
        cast.push(object);
    }
    Ok(cast)
}

fn run_demo(config: EngineConfig) -> Result<RunSummary, DemoError> {
    let backend = Rc::new(HeadlessBackend::new().with_cycle_limit(DEMO_CYCLES));
    let mut engine = Engine::new(backend, config)?;
    let cast = spawn(&engine)?;

    let [x, y, z] = CAMERA_POSITION;
    engine.camera().position(x, y, z);
    let waypoints: Vec<Vec3> = cast.iter().map(ObjectHandle::current_position).collect();

    let mut cycle = 0_u64;
    let mut highlighted: Option<ObjectHandle> = None;
    let summary = engine.run(|engine| {
        #[allow(clippy::cast_possible_truncation)]
        let waypoint = ((cycle / CYCLES_PER_WAYPOINT) as usize) % waypoints.len();
        let target = waypoints[waypoint];
        engine.camera().target(target.x, target.y, target.z);
        cycle += 1;

        let selected = engine.selected_object().cloned();
        if selected != highlighted {
            if let Some(previous) = &highlighted {
                previous.highlight(false);
            }
            if let Some(current) = &selected {
                current.highlight(true);
                log::info!("Laser on {}", current.name());
            }
            highlighted = selected;
        }
        if let Some(current) = &highlighted {
            engine.draw_label(&current.name());
        }
    })?;

    drop(highlighted);
    drop(cast);
    Ok(summary)
}

fn main() -> Result<(), DemoError> {
    logging::init_with_level(log::LevelFilter::Info);
    log::info!("Starting laser picking demo");

    let config_path = std::env::args().nth(1).map_or_else(|| PathBuf::from(DEFAULT_CONFIG), PathBuf::from);
    let config = EngineConfig::load_or_default(&config_path)?;
    log::info!("Using configuration from {}", config_path.display());

    let summary = run_demo(config)?;
    log::info!(
        "Demo finished: {} frames, {} skipped, {} idle",
        summary.frames,
        summary.skipped_frames,
        summary.idle_cycles
    );

    let counters = CounterRegistry::global();
    counters.print(true);
    let report = counters.validate();
    if report.is_clean() {
        Ok(())
    } else {
        Err(DemoError::Leaks(counters.render(false)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_selects_each_character() {
        let mut engine = Engine::new(Rc::new(HeadlessBackend::new()), EngineConfig::default()).unwrap();
        let cast = spawn(&engine).unwrap();
        let [x, y, z] = CAMERA_POSITION;
        engine.camera().position(x, y, z);

        for object in &cast {
            let target = object.current_position();
            engine.camera().target(target.x, target.y, target.z);
            let cycle = engine.step(|_| {}).unwrap();

            assert!(matches!(cycle, Cycle::Drawn(PickOutcome::Highlightable { .. })));
            assert_eq!(engine.selected_object(), Some(object), "aimed at {}", object.name());
            assert!(engine.laser().position().metric_distance(&engine.camera().current_position()) > 1.0);
        }
    }
}
