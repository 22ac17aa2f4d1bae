//! Config files on disk

use std::fs;
use tokenflow_core::Vec3;
use tokenflow_physics::PhysicsConfig;
use tokenflow_runtime::{ConfigError, Engine, EngineConfig};

#[test]
fn test_toml_round_trip() {
    let config = EngineConfig::default()
        .with_seed(99)
        .with_pool_size(3)
        .with_physics(PhysicsConfig::low_gravity());
    let text = config.to_toml_string().unwrap();
    let parsed = EngineConfig::from_toml_str(&text).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_load_from_file() {
    let dir = std::env::temp_dir().join(format!("tokenflow-config-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("engine.toml");
    fs::write(
        &path,
        r#"
        pool_size = 8
        physics_enabled = false

        [spawn_position]
        x = 1.0
        y = 2.0
        z = 3.0

        [timings.flow]
        grace = 0.25
        "#,
    )
    .unwrap();

    let config = EngineConfig::load(&path).unwrap();
    assert_eq!(config.pool_size, 8);
    assert!(!config.physics_enabled);
    assert_eq!(config.spawn_position, Vec3::new(1.0, 2.0, 3.0));
    assert_eq!(config.timings.flow.grace, 0.25);
    assert_eq!(config.timings.flow.timer_wait, 2.0);

    let engine = Engine::new(config);
    assert!(!engine.manager().physics_enabled());

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_invalid_values_are_reported() {
    let err = EngineConfig::from_toml_str("[steering]\nparticle_chance = 1.5\n").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
    assert!(err.to_string().contains("particle_chance"));
}
