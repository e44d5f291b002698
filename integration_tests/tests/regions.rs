use bevy::math::Vec2;
use ecosim_core::{EcologyConfig, Ecosystem, RainRegion, VolcanoProtoRegion};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn quiet_world() -> Ecosystem {
    let mut world = Ecosystem::new(EcologyConfig::new(48, 48, 4));
    world.set_param_float("rain_spawn_chance", 0.0);
    world.set_param_float("volcano_spawn_chance", 0.0);
    world
}

#[test]
fn rain_mask_clears_after_region_expires() {
    let mut world = quiet_world();
    world.set_param_int("rain_fade_ticks", 0);
    let params = world.params().clone();
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let mut cloud = RainRegion::spawn(world.dims(), &params, &mut rng);
    cloud.center = Vec2::new(24.0, 24.0);
    cloud.velocity = Vec2::ZERO;
    cloud.ttl = 3;
    world.rain_regions_mut().0.push(cloud);

    world.step();
    assert!(world.rain_mask().iter().any(|v| *v > 0.0));

    let mut expired_at = None;
    for _ in 0..10 {
        world.step();
        if expired_at.is_none() && world.rain_regions().is_empty() {
            expired_at = Some(world.tick());
        }
    }
    let expired_at = expired_at.expect("cloud expired");
    assert!(expired_at <= 4);
    assert!(world.rain_mask().iter().all(|v| *v == 0.0));
}

#[test]
fn volcano_mask_is_zero_two_ticks_after_expiry() {
    let mut world = quiet_world();
    world.volcano_regions_mut().0.push(VolcanoProtoRegion {
        center: Vec2::new(24.0, 24.0),
        radius: 8.0,
        strength: 1.0,
        ttl: 1,
        noise_seed: 3,
    });

    world.step();
    assert!(world.volcano_regions().is_empty());
    assert!(world.volcano_mask().iter().any(|v| *v > 0.0));
    world.step();
    assert!(world.volcano_mask().iter().all(|v| *v == 0.0));
}

#[test]
fn expired_proto_volcano_rolls_for_eruption() {
    let mut world = quiet_world();
    world.set_param_float("erupt_base", 8.0);
    world.volcano_regions_mut().0.push(VolcanoProtoRegion {
        center: Vec2::new(24.0, 24.0),
        radius: 8.0,
        strength: 1.0,
        ttl: 1,
        noise_seed: 3,
    });

    world.step_n(2);
    let telemetry = world.telemetry();
    assert_eq!(telemetry.eruptions_total, 1);
    assert!(telemetry.lava.tiles > 0);
}

#[test]
fn rain_spawning_respects_the_region_cap() {
    let mut world = Ecosystem::new(EcologyConfig::new(64, 64, 6));
    world.set_param_float("rain_spawn_chance", 1.0);
    world.set_param_float("rain_coverage_soft_cap", 1.0);
    world.set_param_int("rain_max_regions", 3);
    for _ in 0..40 {
        world.step();
        assert!(world.rain_regions().len() <= 3);
    }
    assert!(world.telemetry().rain.coverage > 0.0);
}
