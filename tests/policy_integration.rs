//! Closed-loop policy integration tests: evaluation feeds policies,
//! policies steer sectors, sector output feeds the next evaluation.

mod common;

use proxima::agents::AgentState;
use proxima::core::constants::METRIC_DUST_COVERAGE;
use proxima::policy::{
    DustThrottlePolicy, MaintenancePolicy, Policy, PolicyEngine, ScienceGrowthPolicy,
};
use proxima::policy::science_growth::PipelineOrder;
use proxima::sectors::construction::ConstructionStatus;

use common::{build_world, dust_goal, WorldSpec};

fn dust_world(seed: u64) -> proxima::world::World {
    let spec = WorldSpec {
        goals: vec![dust_goal(1.0)],
        policies: PolicyEngine::new(vec![Policy::DustThrottle(DustThrottlePolicy::default())]),
        ..WorldSpec::default()
    };
    build_world(spec, seed)
}

#[test]
fn test_dust_throttle_engages_at_literal_level() {
    let mut world = dust_world(42);
    for _ in 0..10 {
        world.step().unwrap();
    }

    // Dust has climbed to 0.85 of the 1.0 target by t=10.
    world.evaluation.set_value(METRIC_DUST_COVERAGE, 0.85);
    let report = world.step().unwrap();

    // theta = 0.8 * (0.85 - 0.7) / (1.0 - 0.7) = 0.4, on both sectors.
    assert!((world.science.throttle_factor - 0.4).abs() < 1e-9);
    assert!((world.manufacturing.throttle_factor - 0.4).abs() < 1e-9);
    let effect = &report.policy_effects["PLCY-DUST-THROTTLE"];
    assert!((effect["throttle"].as_f64().unwrap() - 0.4).abs() < 1e-9);
}

#[test]
fn test_dust_throttle_boundary_levels() {
    let mut world = dust_world(42);

    world.evaluation.set_value(METRIC_DUST_COVERAGE, 0.7);
    world.step().unwrap();
    assert_eq!(world.science.throttle_factor, 0.0);

    world.evaluation.set_value(METRIC_DUST_COVERAGE, 1.0);
    world.step().unwrap();
    assert_eq!(world.science.throttle_factor, 0.8);
}

#[test]
fn test_dust_recovery_restores_full_activity() {
    let mut world = dust_world(42);

    world.evaluation.set_value(METRIC_DUST_COVERAGE, 0.95);
    world.step().unwrap();
    assert!(world.science.throttle_factor > 0.5);

    // Back inside the safe band: the throttle resets to zero.
    world.evaluation.set_value(METRIC_DUST_COVERAGE, 0.3);
    world.step().unwrap();
    assert_eq!(world.science.throttle_factor, 0.0);
    assert_eq!(world.manufacturing.throttle_factor, 0.0);
}

#[test]
fn test_throttle_reduces_rover_activation() {
    let mut world = dust_world(42);
    world.evaluation.set_value(METRIC_DUST_COVERAGE, 0.85);

    let mut active_rover_steps = 0usize;
    let total_steps = 200;
    for _ in 0..total_steps {
        // Hold dust at the throttle level for the whole window.
        world.evaluation.set_value(METRIC_DUST_COVERAGE, 0.85);
        world.step().unwrap();
        active_rover_steps += world.science.operational_rovers();
    }

    let rate = active_rover_steps as f64 / (4.0 * total_steps as f64);
    // A 0.4 throttle drops activations to roughly 60%.
    assert!(
        (0.52..=0.68).contains(&rate),
        "activation rate {rate} with 0.4 throttle"
    );
}

#[test]
fn test_science_growth_orders_literal_quantity() {
    // Month 5, 10 active rovers, 1 expected loss, (6, 5) in flight:
    // target(6) = 200, required 20, forecast 14, order 22 - 14 = 8.
    let growth = ScienceGrowthPolicy {
        expected_losses: 1,
        steps_per_month: 1,
        pipeline: vec![PipelineOrder {
            arrival_month: 6,
            quantity: 5,
        }],
        enabled: false,
        ..ScienceGrowthPolicy::default()
    };
    let spec = WorldSpec {
        rover_count: 10,
        policies: PolicyEngine::new(vec![Policy::ScienceGrowth(growth)]),
        steps_per_month: 1,
        ..WorldSpec::default()
    };
    let mut world = build_world(spec, 42);

    for _ in 0..5 {
        world.step().unwrap();
    }
    world.policy.enable_policy("PLCY-GROWTH-SCIENCE-RATE", true);

    // Step t=5: the policy sees the step-4 rover count of 10.
    let report = world.step().unwrap();
    let effect = &report.policy_effects["PLCY-GROWTH-SCIENCE-RATE"];
    assert_eq!(effect["ordered"], 8);

    let Policy::ScienceGrowth(policy) = &world.policy.policies[0] else {
        panic!("policy variant changed");
    };
    assert!(policy
        .pipeline
        .iter()
        .any(|o| o.arrival_month == 6 && o.quantity == 8));

    // The construction request lands in the queue next step.
    world.step().unwrap();
    let queued = world
        .construction
        .queue
        .iter()
        .filter(|r| r.status == ConstructionStatus::Queued)
        .count();
    assert_eq!(queued, 8);
}

#[test]
fn test_growth_pipeline_retired_on_module_completion() {
    let growth = ScienceGrowthPolicy {
        steps_per_month: 1,
        ..ScienceGrowthPolicy::default()
    };
    let spec = WorldSpec {
        rover_count: 10,
        policies: PolicyEngine::new(vec![Policy::ScienceGrowth(growth)]),
        steps_per_month: 1,
        ..WorldSpec::default()
    };
    let mut world = build_world(spec, 42);

    // Let the policy place at least one order.
    for _ in 0..3 {
        world.step().unwrap();
    }
    let Policy::ScienceGrowth(policy) = &world.policy.policies[0] else {
        panic!("policy variant changed");
    };
    let in_flight_before: u32 = policy.pipeline.iter().map(|o| o.quantity).sum();
    assert!(in_flight_before > 0);

    // A finished rover module retires pipeline quantity and grows the fleet.
    world.bus.publish(proxima::events::EventPayload::ModuleCompleted {
        recipient: proxima::core::types::SectorId::Science,
        module_id: "comp_science_rover".to_string(),
        quantity: 1,
    });
    let fleet_before = world.science.rovers.len();
    world.step().unwrap();

    let Policy::ScienceGrowth(policy) = &world.policy.policies[0] else {
        panic!("policy variant changed");
    };
    let in_flight_after: u32 = policy.pipeline.iter().map(|o| o.quantity).sum();
    assert_eq!(world.science.rovers.len(), fleet_before + 1);
    assert!(in_flight_after < in_flight_before + 1);
}

#[test]
fn test_maintenance_restores_faulted_agents() {
    let maintenance = MaintenancePolicy {
        interval_steps: 4,
        ..MaintenancePolicy::default()
    };
    let spec = WorldSpec {
        policies: PolicyEngine::new(vec![Policy::Maintenance(maintenance)]),
        ..WorldSpec::default()
    };
    let mut world = build_world(spec, 42);

    world.science.rovers[0].lifecycle.fault();
    world.science.rovers[1].lifecycle.fault();
    assert_eq!(
        world
            .science
            .rovers
            .iter()
            .filter(|r| r.lifecycle.state == AgentState::Fault)
            .count(),
        2
    );

    // The next maintenance window repairs both.
    for _ in 0..5 {
        world.step().unwrap();
    }
    assert_eq!(
        world
            .science
            .rovers
            .iter()
            .filter(|r| r.lifecycle.state == AgentState::Fault)
            .count(),
        0
    );
}
