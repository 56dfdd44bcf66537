//! End-to-end formation planning: distribute on a surface, transform into
//! the deployment frame, assign agents.

use murmuration_core::config::{AssignmentConfig, DistributionConfig, FrameConfig};
use murmuration_core::Vec3;
use murmuration_swarm::{assign, FrameTransform, PointDistributor, Sphere};

fn unit_sphere() -> Sphere {
    // unit-diameter sphere so the shape fits the [-0.5, 0.5] cube
    Sphere { radius: 0.5 }
}

#[test]
fn test_sphere_formation_lands_in_deployment_box() {
    let sphere = unit_sphere();
    let distributor = PointDistributor::new(&sphere, DistributionConfig::default());
    let formation = distributor.generate(4, 42);
    assert_eq!(formation.len(), 4);

    let transform = FrameTransform::new(&FrameConfig {
        scale: 10.0,
        altitude: 10.0,
    });
    let goals = transform.apply(&formation.points);

    let center = Vec3::new(0.0, 0.0, -10.0);
    for goal in &goals {
        assert!(
            goal.x.abs() <= 5.2 && goal.y.abs() <= 5.2,
            "goal {goal:?} outside horizontal bounds"
        );
        assert!(
            (-15.2..=-4.8).contains(&goal.z),
            "goal {goal:?} outside vertical bounds"
        );
        // and it should actually sit on the scaled sphere shell
        let radial = (goal.distance(center) - 5.0).abs();
        assert!(radial < 0.5, "goal {goal:?} is {radial} off the shell");
    }
}

#[test]
fn test_formation_points_are_distinct_and_assignable() {
    let sphere = unit_sphere();
    let distributor = PointDistributor::new(&sphere, DistributionConfig::default());
    let formation = distributor.generate(6, 11);

    let min_dist = formation.min_pairwise_distance().unwrap();
    assert!(min_dist > 0.05, "formation collapsed: min distance {min_dist}");

    let transform = FrameTransform::new(&FrameConfig::default());
    let goals = transform.apply(&formation.points);

    // agents parked on a line at ground level
    let agents: Vec<Vec3> = (0..6).map(|i| Vec3::new(i as f64, 0.0, 0.0)).collect();
    let assignment = assign(&agents, &goals, &AssignmentConfig::default()).unwrap();
    assert!(assignment.is_bijection());

    // assignment should never beat itself by swapping any single pair
    let base = assignment.total_squared_distance(&agents, &goals);
    for a in 0..6 {
        for b in (a + 1)..6 {
            let mut swapped = assignment.clone();
            swapped.target_of.swap(a, b);
            assert!(base <= swapped.total_squared_distance(&agents, &goals) + 1e-9);
        }
    }
}
