use crate::exploration::ExplorationSchedule;

fn assert_close(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {}, got {}",
        expected,
        actual
    );
}

#[test]
fn test_linear_decay() {
    let schedule = ExplorationSchedule::new(0.5, 0.05, 100);
    assert_close(schedule.epsilon(0), 0.5);
    assert_close(schedule.epsilon(50), 0.275);
    assert_close(schedule.epsilon(100), 0.05);
    assert_close(schedule.epsilon(200), 0.05);
}

#[test]
fn test_never_increases() {
    let schedule = ExplorationSchedule::new(1.0, 0.1, 1000);
    let mut previous = schedule.epsilon(0);
    for frame in 1..1500 {
        let epsilon = schedule.epsilon(frame);
        assert!(epsilon <= previous);
        assert!(epsilon >= 0.1);
        previous = epsilon;
    }
}

#[test]
fn test_constant_schedule() {
    let schedule = ExplorationSchedule::new(0.2, 0.2, 10);
    for frame in [0, 5, 10, 1_000_000] {
        assert_close(schedule.epsilon(frame), 0.2);
    }
}
