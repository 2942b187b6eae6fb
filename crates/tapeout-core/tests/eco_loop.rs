use std::sync::Arc;
use std::time::Duration;

use tapeout_core::fakes::FakeToolchain;
use tapeout_core::{
    DesignSnapshot, EcoAction, EcoConfig, EcoOptimizer, IterationFailureKind, PathType,
    StopReason, TapeoutError, ToolchainError,
};

const SETUP_VIOLATIONS: &str = "\
Startpoint: in_a (input port clocked by clk)
Endpoint: core/r1 (rising edge-triggered flip-flop clocked by clk)
Path Group: clk
Path Type: max

  -0.30   slack (VIOLATED)

Startpoint: core/r0 (rising edge-triggered flip-flop clocked by clk)
Endpoint: core/r2 (rising edge-triggered flip-flop clocked by clk)
Path Group: clk
Path Type: max

  -0.12   slack (VIOLATED)
";

const HOLD_VIOLATION: &str = "\
Startpoint: core/r3 (rising edge-triggered flip-flop clocked by clk)
Endpoint: core/r4 (rising edge-triggered flip-flop clocked by clk)
Path Group: clk
Path Type: min

  -0.04   slack (VIOLATED)
";

const CLEAN: &str = "No paths found.\n";

fn snapshot() -> DesignSnapshot {
    DesignSnapshot::new("picorv32", "runs/RUN_1")
}

fn optimizer(fake: &Arc<FakeToolchain>, config: EcoConfig) -> EcoOptimizer {
    EcoOptimizer::new(fake.clone(), config).expect("valid config")
}

#[tokio::test]
async fn stalled_run_reports_success_without_meeting_timing() {
    let fake = Arc::new(
        FakeToolchain::new()
            .with_baseline(-0.50, -4.0)
            .then_repair(-0.30, -2.0, 14)
            .then_repair(-0.30, -2.0, 0)
            .with_timing_report(PathType::Setup, SETUP_VIOLATIONS)
            .with_timing_report(PathType::Hold, CLEAN),
    );

    let result = optimizer(&fake, EcoConfig::default())
        .run(&snapshot())
        .await
        .expect("run");

    assert_eq!(result.stop_reason, StopReason::Converged);
    assert!(result.converged);
    assert!(!result.timing_met);
    // success = timing_met || converged: a stalled run still counts.
    assert!(result.success());
    assert_eq!(result.iterations.len(), 2);
    assert!(!result.remaining_recommendations.is_empty());
    assert!(result.analysis_conclusive);
}

#[tokio::test]
async fn target_met_run_has_no_recommendations() {
    let fake = Arc::new(
        FakeToolchain::new()
            .with_baseline(-0.20, -1.0)
            .then_repair(0.02, 0.0, 9)
            .with_timing_report(PathType::Setup, CLEAN)
            .with_timing_report(PathType::Hold, HOLD_VIOLATION),
    );

    let result = optimizer(&fake, EcoConfig::default())
        .run(&snapshot())
        .await
        .expect("run");

    assert!(result.timing_met);
    assert!(result.success());
    assert_eq!(result.stop_reason, StopReason::TargetMet);
    assert!(result.remaining_recommendations.is_empty());
    assert_eq!(result.remaining_violations.len(), 1);
}

#[tokio::test]
async fn iteration_history_never_exceeds_max_iterations() {
    for max_iterations in 1..=5u32 {
        let mut fake = FakeToolchain::new()
            .with_baseline(-2.0, -40.0)
            .with_timing_report(PathType::Setup, SETUP_VIOLATIONS)
            .with_timing_report(PathType::Hold, CLEAN);
        for i in 1..=10 {
            fake = fake.then_repair(-2.0 + 0.1 * i as f64, -40.0 + i as f64, 5);
        }
        let fake = Arc::new(fake);
        let config = EcoConfig {
            max_iterations,
            stop_on_convergence: false,
            ..Default::default()
        };

        let result = optimizer(&fake, config).run(&snapshot()).await.expect("run");
        assert_eq!(result.iterations.len(), max_iterations as usize);
        assert_eq!(fake.repair_calls(), max_iterations as usize);
        assert_eq!(result.stop_reason, StopReason::MaxIterationsReached);
    }
}

#[tokio::test]
async fn before_values_carry_forward_from_previous_after() {
    let fake = Arc::new(
        FakeToolchain::new()
            .with_baseline(-1.0, -10.0)
            .then_repair(-0.6, -6.0, 10)
            .then_repair(-0.3, -2.5, 7)
            .then_repair(-0.1, -0.4, 3),
    );

    let result = optimizer(&fake, EcoConfig::default())
        .run(&snapshot())
        .await
        .expect("run");

    let it = &result.iterations;
    assert_eq!(it[0].before_wns_ns, -1.0);
    for pair in it.windows(2) {
        assert_eq!(pair[1].before_wns_ns, pair[0].after_wns_ns);
        assert_eq!(pair[1].before_tns_ns, pair[0].after_tns_ns);
    }
    assert_eq!(result.total_fixes_applied, 20);
    assert_eq!(result.final_wns_ns, -0.1);
}

#[tokio::test]
async fn regression_is_recorded_not_clamped() {
    let fake = Arc::new(
        FakeToolchain::new()
            .with_baseline(-0.20, -1.0)
            .then_repair(-0.35, -1.8, 4)
            .then_repair(-0.35, -1.8, 0),
    );

    let result = optimizer(&fake, EcoConfig::default())
        .run(&snapshot())
        .await
        .expect("run");

    let first = &result.iterations[0];
    assert_eq!(first.after_wns_ns, -0.35);
    assert!(first.after_wns_ns < first.before_wns_ns);
    assert_eq!(result.final_wns_ns, -0.35);
    assert!(result.wns_improvement_ns() < 0.0);
}

#[tokio::test]
async fn failed_repair_is_a_failed_iteration_not_no_change() {
    let fake = Arc::new(
        FakeToolchain::new()
            .with_baseline(-0.50, -3.0)
            .then_repair_error(ToolchainError::invocation("openroad", "exit status 1"))
            .then_repair(-0.25, -1.0, 8)
            .then_repair(-0.25, -1.0, 0),
    );

    let result = optimizer(&fake, EcoConfig::default())
        .run(&snapshot())
        .await
        .expect("run");

    let failed = &result.iterations[0];
    let failure = failed.failure.as_ref().expect("first iteration failed");
    assert_eq!(failure.kind, IterationFailureKind::Invocation);
    assert_eq!(failed.fixes_applied, 0);
    assert!(!failed.converged, "a failure is never convergence");
    assert_eq!(failed.after_wns_ns, failed.before_wns_ns);

    assert_eq!(result.iterations[1].before_wns_ns, -0.50);
    assert!(!result.iterations[1].failed());
    assert_eq!(result.failed_iterations(), 1);
    assert_eq!(result.stop_reason, StopReason::Converged);
}

#[tokio::test]
async fn consecutive_failures_stop_with_tool_failure() {
    let fake = Arc::new(
        FakeToolchain::new()
            .with_baseline(-0.50, -3.0)
            .then_repair_error(ToolchainError::invocation("openroad", "segfault"))
            .then_repair_error(ToolchainError::invocation("openroad", "segfault"))
            .then_repair(-0.1, -0.2, 30),
    );
    let config = EcoConfig {
        max_consecutive_failures: 2,
        ..Default::default()
    };

    let result = optimizer(&fake, config).run(&snapshot()).await.expect("run");

    assert_eq!(result.stop_reason, StopReason::ToolFailure);
    assert_eq!(result.iterations.len(), 2);
    assert!(!result.converged);
    assert!(!result.success());
    assert_eq!(result.final_wns_ns, -0.50);
}

#[tokio::test(start_paused = true)]
async fn timed_out_repair_is_distinguished_from_invocation_failure() {
    let fake = Arc::new(
        FakeToolchain::new()
            .with_baseline(-0.50, -3.0)
            .then_slow_repair(Duration::from_secs(600), 0.0, 0.0, 50)
            .then_repair(-0.10, -0.3, 6)
            .then_repair(-0.10, -0.3, 0),
    );
    let config = EcoConfig {
        iteration_timeout_secs: 5,
        ..Default::default()
    };

    let result = optimizer(&fake, config).run(&snapshot()).await.expect("run");

    let failure = result.iterations[0].failure.as_ref().expect("timed out");
    assert_eq!(failure.kind, IterationFailureKind::Timeout);
    assert_eq!(result.iterations[0].after_wns_ns, -0.50);
    assert_eq!(result.iterations[1].after_wns_ns, -0.10);
}

#[tokio::test]
async fn sentinel_is_not_a_measurement() {
    let fake = Arc::new(
        FakeToolchain::new()
            .with_baseline(-0.40, -2.0)
            .then_sentinel()
            .then_repair(-0.20, -1.0, 5)
            .then_repair(-0.20, -1.0, 0),
    );

    let result = optimizer(&fake, EcoConfig::default())
        .run(&snapshot())
        .await
        .expect("run");

    let first = &result.iterations[0];
    assert_eq!(
        first.failure.as_ref().map(|f| f.kind),
        Some(IterationFailureKind::Sentinel)
    );
    assert_eq!(first.after_wns_ns, -0.40);
    assert!(result.iterations.iter().all(|i| i.after_wns_ns > -999.0));
    assert_eq!(result.final_wns_ns, -0.20);
}

#[tokio::test]
async fn disabled_stop_on_convergence_keeps_iterating() {
    let fake = Arc::new(
        FakeToolchain::new()
            .with_baseline(-0.50, -3.0)
            .then_repair(-0.40, -2.0, 3),
    );
    let config = EcoConfig {
        max_iterations: 4,
        stop_on_convergence: false,
        ..Default::default()
    };

    let result = optimizer(&fake, config).run(&snapshot()).await.expect("run");

    assert_eq!(result.iterations.len(), 4);
    assert_eq!(result.stop_reason, StopReason::MaxIterationsReached);
    assert!(result.iterations[1].converged);
    assert!(result.converged);
}

#[tokio::test]
async fn convergence_is_kept_when_later_iterations_improve() {
    let fake = Arc::new(
        FakeToolchain::new()
            .with_baseline(-0.50, -3.0)
            .then_repair(-0.50, -3.0, 0)
            .then_repair(-0.30, -2.0, 5)
            .then_repair(-0.20, -1.0, 5),
    );
    let config = EcoConfig {
        max_iterations: 3,
        stop_on_convergence: false,
        ..Default::default()
    };

    let result = optimizer(&fake, config).run(&snapshot()).await.expect("run");

    assert_eq!(result.iterations.len(), 3);
    assert_eq!(result.stop_reason, StopReason::MaxIterationsReached);
    let per_iteration: Vec<bool> = result.iterations.iter().map(|i| i.converged).collect();
    assert_eq!(per_iteration, vec![true, false, false]);
    assert!(result.converged);
    assert!(result.success());
}

#[tokio::test]
async fn unreadable_closing_analysis_is_inconclusive() {
    let fake = Arc::new(
        FakeToolchain::new()
            .with_baseline(-0.50, -3.0)
            .then_repair(-0.45, -2.5, 0),
    );

    let result = optimizer(&fake, EcoConfig::default())
        .run(&snapshot())
        .await
        .expect("run");

    assert!(!result.timing_met);
    assert!(!result.analysis_conclusive);
    assert!(result.remaining_recommendations.is_empty());
}

#[tokio::test]
async fn recommendations_follow_disabled_fix_classes() {
    let fake = Arc::new(
        FakeToolchain::new()
            .with_baseline(-0.50, -3.0)
            .then_repair(-0.30, -2.0, 0)
            .with_timing_report(PathType::Setup, SETUP_VIOLATIONS)
            .with_timing_report(PathType::Hold, HOLD_VIOLATION),
    );
    let config = EcoConfig {
        enable_vt_swap: false,
        enable_buffer_insertion: false,
        ..Default::default()
    };

    let result = optimizer(&fake, config).run(&snapshot()).await.expect("run");

    let actions: Vec<EcoAction> = result
        .remaining_recommendations
        .iter()
        .map(|f| f.action)
        .collect();
    assert!(actions.contains(&EcoAction::GateResize));
    assert!(!actions.contains(&EcoAction::VtSwap));
    assert!(!actions.contains(&EcoAction::BufferInsert));
}

#[tokio::test]
async fn invalid_config_is_rejected_before_any_adapter_call() {
    let fake = Arc::new(FakeToolchain::new().with_baseline(-0.5, -3.0));
    let config = EcoConfig {
        max_utilization_pct: 0.0,
        ..Default::default()
    };

    let err = EcoOptimizer::new(fake.clone(), config)
        .err()
        .expect("config must be rejected");
    assert!(matches!(err, TapeoutError::Config(_)));
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn baseline_timeout_is_fatal() {
    let fake = Arc::new(
        FakeToolchain::new().with_baseline_error(ToolchainError::Timeout {
            operation: "repair_timing".to_string(),
            after_secs: 30,
        }),
    );

    let err = optimizer(&fake, EcoConfig::default())
        .run(&snapshot())
        .await
        .expect_err("baseline failure");
    assert!(matches!(
        err,
        TapeoutError::Toolchain(ToolchainError::Timeout { .. })
    ));
}
