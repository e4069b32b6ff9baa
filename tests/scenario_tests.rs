//! End-to-end scenarios: solution in through the action server, simulated controllers underneath

use std::time::Duration;
use trajexec::{Runtime, TrajexecConfig};
use trajexec_core::{
    ErrorCode, ExecuteSolutionFeedback, ExecuteSolutionGoal, GoalOutcome, GoalStatus, JointTrajectory,
    RobotStateMsg, SceneDiff, Solution, SubTrajectory, TrajectoryMsg,
};
use trajexec_gateway::GoalHandle;
use trajexec_model::RobotModel;

const PANDA_YAML: &str = include_str!("../demos/panda.yaml");
const PICK_PLACE_JSON: &str = include_str!("../demos/pick_place.json");

const ARM: [&str; 7] = [
    "panda_joint1",
    "panda_joint2",
    "panda_joint3",
    "panda_joint4",
    "panda_joint5",
    "panda_joint6",
    "panda_joint7",
];

// ===========================================================================
// Helpers
// ===========================================================================

fn fast_config() -> TrajexecConfig {
    let mut config = TrajexecConfig::default();
    config.simulation.time_scale = 0.0;
    config
}

fn runtime(config: &TrajexecConfig) -> Runtime {
    let runtime = Runtime::new(RobotModel::from_yaml_str(PANDA_YAML).unwrap(), config);
    runtime.server().initialize().unwrap();
    runtime
}

fn arm_motion(value: f64, seconds: f64) -> SubTrajectory {
    SubTrajectory::new(TrajectoryMsg::single_dof(
        JointTrajectory::new(ARM).point(vec![value; 7], seconds),
    ))
    .with_controllers(["panda_arm_controller"])
}

async fn collect(mut handle: GoalHandle) -> (Vec<ExecuteSolutionFeedback>, GoalOutcome) {
    let mut feedback = Vec::new();
    while let Some(fb) = handle.next_feedback().await {
        feedback.push(fb);
    }
    (feedback, handle.wait().await.unwrap())
}

// ===========================================================================
// Scenarios
// ===========================================================================

#[tokio::test]
async fn three_segments_succeed() {
    let runtime = runtime(&fast_config());
    let goal = ExecuteSolutionGoal::new(Solution::new(vec![
        arm_motion(0.1, 0.5),
        arm_motion(0.2, 0.5),
        arm_motion(0.3, 0.5),
    ]));

    let (feedback, outcome) = collect(runtime.client().send_goal(goal).unwrap()).await;

    let labels: Vec<String> = feedback.iter().map(ToString::to_string).collect();
    assert_eq!(labels, vec!["1/3", "2/3", "3/3"]);
    assert_eq!(outcome.status, GoalStatus::Succeeded);
    assert_eq!(outcome.text, "SUCCESS");
    assert_eq!(runtime.dispatcher().dispatched(), 3);
    assert_eq!(
        runtime.scene().snapshot().await.robot_state.position("panda_joint4"),
        Some(0.3)
    );
    runtime.server().shutdown().await;
}

#[tokio::test]
async fn unknown_joint_in_second_segment_aborts_before_execution() {
    let runtime = runtime(&fast_config());
    let stray = SubTrajectory::new(TrajectoryMsg::single_dof(
        JointTrajectory::new(["panda_joint1", "conveyor_joint"]).point(vec![0.0, 1.0], 1.0),
    ));
    let goal = ExecuteSolutionGoal::new(Solution::new(vec![
        arm_motion(0.1, 0.5),
        stray,
        arm_motion(0.3, 0.5),
    ]));

    let (feedback, outcome) = collect(runtime.client().send_goal(goal).unwrap()).await;

    assert!(feedback.is_empty());
    assert_eq!(outcome.status, GoalStatus::Aborted);
    assert_eq!(outcome.code(), ErrorCode::InvalidMotionPlan);
    assert!(outcome.text.contains("conveyor_joint"), "text: {}", outcome.text);
    assert!(outcome.text.contains("2/3"), "text: {}", outcome.text);
    assert_eq!(runtime.dispatcher().dispatched(), 0);
    runtime.server().shutdown().await;
}

#[tokio::test]
async fn disabled_execution_aborts_immediately() {
    let mut config = fast_config();
    config.execution.allow_trajectory_execution = false;
    let runtime = runtime(&config);

    let goal = ExecuteSolutionGoal::new(Solution::new(vec![arm_motion(0.1, 0.5)]));
    let (feedback, outcome) = collect(runtime.client().send_goal(goal).unwrap()).await;

    assert!(feedback.is_empty());
    assert_eq!(outcome.status, GoalStatus::Aborted);
    assert_eq!(outcome.code(), ErrorCode::ControlFailed);
    assert!(outcome.text.contains("execution disabled"));
    assert_eq!(runtime.dispatcher().dispatched(), 0);
    runtime.server().shutdown().await;
}

#[tokio::test]
async fn preemption_after_first_of_three_segments() {
    let mut config = TrajexecConfig::default();
    config.simulation.time_scale = 1.0;
    let runtime = runtime(&config);

    // first segment finishes instantly, the second one takes long enough to be preempted
    let goal = ExecuteSolutionGoal::new(Solution::new(vec![
        arm_motion(0.1, 0.0),
        arm_motion(0.2, 60.0),
        arm_motion(0.3, 60.0),
    ]));
    let mut handle = runtime.client().send_goal(goal).unwrap();

    let first = handle.next_feedback().await.unwrap();
    assert_eq!(first.to_string(), "1/3");
    handle.cancel();

    let (rest, outcome) = tokio::time::timeout(Duration::from_secs(10), collect(handle))
        .await
        .expect("preempted goal must finish promptly");
    assert!(rest.is_empty());
    assert_eq!(outcome.status, GoalStatus::Preempted);
    assert_eq!(outcome.code(), ErrorCode::Preempted);
    assert_eq!(runtime.dispatcher().dispatched(), 2);
    runtime.server().shutdown().await;
}

#[tokio::test]
async fn pick_and_place_updates_scene() {
    let runtime = runtime(&fast_config());
    let solution = Solution::from_json(PICK_PLACE_JSON).unwrap();

    let (feedback, outcome) = collect(runtime.client().send_goal(ExecuteSolutionGoal::new(solution)).unwrap()).await;

    assert_eq!(outcome.status, GoalStatus::Succeeded);
    assert_eq!(feedback.len(), 5);
    assert_eq!(runtime.dispatcher().dispatched(), 3);

    let scene = runtime.scene().snapshot().await;
    assert!(scene.robot_state.attached_body("cup").is_some());
    assert!(!scene.objects.contains_key("cup"));
    assert!(scene.is_collision_allowed("panda_leftfinger", "cup"));
    assert_eq!(scene.robot_state.position("panda_finger_joint1"), Some(0.015));
    assert_eq!(scene.robot_state.position("panda_joint6"), Some(1.8));
    assert_eq!(scene.revision, 2);
    runtime.server().shutdown().await;
}

#[tokio::test]
async fn failing_controller_halts_remaining_segments() {
    let mut config = fast_config();
    config.simulation.failing_controllers = vec!["hand_controller".into()];
    let runtime = runtime(&config);
    let solution = Solution::from_json(PICK_PLACE_JSON).unwrap();

    let (feedback, outcome) = collect(runtime.client().send_goal(ExecuteSolutionGoal::new(solution)).unwrap()).await;

    assert_eq!(outcome.status, GoalStatus::Aborted);
    assert_eq!(outcome.code(), ErrorCode::ControlFailed);
    assert!(outcome.text.contains("hand_controller"), "text: {}", outcome.text);
    assert_eq!(feedback.len(), 2);
    assert_eq!(runtime.dispatcher().dispatched(), 2);
    let scene = runtime.scene().snapshot().await;
    assert!(scene.robot_state.attached_body("cup").is_none());
    assert!(scene.objects.contains_key("cup"));
    runtime.server().shutdown().await;
}

#[tokio::test]
async fn joint_only_diff_is_not_submitted() {
    let runtime = runtime(&fast_config());
    let diff = SceneDiff::partial()
        .with_robot_state(RobotStateMsg::default().with_joint_positions([("panda_joint1", 2.5)]));
    let goal = ExecuteSolutionGoal::new(Solution::new(vec![
        arm_motion(0.1, 0.5).with_scene_diff(diff),
        arm_motion(0.2, 0.5),
    ]));

    let (feedback, outcome) = collect(runtime.client().send_goal(goal).unwrap()).await;

    assert_eq!(outcome.status, GoalStatus::Succeeded);
    assert_eq!(feedback.len(), 2);
    let scene = runtime.scene().snapshot().await;
    assert_eq!(scene.revision, 0);
    assert_eq!(scene.robot_state.position("panda_joint1"), Some(0.2));
    runtime.server().shutdown().await;
}

#[tokio::test]
async fn failing_scene_effect_aborts_with_failure() {
    let runtime = runtime(&fast_config());
    let solution = Solution::from_json(
        r#"{ "sub_trajectory": [
            { "scene_diff": { "is_diff": true,
                "world": { "collision_objects": [ { "id": "ghost", "operation": "remove" } ] } } },
            { "scene_diff": { "is_diff": true, "allowed_collisions": [ { "first": "a", "second": "b", "allowed": true } ] } }
        ] }"#,
    )
    .unwrap();

    let (feedback, outcome) = collect(runtime.client().send_goal(ExecuteSolutionGoal::new(solution)).unwrap()).await;

    // feedback precedes the failed submission
    assert_eq!(feedback.len(), 1);
    assert_eq!(outcome.status, GoalStatus::Aborted);
    assert_eq!(outcome.code(), ErrorCode::Failure);
    assert!(outcome.text.contains("ghost"), "text: {}", outcome.text);
    assert!(!runtime.scene().snapshot().await.is_collision_allowed("a", "b"));
    runtime.server().shutdown().await;
}

#[tokio::test]
async fn absurd_trajectory_time_is_rejected_and_server_stays_usable() {
    let runtime = runtime(&fast_config());
    let goal = ExecuteSolutionGoal::new(Solution::new(vec![arm_motion(0.1, 1e20)]));

    let (_, outcome) = collect(runtime.client().send_goal(goal).unwrap()).await;
    assert_eq!(outcome.status, GoalStatus::Aborted);
    assert_eq!(outcome.code(), ErrorCode::InvalidMotionPlan);
    assert_eq!(runtime.dispatcher().dispatched(), 0);

    let goal = ExecuteSolutionGoal::new(Solution::new(vec![arm_motion(0.2, 0.5)]));
    let (_, outcome) = collect(runtime.client().send_goal(goal).unwrap()).await;
    assert_eq!(outcome.status, GoalStatus::Succeeded);
    runtime.server().shutdown().await;
}

#[tokio::test]
async fn check_builds_plan_without_executing() {
    let runtime = Runtime::new(RobotModel::from_yaml_str(PANDA_YAML).unwrap(), &fast_config());
    let plan = runtime
        .check(&Solution::from_json(PICK_PLACE_JSON).unwrap())
        .await
        .unwrap();

    let groups: Vec<Option<&str>> = plan.segments().iter().map(|s| s.trajectory.group_name()).collect();
    assert_eq!(groups, vec![None, Some("panda_arm"), Some("hand"), None, Some("panda_arm")]);
    assert!((plan.duration().as_secs_f64() - 2.1).abs() < 1e-6);
    assert_eq!(runtime.dispatcher().dispatched(), 0);
}

// ===========================================================================
// Config files
// ===========================================================================

#[test]
fn config_loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trajexec.toml");
    std::fs::write(
        &path,
        "[simulation]\ntime_scale = 0.25\n\n[server]\nname = \"bench_executor\"\n",
    )
    .unwrap();

    let config = TrajexecConfig::load(&path);
    assert_eq!(config.simulation.time_scale, 0.25);
    assert_eq!(config.server.name, "bench_executor");
    assert!(config.execution.allow_trajectory_execution);
}

#[test]
fn broken_or_missing_config_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let broken = dir.path().join("broken.toml");
    std::fs::write(&broken, "[simulation\ntime_scale = ").unwrap();

    assert_eq!(TrajexecConfig::load(&broken), TrajexecConfig::default());
    assert_eq!(
        TrajexecConfig::load(&dir.path().join("missing.toml")),
        TrajexecConfig::default()
    );
}

#[test]
fn demo_config_parses() {
    let config: TrajexecConfig = toml::from_str(include_str!("../demos/trajexec.toml")).unwrap();
    assert_eq!(config.simulation.time_scale, 0.5);
}
