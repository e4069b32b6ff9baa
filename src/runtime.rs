//! Wiring of model, scene, simulated controllers, coordinator and action server

use crate::config::TrajexecConfig;
use crate::sim::SimulatedDispatcher;
use std::sync::Arc;
use tracing::info;
use trajexec_core::{ExecuteSolutionFeedback, Solution};
use trajexec_exec::{
    ExecutablePlan, ExecutionCoordinator, FeedbackSink, InMemorySceneMonitor, PlanBuilder, SceneMonitor,
    SequentialEngine,
};
use trajexec_gateway::{ActionClient, ActionServer};
use trajexec_model::RobotModel;

pub struct Runtime {
    model: Arc<RobotModel>,
    scene: Arc<InMemorySceneMonitor>,
    dispatcher: Arc<SimulatedDispatcher>,
    server: ActionServer,
}

impl Runtime {
    /// Assemble everything for `model`. The action server still has to be initialized.
    pub fn new(model: RobotModel, config: &TrajexecConfig) -> Self {
        let model = Arc::new(model);
        let scene = Arc::new(InMemorySceneMonitor::new(model.clone()));
        let dispatcher = Arc::new(
            SimulatedDispatcher::new(scene.clone())
                .with_time_scale(config.simulation.time_scale)
                .with_failing_controllers(config.simulation.failing_controllers.iter().cloned()),
        );

        let coordinator = if config.execution.allow_trajectory_execution {
            let engine = Arc::new(SequentialEngine::new(dispatcher.clone()));
            ExecutionCoordinator::new(scene.clone(), engine)
        } else {
            info!("Trajectory execution is disabled");
            ExecutionCoordinator::without_execution(scene.clone())
        };
        let server = ActionServer::new(Arc::new(coordinator), config.server.clone());

        Self {
            model,
            scene,
            dispatcher,
            server,
        }
    }

    pub fn model(&self) -> &Arc<RobotModel> {
        &self.model
    }

    pub fn scene(&self) -> &Arc<InMemorySceneMonitor> {
        &self.scene
    }

    pub fn dispatcher(&self) -> &Arc<SimulatedDispatcher> {
        &self.dispatcher
    }

    pub fn server(&self) -> &ActionServer {
        &self.server
    }

    pub fn client(&self) -> ActionClient {
        self.server.client()
    }

    /// Build the plan for `solution` from the current scene without executing it.
    pub async fn check(&self, solution: &Solution) -> trajexec_core::Result<ExecutablePlan> {
        let sink: Arc<dyn FeedbackSink> = Arc::new(|_: ExecuteSolutionFeedback| {});
        let builder = PlanBuilder::new(self.scene.clone(), sink);
        builder.build(solution, self.scene.current_state().await)
    }
}
