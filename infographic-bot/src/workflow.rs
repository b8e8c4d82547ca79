use stage_flow::{FlowRunner, Graph, GraphBuilder};
use std::sync::Arc;

use crate::{
    deps::Deps,
    models::{ConversationState, Turn},
    tasks::{
        ApprovalTask, GeneratingTask, MarketplaceTask, PhotoTask, QuantityTask, StyleTask,
        VariationTask,
    },
};

/// Stage table for the configured flow variant. The photo stage is the entry point.
pub fn build_workflow(deps: &Deps) -> Graph<ConversationState, Turn> {
    let mut builder = GraphBuilder::new("infographic")
        .add_task(Arc::new(PhotoTask::new(deps.clone())))
        .add_task(Arc::new(ApprovalTask))
        .add_task(Arc::new(MarketplaceTask::new(deps.variant)))
        .add_task(Arc::new(QuantityTask::new(deps.clone())));

    if deps.variant.asks_variation() {
        builder = builder.add_task(Arc::new(VariationTask));
    }
    if deps.variant.asks_style() {
        builder = builder.add_task(Arc::new(StyleTask::new(deps.clone())));
    }

    builder
        .add_task(Arc::new(GeneratingTask::new(deps.jobs.clone())))
        .build()
}

pub fn create_flow_runner(deps: &Deps) -> FlowRunner<ConversationState, Turn> {
    FlowRunner::new(Arc::new(build_workflow(deps)), deps.storage.clone())
}
