//! A three-executor chain: `A -> B -> C`, each uppercasing and forwarding its input.
//!
//! Run with: cargo run --example simple_graph

use std::sync::Arc;

use workflow_core::{
    Executor, ExecutorContext, Handler, HandlerFuture, HandlerInputKind, HandlerOutputKind, Payload, WorkflowBuilder,
};

struct Uppercase;

impl Handler for Uppercase {
    fn call<'a>(&'a self, payload: Arc<dyn Payload>, ctx: &'a ExecutorContext<'a>) -> HandlerFuture<'a> {
        Box::pin(async move {
            let text = payload.as_any().downcast_ref::<String>().ok_or("expected a String payload")?;
            ctx.send_message(text.to_uppercase()).await;
            Ok(())
        })
    }
}

fn uppercasing_executor(id: &str) -> Executor {
    let mut executor = Executor::new(id);
    executor.register_handler(HandlerInputKind::exact::<String>(), HandlerOutputKind::exact::<String>(), Uppercase);
    executor
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut builder = WorkflowBuilder::new();
    builder
        .add_executor(uppercasing_executor("a"))
        .add_executor(uppercasing_executor("b"))
        .add_executor(uppercasing_executor("c"))
        .set_start_executor("a")
        .add_chain(&["a", "b", "c"]);

    let workflow = builder.build()?;
    let result = workflow.run_to_completion(Arc::new("hi".to_string())).await?;

    println!("status: {:?}", result.status);
    for event in &result.events {
        println!("{event:?}");
    }
    Ok(())
}
