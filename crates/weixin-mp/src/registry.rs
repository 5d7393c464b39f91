use crate::factory::HandlerFactoryRegistry;
use crate::handler::{EchoHandler, shared};

pub async fn register_default_handlers(registry: &HandlerFactoryRegistry) {
    register_echo(registry).await;
}

async fn register_echo(registry: &HandlerFactoryRegistry) {
    registry
        .register("echo", || Ok(shared(EchoHandler::new())))
        .await;
}
