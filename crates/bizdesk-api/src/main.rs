use bizdesk_api::setup;
use bizdesk_core::Config;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let (state, router) = setup::initialize_app(config.clone()).await?;

    let cleanup = state.cleanup.clone().start();

    let result = setup::server::start_server(&config, router).await;

    if let Some(handle) = cleanup {
        handle.abort();
    }

    result
}
