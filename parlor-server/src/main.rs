use parlor_core::{run_presence_sweeper, Config};
use parlor_impls::memory_chat;
use parlor_server::{init_logger, run_server, ServerContext};

#[tokio::main]
async fn main() {
    init_logger();

    let chat = memory_chat(Config::default());

    // Without this, rooms whose participants vanish ungracefully
    // would report stale counts forever
    tokio::spawn(run_presence_sweeper(chat.context()));

    let context = ServerContext::new(chat);

    run_server(context).await;
}
