//! Walks a managed connection through mount, open, drop, unmount, and remount
//! against the in-process transport, printing the status line at each step.
//!
//! ```text
//! RUST_LOG=chatlink=debug cargo run --example status
//! ```

use chatlink::chat::status_label;
use chatlink::config::ClientConfig;
use chatlink::realtime::local::LocalConnector;
use chatlink::session::ConnectionManager;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let connector = LocalConnector::new();
    let manager = ConnectionManager::new(connector.clone(), ClientConfig::from_env());
    let accessor = manager.accessor();

    let activation = manager.activate();
    let mut updates = accessor.subscribe()?;
    println!("mounted:      {}", status_label(&updates.borrow()));

    let remote = connector.latest().ok_or("no transport created")?;
    remote.accept("abc123def");
    updates.changed().await?;
    println!("opened:       {}", status_label(&updates.borrow_and_update()));

    remote.drop_connection("transport close");
    updates.changed().await?;
    println!("dropped:      {}", status_label(&updates.borrow_and_update()));
    if let Some(delay) = remote.next_reconnect_delay() {
        println!("reconnect in: {delay:?}");
    }

    activation.release();
    println!("unmounted:    {}", status_label(&manager.state()));

    let _activation = manager.activate();
    println!("remounted:    {}", status_label(accessor.current()?.state()));

    Ok(())
}
