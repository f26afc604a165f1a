//! Publish/subscribe with a topic filter and the event stream.
//!
//! Run with: `cargo run --example pubsub`
//! Set `RUST_LOG=nanosock=trace` to watch the poll cycle.

use futures::StreamExt;
use nanosock::options::{SUB, SUB_SUBSCRIBE};
use nanosock::{create_socket, SocketEvent, SocketOptions};
use std::time::Duration;

#[compio::main]
async fn main() -> nanosock::Result<()> {
    nanosock::dev_tracing::init_tracing();

    let publisher = create_socket("pub", SocketOptions::default())?;
    let subscriber = create_socket("sub", SocketOptions::default())?;
    subscriber.set_option(SUB, SUB_SUBSCRIBE, "weather.")?;

    publisher.bind("tcp://127.0.0.1:5560")?;
    subscriber.connect("tcp://127.0.0.1:5560")?;

    let events = subscriber.events();
    let mut updates = std::pin::pin!(subscriber.reader()?.into_stream());

    for (topic, value) in [("weather.oslo", "-3C"), ("sports.final", "2-1"), ("weather.lima", "19C")] {
        publisher.write(format!("{topic} {value}"))?;
    }

    for _ in 0..2 {
        match compio::time::timeout(Duration::from_secs(1), updates.next()).await {
            Ok(Some(msg)) => println!("update: {}", String::from_utf8_lossy(&msg)),
            _ => break,
        }
    }

    let status = subscriber.close()?;
    for event in events.try_iter() {
        if let SocketEvent::Close = event {
            println!("subscriber closed: {status:?}");
        }
    }
    Ok(())
}
