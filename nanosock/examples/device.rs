//! A forwarding device between a PUSH front end and PULL workers.
//!
//! Run with: `cargo run --example device`

use nanosock::{create_device, create_socket, SocketOptions};
use std::rc::Rc;
use std::time::Duration;

#[compio::main]
async fn main() -> nanosock::Result<()> {
    nanosock::dev_tracing::init_tracing();

    let raw = || SocketOptions::new().with_raw(true);
    let frontend = create_socket("pull", raw())?;
    let backend = create_socket("push", raw())?;
    frontend.bind("inproc://jobs")?;
    backend.bind("inproc://workers")?;

    let device = create_device(&frontend, Some(&backend))?;

    for id in 0..2 {
        let worker = Rc::new(create_socket("pull", SocketOptions::default())?);
        worker.connect("inproc://workers")?;
        let jobs = worker.reader()?;
        compio::runtime::spawn(async move {
            let _keep = worker;
            while let Some(job) = jobs.recv().await {
                println!("worker {id}: {}", String::from_utf8_lossy(&job));
            }
        })
        .detach();
    }

    let producer = create_socket("push", SocketOptions::default())?;
    producer.connect("inproc://jobs")?;
    for n in 0..6 {
        producer.write(format!("job {n}"))?;
    }

    compio::time::sleep(Duration::from_millis(100)).await;
    println!("device running: {}", device.is_running());
    Ok(())
}
