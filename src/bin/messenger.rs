//! Messenger: publishes each stdin line to a Redis channel and prints the
//! messages other users publish there.

use anyhow::{anyhow, Context};
use tokio::io::BufReader;
use tracing::{error, info, warn};

use store_services::logging::{self, LogTarget};
use store_services::messaging::{Identity, LoopExit, Publisher, StdoutSink, SubscriberLoop};
use store_services::shutdown::wait_for_os_signal;
use store_services::store::RedisConnector;
use store_services::{MessengerConfig, ServiceError, ShutdownCoordinator};

#[tokio::main]
async fn main() {
    logging::init(LogTarget::Stderr);

    let code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            error!("{:#}", e);
            1
        }
    };
    // A pending stdin read holds a blocking thread that would keep the
    // runtime from shutting down.
    std::process::exit(code);
}

async fn run() -> anyhow::Result<()> {
    let config = MessengerConfig::from_env().context("invalid configuration")?;
    let identity = Identity::new(config.user_id.as_str())?;
    let connector = RedisConnector::new(&config.store_address)?;
    let coordinator = ShutdownCoordinator::new();
    info!(
        "Joining channel {} on {} as {}",
        config.channel,
        config.store_address,
        identity.id()
    );

    let subscriber = SubscriberLoop::new(
        connector.clone(),
        config.channel.as_str(),
        identity.clone(),
        StdoutSink,
        coordinator.signal(),
    )
    .with_receive_timeout(config.receive_timeout)
    .spawn(&coordinator);

    let connected = Publisher::connect(&connector, config.channel.as_str(), identity).await;
    let mut publisher = match connected {
        Ok(publisher) => publisher,
        Err(e) => {
            coordinator.shutdown(config.shutdown_timeout).await;
            return Err(e).context("failed to create store client for publish");
        }
    };

    let trigger = coordinator.clone();
    let signal = coordinator.signal();
    coordinator.spawn("os-signals", async move {
        tokio::select! {
            _ = wait_for_os_signal() => {
                trigger.trigger();
            }
            _ = signal.cancelled() => {}
        }
    });

    let stdin = BufReader::new(tokio::io::stdin());
    let outcome = publisher.run(stdin, &coordinator.signal()).await;

    coordinator.shutdown(config.shutdown_timeout).await;
    if subscriber.is_finished() {
        match subscriber.join().await {
            Ok(LoopExit::Stopped) => {}
            Ok(LoopExit::Failed(e)) => warn!("Subscriber had failed: {}", e),
            Err(e) => warn!("Subscriber task panicked: {}", e),
        }
    }

    match outcome {
        Ok(()) => {
            info!("Messenger stopped");
            Ok(())
        }
        Err(ServiceError::InputExhausted) => Err(anyhow!("end of input reached")),
        Err(e) => Err(e).context("error reading or publishing input"),
    }
}
