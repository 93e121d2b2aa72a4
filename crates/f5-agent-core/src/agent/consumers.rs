//! Message consumer pool
//!
//! Workers pull notifications from one shared stream and hand them to the
//! dispatcher. Dispatch happens outside the stream lock, so handlers run
//! concurrently with each other and with the reconciliation cycle.

use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_stream::{Stream, StreamExt};
use tracing::debug;

use crate::inbox::NotificationDispatcher;
use crate::traits::Notification;

type NotificationStream = Pin<Box<dyn Stream<Item = Notification> + Send + 'static>>;

/// Spawn `workers` consumers draining `stream` into `dispatcher`
///
/// Consumers stop when `shutdown` turns true or the stream ends.
pub fn spawn_consumers(
    stream: NotificationStream,
    dispatcher: Arc<NotificationDispatcher>,
    workers: usize,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let stream = Arc::new(Mutex::new(stream));

    (0..workers.max(1))
        .map(|worker| {
            let stream = Arc::clone(&stream);
            let dispatcher = Arc::clone(&dispatcher);
            let mut shutdown = shutdown.clone();

            tokio::spawn(async move {
                loop {
                    let next = tokio::select! {
                        notification = async { stream.lock().await.next().await } => notification,
                        _ = shutdown.wait_for(|&stop| stop) => break,
                    };
                    match next {
                        Some(notification) => {
                            debug!("Consumer {} received {}", worker, notification.topic());
                            dispatcher.dispatch(&notification);
                        }
                        None => {
                            debug!("Notification stream ended, consumer {} exiting", worker);
                            break;
                        }
                    }
                }
            })
        })
        .collect()
}
