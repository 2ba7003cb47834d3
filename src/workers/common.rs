use tokio::sync::watch;
use tokio::time::{sleep, Duration};

use crate::WorkerDetail;

/// Builds the worker identity used as the `[name id model]` log prefix.
pub fn worker_detail(name: &str, id: i16, model: &str) -> WorkerDetail {
    WorkerDetail {
        name: name.to_string(),
        id,
        model: model.to_string(),
    }
}

/// Sleeps for `delay`, waking early if cancellation is requested.
///
/// Returns `true` if the job was cancelled before or during the pause.
pub async fn pause_unless_cancelled(delay: Duration, cancel: &mut watch::Receiver<bool>) -> bool {
    if *cancel.borrow() {
        return true;
    }
    if delay.is_zero() {
        return false;
    }
    let pause = sleep(delay);
    tokio::pin!(pause);
    tokio::select! {
        _ = &mut pause => *cancel.borrow(),
        changed = cancel.changed() => match changed {
            Ok(()) => *cancel.borrow(),
            // Sender gone: nobody can cancel any more, finish the pause.
            Err(_) => {
                pause.await;
                false
            }
        },
    }
}
