//! Single-task async runner serializing frames and hold-timer expiry

use std::time::Duration;

use alerting::FlagSink;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use crate::session::{DetectorSession, FrameInput};

/// Maps logical frame milliseconds onto the runtime clock
#[derive(Debug, Default)]
struct FrameClock {
    origin: Option<(Instant, u64)>,
}

impl FrameClock {
    fn anchor(&mut self, timestamp_ms: u64) {
        if self.origin.is_none() {
            self.origin = Some((Instant::now(), timestamp_ms));
        }
    }

    fn instant_at(&self, timestamp_ms: u64) -> Option<Instant> {
        self.origin.map(|(instant, origin_ms)| {
            instant + Duration::from_millis(timestamp_ms.saturating_sub(origin_ms))
        })
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Drive `session` from a frame channel until the channel closes.
///
/// The session is started on the first frame's timestamp if it is not
/// already running, and stopped when the channel closes. Hold timers
/// expire on the runtime clock even when no frame arrives.
pub async fn run_session<S: FlagSink>(
    mut session: DetectorSession,
    mut frames: mpsc::Receiver<FrameInput>,
    mut sink: S,
) -> DetectorSession {
    let mut clock = FrameClock::default();
    info!(session_id = %session.id(), "Session runner started");

    loop {
        let deadline = session
            .next_deadline()
            .and_then(|deadline| clock.instant_at(deadline));

        tokio::select! {
            frame = frames.recv() => {
                let Some(frame) = frame else { break };
                let timestamp_ms = frame.timestamp_ms();
                clock.anchor(timestamp_ms);
                if !session.is_running() {
                    session.start(timestamp_ms);
                }
                session.process_frame(frame, &mut sink);
            }
            _ = wait_until(deadline) => {
                debug!("Hold timer fired between frames");
                session.expire_hold();
            }
        }
    }

    session.stop();
    info!(
        session_id = %session.id(),
        frames = session.frames_processed(),
        "Frame channel closed"
    );
    session
}
