use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use super::global::with_engine;
use crate::overlay::OverlayKey;

/// Drive [`Engine::tick`](super::Engine::tick) on the installed engine every
/// `period`.
///
/// Must be called from inside a `tokio::task::LocalSet` on the thread that
/// owns the engine. `on_closed` receives the overlays closed by each tick
/// so the host can re-render them. The task ends if the engine is
/// uninstalled.
pub fn spawn_ticker<F>(period: Duration, mut on_closed: F) -> JoinHandle<()>
where
    F: FnMut(&[OverlayKey]) + 'static,
{
    tokio::task::spawn_local(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let Some(closed) = with_engine(|engine| engine.tick()) else {
                tracing::debug!("Engine uninstalled, stopping ticker");
                break;
            };
            if !closed.is_empty() {
                tracing::debug!(count = closed.len(), "Auto-closed overlays");
                on_closed(&closed);
            }
        }
    })
}
