//! handlers/event_handler.rs
//! Server-sent events con las notificaciones del scheduler.

use std::convert::Infallible;

use actix_web::web::{self, Bytes};
use actix_web::HttpResponse;
use futures_util::stream;
use tokio::sync::broadcast::error::RecvError;

use crate::models::event_model::LifecycleNotification;
use crate::services::event_sink::BroadcastSink;

pub fn sse_frame(event: &LifecycleNotification) -> Option<Bytes> {
    let data = serde_json::to_string(event).ok()?;
    Some(Bytes::from(format!("event: {}\ndata: {}\n\n", event.name(), data)))
}

/// GET /api/events
pub async fn events_endpoint(sink: web::Data<BroadcastSink>) -> HttpResponse {
    let rx = sink.subscribe();

    let events = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(frame) = sse_frame(&event) {
                        return Some((Ok::<_, Infallible>(frame), rx));
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Suscriptor SSE atrasado, {} evento(s) descartados", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(events)
}
