// Booking command boundary
// Every answer is a 200 with the {status, message, content} envelope

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::{header, HeaderMap},
    Json,
};
use tracing::{debug, warn};

use crate::app::AppState;
use crate::db::BookingStore;
use crate::models::{Actor, Envelope};
use crate::services::booking::{BookingCommand, RedeemKind};

/// Session id from `Authorization: Bearer <id>`, if any
pub fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// POST /booking
pub async fn handle_command<S: BookingStore>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    payload: Result<Json<BookingCommand>, JsonRejection>,
) -> Json<Envelope> {
    let command = match payload {
        Ok(Json(command)) => command,
        Err(rejection) => {
            debug!("Rejected booking command: {}", rejection.body_text());
            return Json(Envelope::failure(rejection.body_text()));
        },
    };

    let session = session_id(&headers);
    let actor = match &session {
        Some(id) => match state.identity.resolve(id).await {
            Ok(actor) => actor,
            Err(e) => return Json(state.booking.respond("resolveIdentity", Err(e)).await),
        },
        None => Actor::guest(),
    };

    let outcome = state.booking.execute(&actor, command).await;

    // A promoted guest keeps its new identity for the rest of the session
    if let (Some(promoted), Some(id)) = (&outcome.promoted, &session) {
        if let Err(e) = state.identity.remember(id, promoted).await {
            warn!("Failed to remember promoted guest: {}", e);
        }
    }
    Json(outcome.envelope)
}

/// GET /booking/redeem/{kind}/{code}
pub async fn redeem<S: BookingStore>(
    State(state): State<AppState<S>>,
    path: Result<Path<(RedeemKind, String)>, PathRejection>,
) -> Json<Envelope> {
    match path {
        Ok(Path((kind, code))) => Json(state.booking.redeem(kind, &code).await),
        Err(rejection) => {
            debug!("Rejected redeem link: {}", rejection.body_text());
            Json(Envelope::failure(rejection.body_text()))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_session_from_bearer_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_id(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc-123"));
        assert_eq!(session_id(&headers), Some("abc-123".to_string()));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(session_id(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer  "));
        assert_eq!(session_id(&headers), None);
    }
}
