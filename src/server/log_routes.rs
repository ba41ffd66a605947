//! Audit log listing

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;

use super::api_error::bad_request;
use super::session::Session;
use super::state::ServerState;
use crate::audit::log_view::known_event_type;
use crate::audit::{LogFilter, LogQuery, SortOrder};

#[derive(Deserialize, Default, Debug)]
struct LogsParams {
    cultivar: Option<String>,
    user: Option<String>,
    /// Comma separated event types.
    event: Option<String>,
    from: Option<String>,
    to: Option<String>,
    #[serde(default)]
    order: SortOrder,
    page: Option<usize>,
}

fn parse_date(name: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, Response> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| bad_request(format!("Invalid '{}' date '{}', expected YYYY-MM-DD", name, s))),
    }
}

fn parse_event_types(raw: Option<&str>) -> Result<Vec<String>, Response> {
    let mut event_types = Vec::new();
    for label in raw
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        match known_event_type(label) {
            Some(known) => event_types.push(known.to_string()),
            None => return Err(bad_request(format!("Unknown event type '{}'", label))),
        }
    }
    Ok(event_types)
}

fn build_query(params: LogsParams, page_size: usize) -> Result<LogQuery, Response> {
    let filter = LogFilter {
        cultivar_name: params.cultivar,
        user: params.user,
        event_types: parse_event_types(params.event.as_deref())?,
        from: parse_date("from", params.from.as_deref())?,
        to: parse_date("to", params.to.as_deref())?,
    };
    if let (Some(from), Some(to)) = (filter.from, filter.to) {
        if from > to {
            return Err(bad_request("'from' must not be after 'to'"));
        }
    }
    Ok(LogQuery {
        filter,
        order: params.order,
        page: params.page.unwrap_or(1).max(1),
        page_size,
    })
}

async fn get_logs(
    _session: Session,
    State(state): State<ServerState>,
    Query(params): Query<LogsParams>,
) -> Response {
    let query = match build_query(params, state.config.log_page_size) {
        Ok(query) => query,
        Err(response) => return response,
    };
    match state.cultivar_manager.list_logs(&query) {
        Ok(page) => Json(page).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn log_routes() -> Router<ServerState> {
    Router::new().route("/", get(get_logs))
}
