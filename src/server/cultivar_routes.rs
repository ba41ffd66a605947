//! Cultivar catalog routes

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::warn;

use super::api_error::bad_request;
use super::session::{actor_of, Session};
use super::state::{GuardedCultivarManager, ServerState};
use crate::cultivar::{CultivarOrder, CultivarProfile, CultivarStatus, InfoCategory};

/// Uploads are capped well above any sane image or certificate.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Deserialize, Default)]
struct ListQuery {
    #[serde(default)]
    order: CultivarOrder,
}

#[derive(Deserialize)]
struct StatusBody {
    status: String,
}

#[derive(Deserialize)]
struct BulkStatusBody {
    ids: Vec<String>,
    status: String,
}

#[derive(Deserialize)]
struct ReviewBody {
    author: String,
    rating: i64,
    experience: String,
}

fn parse_status(raw: &str) -> Result<CultivarStatus, Response> {
    CultivarStatus::parse(raw).ok_or_else(|| bad_request(format!("Unknown status '{}'", raw)))
}

async fn list_cultivars(
    State(manager): State<GuardedCultivarManager>,
    Query(query): Query<ListQuery>,
) -> Response {
    match manager.list_cultivars(query.order) {
        Ok(cultivars) => Json(cultivars).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn get_cultivar(
    State(manager): State<GuardedCultivarManager>,
    Path(id): Path<String>,
) -> Response {
    match manager.get_cultivar(&id) {
        Ok(Some(cultivar)) => Json(cultivar).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => err.into_response(),
    }
}

async fn create_cultivar(
    session: Session,
    State(manager): State<GuardedCultivarManager>,
    Json(profile): Json<CultivarProfile>,
) -> Response {
    match manager.create_cultivar(profile, &session.actor()) {
        Ok(cultivar) => (StatusCode::CREATED, Json(cultivar)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn update_cultivar(
    session: Session,
    State(manager): State<GuardedCultivarManager>,
    Path(id): Path<String>,
    Json(patch): Json<Map<String, Value>>,
) -> Response {
    match manager.update_cultivar(&id, &patch, &session.actor()) {
        Ok(cultivar) => Json(cultivar).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn put_status(
    session: Session,
    State(manager): State<GuardedCultivarManager>,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Response {
    let status = match parse_status(&body.status) {
        Ok(status) => status,
        Err(response) => return response,
    };
    match manager.set_status(&id, status, &session.actor()) {
        Ok(cultivar) => Json(cultivar).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn put_status_bulk(
    session: Session,
    State(manager): State<GuardedCultivarManager>,
    Json(body): Json<BulkStatusBody>,
) -> Response {
    let status = match parse_status(&body.status) {
        Ok(status) => status,
        Err(response) => return response,
    };
    match manager.set_status_bulk(&body.ids, status, &session.actor()) {
        Ok(updated) => Json(json!({ "updated": updated })).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Anyone may leave a review. Anonymous reviews are attributed to the system.
async fn post_review(
    session: Option<Session>,
    State(manager): State<GuardedCultivarManager>,
    Path(id): Path<String>,
    Json(body): Json<ReviewBody>,
) -> Response {
    let actor = actor_of(&session);
    match manager
        .add_review(&id, &body.author, body.rating, &body.experience, &actor)
        .await
    {
        Ok(review) => (StatusCode::CREATED, Json(review)).into_response(),
        Err(err) => err.into_response(),
    }
}

/// The pieces of an upload form: the `file` part plus any text fields.
#[derive(Default)]
struct UploadForm {
    file_name: Option<String>,
    data: Option<Vec<u8>>,
    alt: Option<String>,
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, Response> {
    let mut form = UploadForm::default();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("Malformed multipart body: {}", e);
                return Err(bad_request(format!("Malformed multipart body: {}", e)));
            }
        };
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "file" => {
                form.file_name = field.file_name().map(|s| s.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("Failed to read file data: {}", e)))?;
                form.data = Some(bytes.to_vec());
            }
            "alt" => {
                if let Ok(text) = field.text().await {
                    if !text.trim().is_empty() {
                        form.alt = Some(text);
                    }
                }
            }
            other => {
                warn!("Ignoring unexpected multipart field '{}'", other);
            }
        }
    }
    Ok(form)
}

async fn post_image(
    session: Session,
    State(manager): State<GuardedCultivarManager>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Response {
    let form = match read_upload_form(multipart).await {
        Ok(form) => form,
        Err(response) => return response,
    };
    let Some(data) = form.data else {
        return bad_request("Missing 'file' field");
    };
    match manager
        .add_image(&id, data, form.alt, &session.actor())
        .await
    {
        Ok(image) => (StatusCode::CREATED, Json(image)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn delete_image(
    session: Session,
    State(manager): State<GuardedCultivarManager>,
    Path((id, image_id)): Path<(String, String)>,
) -> Response {
    match manager.remove_image(&id, &image_id, &session.actor()).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

async fn post_additional_info(
    session: Session,
    State(manager): State<GuardedCultivarManager>,
    Path((id, category)): Path<(String, String)>,
    multipart: Multipart,
) -> Response {
    let Some(category) = InfoCategory::parse(&category) else {
        return bad_request(format!("Unknown info category '{}'", category));
    };
    let form = match read_upload_form(multipart).await {
        Ok(form) => form,
        Err(response) => return response,
    };
    let Some(data) = form.data else {
        return bad_request("Missing 'file' field");
    };
    let file_name = form.file_name.unwrap_or_else(|| "file".to_string());
    match manager
        .add_additional_info(&id, category, &file_name, data, &session.actor())
        .await
    {
        Ok(file) => (StatusCode::CREATED, Json(file)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn delete_additional_info(
    session: Session,
    State(manager): State<GuardedCultivarManager>,
    Path((id, category, file_id)): Path<(String, String, String)>,
) -> Response {
    let Some(category) = InfoCategory::parse(&category) else {
        return bad_request(format!("Unknown info category '{}'", category));
    };
    match manager
        .remove_additional_info(&id, category, &file_id, &session.actor())
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn cultivar_routes() -> Router<ServerState> {
    let upload_routes = Router::new()
        .route("/{id}/images", post(post_image))
        .route("/{id}/info/{category}", post(post_additional_info))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES));

    Router::new()
        .merge(upload_routes)
        .route("/", get(list_cultivars).post(create_cultivar))
        .route("/status", put(put_status_bulk))
        .route("/{id}", get(get_cultivar).put(update_cultivar))
        .route("/{id}/status", put(put_status))
        .route("/{id}/reviews", post(post_review))
        .route("/{id}/images/{image_id}", delete(delete_image))
        .route(
            "/{id}/info/{category}/{file_id}",
            delete(delete_additional_info),
        )
}
