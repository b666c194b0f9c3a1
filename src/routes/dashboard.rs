use askama::Template;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::error::{AppError, AppResult};
use crate::extractors::MaybeUser;
use crate::flash::{self, FlashMessage, Flashes};
use crate::guides::domain::{Category, GuideSummary};
use crate::guides::images;
use crate::guides::store::NewGuide;
use crate::routes::home::Html;
use crate::state::AppState;

// --- Templates ---

#[derive(Template)]
#[template(path = "pages/dashboard.html")]
pub struct DashboardTemplate {
    pub flashes: Vec<FlashMessage>,
    pub username: Option<String>,
    pub guides: Vec<GuideSummary>,
}

#[derive(Template)]
#[template(path = "pages/create_guide.html")]
pub struct CreateGuideTemplate {
    pub flashes: Vec<FlashMessage>,
    pub username: Option<String>,
    pub categories: Vec<&'static str>,
    pub title: String,
    pub category: String,
    pub content: String,
}

impl CreateGuideTemplate {
    fn new(username: &str, flashes: Vec<FlashMessage>) -> Self {
        Self {
            flashes,
            username: Some(username.to_string()),
            categories: Category::ALL.iter().map(|c| c.as_str()).collect(),
            title: String::new(),
            category: Category::Other.as_str().to_string(),
            content: String::new(),
        }
    }

    fn is_selected(&self, category: &str) -> bool {
        self.category == category
    }
}

// --- Forms ---

/// Fields of the multipart create form.
#[derive(Default)]
struct CreateGuideForm {
    title: String,
    category: String,
    content: String,
    images: Vec<Upload>,
}

struct Upload {
    file_name: String,
    bytes: Vec<u8>,
}

async fn read_create_form(mut multipart: Multipart) -> AppResult<CreateGuideForm> {
    let invalid = |e: axum::extract::multipart::MultipartError| {
        tracing::warn!("Bad multipart submission: {}", e);
        AppError::Validation("Invalid form submission.".into())
    };

    let mut form = CreateGuideForm::default();
    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => form.title = field.text().await.map_err(invalid)?,
            "category" => form.category = field.text().await.map_err(invalid)?,
            "content" => form.content = field.text().await.map_err(invalid)?,
            "image_file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(invalid)?;
                if !file_name.is_empty() {
                    form.images.push(Upload {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }
    Ok(form)
}

// --- Router ---

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route(
            "/create",
            get(create_page)
                .post(create_guide)
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/delete/{filename}", post(delete_guide))
}

// --- Handlers ---

/// GET /dashboard: every guide, newest first
async fn dashboard(
    State(state): State<AppState>,
    user: MaybeUser,
    flashes: Flashes,
) -> AppResult<Response> {
    let Some(username) = user.username() else {
        return Ok(Redirect::to("/login").into_response());
    };

    let guides = state.guides.list(Some(username))?;

    let page = Html(DashboardTemplate {
        flashes: flashes.0.clone(),
        username: Some(username.to_string()),
        guides,
    });
    Ok(flashes.consume(page))
}

/// GET /create
async fn create_page(user: MaybeUser, flashes: Flashes) -> Response {
    let Some(username) = user.username() else {
        return Redirect::to("/login").into_response();
    };

    let page = Html(CreateGuideTemplate::new(username, flashes.0.clone()));
    flashes.consume(page)
}

/// POST /create: save images, render the guide, back to the dashboard
async fn create_guide(
    State(state): State<AppState>,
    user: MaybeUser,
    multipart: Multipart,
) -> AppResult<Response> {
    let Some(username) = user.username() else {
        return Ok(Redirect::to("/login").into_response());
    };

    let form = read_create_form(multipart).await?;

    // Validate before touching the uploads directory
    let problem = if form.title.trim().is_empty() {
        Some("Title is required.".to_string())
    } else {
        form.category.parse::<Category>().err().map(|e| e.to_string())
    };
    if let Some(message) = problem {
        return Ok(reshow_form(username, form, message));
    }

    let mut messages = Vec::new();
    let mut image_urls = Vec::new();
    for upload in &form.images {
        if images::allowed_extension(&upload.file_name).is_none() {
            messages.push(FlashMessage::error(format!(
                "Skipped unsupported image: {}",
                upload.file_name
            )));
            continue;
        }
        match state
            .images
            .save(username, &upload.file_name, &upload.bytes)
        {
            Some(url) => image_urls.push(url),
            None => messages.push(FlashMessage::error(format!(
                "Could not save image: {}",
                upload.file_name
            ))),
        }
    }

    let created = state.guides.create(&NewGuide {
        author: username,
        title: &form.title,
        category: &form.category,
        body: &form.content,
        image_urls: &image_urls,
    });

    match created {
        Ok(_) => {
            messages.push(FlashMessage::success("Guide created successfully!"));
            Ok(flash::redirect("/dashboard", &messages))
        }
        Err(AppError::Validation(message)) => Ok(reshow_form(username, form, message)),
        Err(e) => Err(e),
    }
}

fn reshow_form(username: &str, form: CreateGuideForm, message: String) -> Response {
    let mut template = CreateGuideTemplate::new(username, vec![FlashMessage::error(message)]);
    template.title = form.title;
    template.category = form.category;
    template.content = form.content;
    Html(template).into_response()
}

/// POST /delete/{filename}: only the author may delete
async fn delete_guide(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(filename): Path<String>,
) -> Response {
    let Some(username) = user.username() else {
        return Redirect::to("/login").into_response();
    };

    let message = match state.guides.delete(&filename, username) {
        Ok(()) => FlashMessage::success("Guide deleted."),
        Err(AppError::Forbidden) => FlashMessage::error("You can only delete your own guides."),
        Err(AppError::NotFound) => FlashMessage::error("Guide not found."),
        Err(e) => {
            tracing::error!("Failed to delete {}: {}", filename, e);
            FlashMessage::error("Could not delete guide.")
        }
    };

    flash::redirect("/dashboard", &[message])
}
