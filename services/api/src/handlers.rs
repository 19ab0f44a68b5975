//! Axum Handlers for the REST API
//!
//! This module contains the logic for handling HTTP requests against learner
//! workspaces. It uses `utoipa` doc comments to generate OpenAPI documentation.
//!
//! Feature requests run to completion on a spawned task, so a client that
//! disconnects does not abandon the model call; only closing the workspace
//! does. A request submitted while the same feature is busy is answered with
//! `202 Accepted` and the unchanged view. A conversation turn is the
//! exception: restarting the conversation abandons it.

use axum::{
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use bytes::Bytes;
use lingo_core::{error::TutorError, view::Submission};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, instrument};
use uuid::Uuid;

use crate::{
    models::{
        CheckGrammarPayload, ConversationView, ErrorResponse, GenerateStoryPayload, GrammarView,
        LookupWordPayload, SendMessagePayload, StoryView, VocabularyView, WorkspaceCreated,
    },
    state::AppState,
    workspace::Workspace,
};

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::Conflict(message) => {
                (StatusCode::CONFLICT, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

fn find_workspace(state: &AppState, id: Uuid) -> Result<Arc<Workspace>, ApiError> {
    state
        .workspaces
        .get(id)
        .ok_or_else(|| ApiError::NotFound(format!("Workspace with id '{}' not found", id)))
}

fn submission_response<B: Serialize>(
    submission: Submission<B>,
    current: impl FnOnce() -> B,
) -> Response {
    match submission {
        Submission::Completed(body) => (StatusCode::OK, Json(body)).into_response(),
        Submission::Ignored => (StatusCode::ACCEPTED, Json(current())).into_response(),
    }
}

/// Open a new workspace with empty feature views.
#[utoipa::path(
    post,
    path = "/workspaces",
    responses(
        (status = 201, description = "Workspace created", body = WorkspaceCreated)
    )
)]
pub async fn create_workspace(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let workspace = state.workspaces.create();
    (
        StatusCode::CREATED,
        Json(WorkspaceCreated { id: workspace.id }),
    )
}

/// Close a workspace, abandoning any outstanding requests.
#[utoipa::path(
    delete,
    path = "/workspaces/{id}",
    responses(
        (status = 204, description = "Workspace closed"),
        (status = 404, description = "Workspace not found", body = ErrorResponse)
    ),
    params(("id" = Uuid, Path, description = "Workspace ID"))
)]
pub async fn delete_workspace(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.workspaces.remove(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!(
            "Workspace with id '{}' not found",
            id
        )))
    }
}

/// Get the vocabulary view.
#[utoipa::path(
    get,
    path = "/workspaces/{id}/vocabulary",
    responses(
        (status = 200, description = "Current vocabulary view", body = VocabularyView),
        (status = 404, description = "Workspace not found", body = ErrorResponse)
    ),
    params(("id" = Uuid, Path, description = "Workspace ID"))
)]
pub async fn get_vocabulary(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<VocabularyView>, ApiError> {
    let workspace = find_workspace(&state, id)?;
    Ok(Json(workspace.vocabulary.snapshot().into()))
}

/// Look up a word: definition, examples, synonyms, and pronunciation.
#[utoipa::path(
    post,
    path = "/workspaces/{id}/vocabulary",
    request_body = LookupWordPayload,
    responses(
        (status = 200, description = "Lookup finished; the view holds the result or an inline error", body = VocabularyView),
        (status = 202, description = "A lookup is already outstanding; nothing was sent", body = VocabularyView),
        (status = 404, description = "Workspace not found", body = ErrorResponse)
    ),
    params(("id" = Uuid, Path, description = "Workspace ID"))
)]
#[instrument(skip(state, payload))]
pub async fn lookup_word(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<LookupWordPayload>,
) -> Result<Response, ApiError> {
    let workspace = find_workspace(&state, id)?;
    let view = workspace.vocabulary.clone();
    let tutor = state.tutor.clone();
    let submission = tokio::spawn(async move {
        let word = payload.word;
        view.submit(&word, tutor.lookup_word(&word)).await
    })
    .await?;

    Ok(submission_response(
        submission.map(VocabularyView::from),
        || workspace.vocabulary.snapshot().into(),
    ))
}

/// Download the pronunciation of the looked-up word as a WAV file.
#[utoipa::path(
    get,
    path = "/workspaces/{id}/vocabulary/pronunciation.wav",
    responses(
        (status = 200, description = "Mono 24 kHz 16-bit WAV", content_type = "audio/wav", body = Vec<u8>),
        (status = 404, description = "Workspace not found or no word looked up", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(("id" = Uuid, Path, description = "Workspace ID"))
)]
pub async fn get_pronunciation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let workspace = find_workspace(&state, id)?;
    let wav = workspace
        .vocabulary
        .with_result(|lookup| lookup.map(|l| l.pronunciation.decode().to_wav()))
        .ok_or_else(|| ApiError::NotFound("No pronunciation available".to_string()))??;

    Ok(([(header::CONTENT_TYPE, "audio/wav")], Bytes::from(wav)).into_response())
}

/// Get the grammar view.
#[utoipa::path(
    get,
    path = "/workspaces/{id}/grammar",
    responses(
        (status = 200, description = "Current grammar view", body = GrammarView),
        (status = 404, description = "Workspace not found", body = ErrorResponse)
    ),
    params(("id" = Uuid, Path, description = "Workspace ID"))
)]
pub async fn get_grammar(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<GrammarView>, ApiError> {
    let workspace = find_workspace(&state, id)?;
    Ok(Json(workspace.grammar.snapshot().into()))
}

/// Check a passage for grammar errors.
#[utoipa::path(
    post,
    path = "/workspaces/{id}/grammar",
    request_body = CheckGrammarPayload,
    responses(
        (status = 200, description = "Check finished; the view holds the correction or an inline error", body = GrammarView),
        (status = 202, description = "A check is already outstanding; nothing was sent", body = GrammarView),
        (status = 404, description = "Workspace not found", body = ErrorResponse)
    ),
    params(("id" = Uuid, Path, description = "Workspace ID"))
)]
#[instrument(skip(state, payload))]
pub async fn check_grammar(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CheckGrammarPayload>,
) -> Result<Response, ApiError> {
    let workspace = find_workspace(&state, id)?;
    let view = workspace.grammar.clone();
    let tutor = state.tutor.clone();
    let submission = tokio::spawn(async move {
        let text = payload.text;
        view.submit(&text, tutor.check_grammar(&text)).await
    })
    .await?;

    Ok(submission_response(submission.map(GrammarView::from), || {
        workspace.grammar.snapshot().into()
    }))
}

/// Get the story view.
#[utoipa::path(
    get,
    path = "/workspaces/{id}/story",
    responses(
        (status = 200, description = "Current story view", body = StoryView),
        (status = 404, description = "Workspace not found", body = ErrorResponse)
    ),
    params(("id" = Uuid, Path, description = "Workspace ID"))
)]
pub async fn get_story(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<StoryView>, ApiError> {
    let workspace = find_workspace(&state, id)?;
    Ok(Json(workspace.story.snapshot().into()))
}

/// Generate a short story for a prompt at a difficulty level.
#[utoipa::path(
    post,
    path = "/workspaces/{id}/story",
    request_body = GenerateStoryPayload,
    responses(
        (status = 200, description = "Generation finished; the view holds the story or an inline error", body = StoryView),
        (status = 202, description = "A story is already being generated; nothing was sent", body = StoryView),
        (status = 404, description = "Workspace not found", body = ErrorResponse)
    ),
    params(("id" = Uuid, Path, description = "Workspace ID"))
)]
#[instrument(skip(state, payload))]
pub async fn generate_story(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<GenerateStoryPayload>,
) -> Result<Response, ApiError> {
    let workspace = find_workspace(&state, id)?;
    let view = workspace.story.clone();
    let tutor = state.tutor.clone();
    let submission = tokio::spawn(async move {
        let GenerateStoryPayload { prompt, level } = payload;
        view.submit(&prompt, tutor.generate_story(&prompt, level)).await
    })
    .await?;

    Ok(submission_response(submission.map(StoryView::from), || {
        workspace.story.snapshot().into()
    }))
}

/// Get the current conversation transcript.
#[utoipa::path(
    get,
    path = "/workspaces/{id}/conversation",
    responses(
        (status = 200, description = "Conversation transcript", body = ConversationView),
        (status = 404, description = "Workspace not found or no conversation started", body = ErrorResponse)
    ),
    params(("id" = Uuid, Path, description = "Workspace ID"))
)]
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConversationView>, ApiError> {
    let workspace = find_workspace(&state, id)?;
    let active = workspace
        .conversation()
        .ok_or_else(|| ApiError::NotFound("No conversation started".to_string()))?;
    Ok(Json(ConversationView::from(active.conversation())))
}

/// Start a new conversation, replacing any previous one.
///
/// A reply still pending on the previous conversation is abandoned.
#[utoipa::path(
    post,
    path = "/workspaces/{id}/conversation",
    responses(
        (status = 201, description = "Conversation started with the tutor's greeting", body = ConversationView),
        (status = 404, description = "Workspace not found", body = ErrorResponse)
    ),
    params(("id" = Uuid, Path, description = "Workspace ID"))
)]
pub async fn start_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let workspace = find_workspace(&state, id)?;
    let active = workspace.set_conversation(state.tutor.start_conversation());
    Ok((
        StatusCode::CREATED,
        Json(ConversationView::from(active.conversation())),
    ))
}

/// Send a message to the tutor and wait for the reply.
#[utoipa::path(
    post,
    path = "/workspaces/{id}/conversation/messages",
    request_body = SendMessagePayload,
    responses(
        (status = 200, description = "Reply appended to the transcript", body = ConversationView),
        (status = 202, description = "A reply is already outstanding; nothing was sent", body = ConversationView),
        (status = 400, description = "Empty message", body = ErrorResponse),
        (status = 404, description = "Workspace not found or no conversation started", body = ErrorResponse),
        (status = 409, description = "The conversation was restarted before the reply arrived", body = ErrorResponse)
    ),
    params(("id" = Uuid, Path, description = "Workspace ID"))
)]
#[instrument(skip(state, payload))]
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SendMessagePayload>,
) -> Result<Response, ApiError> {
    let workspace = find_workspace(&state, id)?;
    let active = workspace
        .conversation()
        .ok_or_else(|| ApiError::NotFound("No conversation started".to_string()))?;

    let task_conversation = active.clone();
    let outcome =
        tokio::spawn(async move { task_conversation.send(&payload.text).await }).await?;

    let view = ConversationView::from(active.conversation());
    match outcome {
        Ok(Submission::Completed(_)) => Ok((StatusCode::OK, Json(view)).into_response()),
        Ok(Submission::Ignored) => Ok((StatusCode::ACCEPTED, Json(view)).into_response()),
        Err(TutorError::Validation(message)) => Err(ApiError::BadRequest(message)),
        Err(TutorError::Cancelled) if workspace.is_closed() => Err(ApiError::NotFound(format!(
            "Workspace with id '{}' was closed",
            id
        ))),
        Err(TutorError::Cancelled) => Err(ApiError::Conflict(
            "The conversation was restarted before the reply arrived".to_string(),
        )),
        Err(err) => Err(err.into()),
    }
}
