//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the workspace REST API and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        ChatMessageBody, CheckGrammarPayload, ConversationView, ErrorResponse,
        GenerateStoryPayload, GrammarBody, GrammarErrorBody, GrammarVerdict, GrammarView,
        LookupWordPayload, PronunciationBody, SendMessagePayload, StoryBody, StoryView,
        VocabularyBody, VocabularyView, WorkspaceCreated,
    },
    state::AppState,
};

use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::create_workspace,
        handlers::delete_workspace,
        handlers::get_vocabulary,
        handlers::lookup_word,
        handlers::get_pronunciation,
        handlers::get_grammar,
        handlers::check_grammar,
        handlers::get_story,
        handlers::generate_story,
        handlers::get_conversation,
        handlers::start_conversation,
        handlers::send_message,
    ),
    components(
        schemas(
            WorkspaceCreated, LookupWordPayload, CheckGrammarPayload, GenerateStoryPayload,
            SendMessagePayload, VocabularyView, VocabularyBody, PronunciationBody, GrammarView,
            GrammarBody, GrammarErrorBody, GrammarVerdict, StoryView, StoryBody,
            ConversationView, ChatMessageBody, ErrorResponse
        )
    ),
    tags(
        (name = "Lingo API", description = "Vocabulary, grammar, story, and conversation practice for English learners")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/workspaces", post(handlers::create_workspace))
        .route("/workspaces/{id}", delete(handlers::delete_workspace))
        .route(
            "/workspaces/{id}/vocabulary",
            get(handlers::get_vocabulary).post(handlers::lookup_word),
        )
        .route(
            "/workspaces/{id}/vocabulary/pronunciation.wav",
            get(handlers::get_pronunciation),
        )
        .route(
            "/workspaces/{id}/grammar",
            get(handlers::get_grammar).post(handlers::check_grammar),
        )
        .route(
            "/workspaces/{id}/story",
            get(handlers::get_story).post(handlers::generate_story),
        )
        .route(
            "/workspaces/{id}/conversation",
            get(handlers::get_conversation).post(handlers::start_conversation),
        )
        .route(
            "/workspaces/{id}/conversation/messages",
            post(handlers::send_message),
        )
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
