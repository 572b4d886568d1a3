/// OpenAPI documentation for the Worklink Chat Service
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Worklink Chat Service API",
        version = "0.1.0",
        description = "Direct conversations, message history and the realtime chat gateway",
        license(name = "MIT")
    ),
    servers(
        (url = "http://localhost:8086", description = "Development server"),
        (url = "https://api.worklink.app/chat", description = "Production server"),
    ),
    tags(
        (name = "Health", description = "Service health checks"),
        (name = "Conversations", description = "Conversation lookup, creation and read state"),
        (name = "Messages", description = "Message history and sending"),
        (name = "WebSocket", description = "Realtime gateway (join rooms, send messages, typing)"),
    ),
    components(schemas(
        crate::routes::conversations::CreateConversationRequest,
        crate::routes::conversations::ConversationSummaryDto,
        crate::routes::conversations::MarkReadResponse,
        crate::routes::messages::MessageDto,
        crate::routes::messages::SendMessageRequest,
        crate::routes::messages::HistoryResponse,
        crate::models::message::MessageKind,
        crate::services::user_directory::PublicProfile,
    ))
)]
pub struct ApiDoc;
