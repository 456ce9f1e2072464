// Matchmaker - Web Server
// REST API for the profile wizard plus the admin member surface

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    extract::multipart::MultipartRejection,
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use matchmaker::admin::{self, AdminProfile, BulkRequest, MemberComment, MemberFilter, MemberPage, MemberUpdate, NewMember};
use matchmaker::api::{ContactDetails, Dashboard, GalleryImage, ImageUpload, InterestKind, ProfileView, UserInfo};
use matchmaker::entities::{Plan, SupportTicket};
use matchmaker::support;
use matchmaker::{
    member_for_token, open_database, seed_reference_data, ApiError, Config, DropdownOption, DropdownOptions,
    Envelope, LocalApi, Member, Payload, PlanRegistry, ProfileApi, Section,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    config: Arc<Config>,
    plans: Arc<PlanRegistry>,
}

impl AppState {
    fn conn(&self) -> Result<MutexGuard<'_, Connection>, ServerError> {
        self.db
            .lock()
            .map_err(|_| ServerError(ApiError::Internal("database lock poisoned".to_string())))
    }
}

/// `ApiError` rendered as an error envelope with a matching HTTP status
struct ServerError(ApiError);

impl From<ApiError> for ServerError {
    fn from(err: ApiError) -> Self {
        ServerError(err)
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ApiError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Rejected { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::LimitExhausted(_) => StatusCode::PAYMENT_REQUIRED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Network(_) => StatusCode::BAD_GATEWAY,
            ApiError::Storage(_) | ApiError::Io(_) | ApiError::Internal(_) => {
                error!("Request failed: {}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(Envelope::<Value>::error(self.0.alert_message()))).into_response()
    }
}

// Malformed paths, queries and bodies still answer with an error envelope
macro_rules! rejection_to_envelope {
    ($($rejection:ty),*) => {
        $(
            impl From<$rejection> for ServerError {
                fn from(rejection: $rejection) -> Self {
                    ServerError(ApiError::rejected(Some(rejection.body_text())))
                }
            }
        )*
    };
}

rejection_to_envelope!(JsonRejection, PathRejection, QueryRejection, MultipartRejection);

type ApiResult<T> = Result<Json<Envelope<T>>, ServerError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(Envelope::success(data)))
}

fn done(message: &str) -> ApiResult<Value> {
    Ok(Json(Envelope::message(message)))
}

// ============================================================================
// Auth
// ============================================================================

/// `LocalApi` for the member behind the bearer token
fn member_api(state: &AppState, headers: &HeaderMap) -> Result<LocalApi, ServerError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ServerError(ApiError::Unauthorized))?;

    let member_id = member_for_token(&*state.conn()?, token)?;
    Ok(LocalApi::new(state.db.clone(), member_id, state.config.upload_dir.clone()))
}

/// Every admin route requires `X-Admin-Key`; no configured key locks them all
fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ServerError> {
    let given = headers.get("x-admin-key").and_then(|v| v.to_str().ok());
    match (&state.config.admin_key, given) {
        (Some(expected), Some(given)) if expected == given => Ok(()),
        (None, _) => {
            warn!("Admin request refused: no admin key configured");
            Err(ApiError::Unauthorized.into())
        }
        _ => Err(ApiError::Unauthorized.into()),
    }
}

const ADMIN_ACTOR: &str = "admin";

async fn read_image(mut multipart: Multipart) -> Result<ImageUpload, ServerError> {
    let bad_form = |e: axum::extract::multipart::MultipartError| {
        ServerError(ApiError::rejected(Some(format!("Invalid upload: {}", e))))
    };

    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        if field.name() != Some("image") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("image.jpg").to_string();
        let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();
        let bytes = field.bytes().await.map_err(bad_form)?;
        return Ok(ImageUpload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
    Err(ApiError::validation("image").into())
}

// ============================================================================
// Member Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(Envelope::success("OK"))
}

/// GET /api/dropdown-options
async fn dropdown_options(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<DropdownOptions> {
    ok(member_api(&state, &headers)?.dropdown_options()?)
}

/// GET /api/castes/:religion_id
async fn castes(
    State(state): State<AppState>,
    headers: HeaderMap,
    religion_id: Result<Path<String>, PathRejection>,
) -> ApiResult<Vec<DropdownOption>> {
    let api = member_api(&state, &headers)?;
    let Path(religion_id) = religion_id?;
    ok(api.castes_by_religion(&religion_id)?)
}

/// GET /api/user-info
async fn user_info(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<UserInfo> {
    ok(member_api(&state, &headers)?.user_info()?)
}

/// POST /api/profile/update/:section - Profile settings save
async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    section: Result<Path<String>, PathRejection>,
    payload: Result<Json<Payload>, JsonRejection>,
) -> ApiResult<Value> {
    let api = member_api(&state, &headers)?;
    let (Path(section), Json(payload)) = (section?, payload?);
    let section = Section::parse(&section).ok_or_else(|| ServerError(ApiError::NotFound(format!("Section '{}'", section))))?;
    api.update_profile(section, &payload)?;
    done("Profile updated")
}

/// POST /api/profile/step/:step - Profile completion wizard save
async fn submit_step(
    State(state): State<AppState>,
    headers: HeaderMap,
    step: Result<Path<String>, PathRejection>,
    payload: Result<Json<Payload>, JsonRejection>,
) -> ApiResult<Value> {
    let api = member_api(&state, &headers)?;
    let (Path(step), Json(payload)) = (step?, payload?);
    let step = step.parse::<u8>().map_err(|_| ApiError::validation("step"))?;
    api.submit_profile_step(step, &payload)?;
    done("Step saved")
}

/// GET /api/profile/:id
async fn profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<ProfileView> {
    let api = member_api(&state, &headers)?;
    let Path(id) = id?;
    ok(api.profile(id)?)
}

/// POST /api/profile/:id/heart
async fn express_heart(
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Value> {
    let api = member_api(&state, &headers)?;
    let Path(id) = id?;
    api.express(id, InterestKind::Heart)?;
    done("Heart sent")
}

/// POST /api/profile/:id/interest
async fn express_interest(
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Value> {
    let api = member_api(&state, &headers)?;
    let Path(id) = id?;
    api.express(id, InterestKind::Interest)?;
    done("Interest sent")
}

/// POST /api/profile/:id/contact - Paid contact reveal
async fn view_contact(
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<ContactDetails> {
    let api = member_api(&state, &headers)?;
    let Path(id) = id?;
    ok(api.view_contact(id)?)
}

/// GET /api/dashboard
async fn dashboard(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Dashboard> {
    ok(member_api(&state, &headers)?.dashboard()?)
}

/// GET /api/gallery
async fn gallery(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Vec<GalleryImage>> {
    ok(member_api(&state, &headers)?.gallery_images()?)
}

/// POST /api/gallery - multipart, field `image`
async fn upload_gallery(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<GalleryImage> {
    let api = member_api(&state, &headers)?;
    let upload = read_image(multipart?).await?;
    ok(api.upload_gallery_image(&upload)?)
}

/// POST /api/profile-image - multipart, field `image`
async fn upload_profile_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<String> {
    let api = member_api(&state, &headers)?;
    let upload = read_image(multipart?).await?;
    ok(api.upload_profile_image(&upload)?)
}

/// GET /api/plans - Packages, cheapest first
async fn plans(State(state): State<AppState>) -> ApiResult<Vec<Plan>> {
    ok(state.plans.all())
}

/// GET /api/support-tickets
async fn support_tickets(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Vec<SupportTicket>> {
    ok(member_api(&state, &headers)?.support_tickets()?)
}

#[derive(Deserialize)]
struct TicketBody {
    #[serde(default)]
    subject: String,
    #[serde(default)]
    message: String,
}

/// POST /api/support-tickets
async fn open_support_ticket(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<TicketBody>, JsonRejection>,
) -> ApiResult<SupportTicket> {
    let api = member_api(&state, &headers)?;
    let Json(body) = body?;
    ok(api.open_support_ticket(&body.subject, &body.message)?)
}

// ============================================================================
// Admin Handlers
// ============================================================================

/// GET /admin/members - Filtered, sorted, paginated list
async fn admin_index(
    State(state): State<AppState>,
    headers: HeaderMap,
    filter: Result<Query<MemberFilter>, QueryRejection>,
) -> ApiResult<MemberPage> {
    require_admin(&state, &headers)?;
    let Query(filter) = filter?;
    ok(admin::list_members(&*state.conn()?, &filter, Utc::now().date_naive())?)
}

/// POST /admin/members
async fn admin_store(
    State(state): State<AppState>,
    headers: HeaderMap,
    new: Result<Json<NewMember>, JsonRejection>,
) -> ApiResult<Member> {
    require_admin(&state, &headers)?;
    let Json(new) = new?;
    ok(admin::create_member(&*state.conn()?, &new, &state.plans, ADMIN_ACTOR)?)
}

/// GET /admin/members/:id
async fn admin_view_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<AdminProfile> {
    require_admin(&state, &headers)?;
    let Path(id) = id?;
    ok(admin::view_profile(&*state.conn()?, id)?)
}

/// POST /admin/members/:id
async fn admin_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<i64>, PathRejection>,
    update: Result<Json<MemberUpdate>, JsonRejection>,
) -> ApiResult<Member> {
    require_admin(&state, &headers)?;
    let (Path(id), Json(update)) = (id?, update?);
    ok(admin::update_member(&*state.conn()?, id, &update, &state.plans, ADMIN_ACTOR)?)
}

/// POST /admin/members/bulk-action
async fn admin_bulk_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Result<Json<BulkRequest>, JsonRejection>,
) -> ApiResult<usize> {
    require_admin(&state, &headers)?;
    let Json(request) = request?;
    ok(admin::bulk_action(&*state.conn()?, &request, ADMIN_ACTOR)?)
}

#[derive(Deserialize)]
struct CommentBody {
    comment: String,
}

/// POST /admin/members/:id/comments
async fn admin_add_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<CommentBody>, JsonRejection>,
) -> ApiResult<MemberComment> {
    require_admin(&state, &headers)?;
    let (Path(id), Json(body)) = (id?, body?);
    ok(admin::add_comment(&*state.conn()?, id, &body.comment, ADMIN_ACTOR)?)
}

/// GET /admin/members/:id/comments
async fn admin_comments(
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Vec<MemberComment>> {
    require_admin(&state, &headers)?;
    let Path(id) = id?;
    ok(admin::comments(&*state.conn()?, id)?)
}

/// POST /admin/members/:id/confirm-email
async fn admin_confirm_email(
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Member> {
    require_admin(&state, &headers)?;
    let Path(id) = id?;
    ok(admin::confirm_email(&*state.conn()?, id, ADMIN_ACTOR)?)
}

#[derive(Deserialize, Default)]
struct TicketFilter {
    status: Option<String>,
}

/// GET /admin/support-tickets?status=open|closed
async fn admin_tickets(
    State(state): State<AppState>,
    headers: HeaderMap,
    filter: Result<Query<TicketFilter>, QueryRejection>,
) -> ApiResult<Vec<SupportTicket>> {
    require_admin(&state, &headers)?;
    let Query(filter) = filter?;
    ok(support::list_tickets(&*state.conn()?, filter.status.as_deref())?)
}

#[derive(Deserialize)]
struct ReplyBody {
    #[serde(default)]
    reply: String,
}

/// POST /admin/support-tickets/:id/reply - Answers and closes the ticket
async fn admin_reply_ticket(
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<ReplyBody>, JsonRejection>,
) -> ApiResult<SupportTicket> {
    require_admin(&state, &headers)?;
    let (Path(id), Json(body)) = (id?, body?);
    ok(support::reply_ticket(&*state.conn()?, id, &body.reply, ADMIN_ACTOR)?)
}

/// GET /admin/members/export - CSV download, same filters as the list
async fn admin_export(
    State(state): State<AppState>,
    headers: HeaderMap,
    filter: Result<Query<MemberFilter>, QueryRejection>,
) -> Result<Response, ServerError> {
    require_admin(&state, &headers)?;
    let Query(filter) = filter?;

    let mut csv = Vec::new();
    admin::export_members_csv(&*state.conn()?, &filter, Utc::now().date_naive(), &mut csv)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"members.csv\""),
        ],
        csv,
    )
        .into_response())
}

// ============================================================================
// Router
// ============================================================================

fn app(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/dropdown-options", get(dropdown_options))
        .route("/castes/:religion_id", get(castes))
        .route("/user-info", get(user_info))
        .route("/profile/update/:section", post(update_profile))
        .route("/profile/step/:step", post(submit_step))
        .route("/profile/:id", get(profile))
        .route("/profile/:id/heart", post(express_heart))
        .route("/profile/:id/interest", post(express_interest))
        .route("/profile/:id/contact", post(view_contact))
        .route("/dashboard", get(dashboard))
        .route("/gallery", get(gallery).post(upload_gallery))
        .route("/profile-image", post(upload_profile_image))
        .route("/plans", get(plans))
        .route("/support-tickets", get(support_tickets).post(open_support_ticket));

    let admin_routes = Router::new()
        .route("/members", get(admin_index).post(admin_store))
        .route("/members/export", get(admin_export))
        .route("/members/bulk-action", post(admin_bulk_action))
        .route("/members/:id", get(admin_view_profile).post(admin_update))
        .route("/members/:id/comments", get(admin_comments).post(admin_add_comment))
        .route("/members/:id/confirm-email", post(admin_confirm_email))
        .route("/support-tickets", get(admin_tickets))
        .route("/support-tickets/:id/reply", post(admin_reply_ticket));

    let uploads = ServeDir::new(&state.config.upload_dir);

    Router::new()
        .nest("/api", api_routes)
        .nest("/admin", admin_routes)
        .nest_service("/uploads", uploads)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "matchmaker=info,matchmaker_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("🌐 Matchmaker - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = Config::load()?;

    let conn = open_database(&config.db_path)?;
    seed_reference_data(&conn)?;
    info!("Database opened: {}", config.db_path.display());

    std::fs::create_dir_all(&config.upload_dir)?;
    if config.admin_key.is_none() {
        warn!("MATCHMAKER_ADMIN_KEY not set: admin routes will refuse every request");
    }

    let port = config.port;
    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        config: Arc::new(config),
        plans: Arc::new(PlanRegistry::new()),
    };

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!("\n🚀 Server running on http://localhost:{}", port);
    println!("   API:   http://localhost:{}/api/health", port);
    println!("   Admin: http://localhost:{}/admin/members", port);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app(state)).await?;
    Ok(())
}
