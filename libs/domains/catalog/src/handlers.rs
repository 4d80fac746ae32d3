use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use axum_helpers::{
    AppError,
    errors::responses::{
        BadGatewayResponse, BadRequestResponse, ConflictResponse, InternalServerErrorResponse,
        NotFoundResponse,
    },
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use utoipa::{IntoParams, OpenApi};

use crate::aggregation::{EventStats, Mean, Stats};
use crate::comparison::{Comparison, ComparisonRow};
use crate::error::CatalogResult;
use crate::identifier::EventKey;
use crate::models::{DocumentId, Event, Favorite, NewEvents, Page, RawRating, User};
use crate::ranking::{RankedEvent, RankingKey, SortOrder, TopReviewer};
use crate::repository::EntityStore;
use crate::service::{
    CatalogService, EventDetail, EventStatsView, FavoritesView, ProfileEvent, UserProfile,
    UserSummary, YearReport,
};
use crate::users::{EventReview, NewFavorite, NewReview, NewUser, NewUsers};
use crate::validation::{parse_limit, parse_order, parse_page};
use crate::year_filter::parse_year;

/// OpenAPI documentation for the catalog API
#[derive(OpenApi)]
#[openapi(
    paths(
        list_events,
        create_events,
        top_rated,
        most_reviewed,
        five_star,
        compare_events,
        events_in_year,
        event_detail,
        event_stats,
        list_users,
        create_users,
        top_reviewers,
        user_profile,
        update_user,
        delete_user,
        add_event_review,
        list_favorites,
        add_favorite,
        remove_favorite,
    ),
    components(
        schemas(
            Event, NewEvents, User, RawRating, DocumentId, EventKey, Mean, Stats, EventStats,
            RankingKey, SortOrder, RankedEvent, TopReviewer, Comparison, ComparisonRow,
            EventDetail, EventStatsView, YearReport, UserProfile, UserSummary, ProfileEvent,
            NewUser, NewUsers, NewReview, EventReview, NewFavorite, Favorite, FavoritesView,
        ),
        responses(
            BadRequestResponse,
            NotFoundResponse,
            ConflictResponse,
            BadGatewayResponse,
            InternalServerErrorResponse
        )
    ),
    tags(
        (name = "Events", description = "Event listings, ratings and rankings"),
        (name = "Users", description = "Users and their embedded ratings")
    )
)]
pub struct ApiDoc;

/// `?limit=`; kept as text so bad values surface as validation errors
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LimitQuery {
    /// Positive number of results (defaults to the configured top limit)
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RankingQuery {
    /// `asc` or `desc` (default)
    pub order: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Page number starting at 1; invalid values mean 1
    pub page: Option<String>,
}

/// Create the catalog router with all event and user endpoints
pub fn router<S: EntityStore + 'static>(service: Arc<CatalogService<S>>) -> Router {
    Router::new()
        .route("/events", get(list_events).post(create_events))
        .route("/events/top-rated", get(top_rated))
        .route("/events/most-reviewed", get(most_reviewed))
        .route("/events/five-star", get(five_star))
        .route("/events/compare/{a}/{b}", get(compare_events))
        .route("/events/year/{year}", get(events_in_year))
        .route("/events/{id}", get(event_detail))
        .route("/events/{id}/stats", get(event_stats))
        .route("/users", get(list_users).post(create_users))
        .route("/users/top-reviewers", get(top_reviewers))
        .route(
            "/users/{id}",
            get(user_profile).put(update_user).delete(delete_user),
        )
        .route("/users/{id}/review/{event_id}", post(add_event_review))
        .route("/users/{id}/favorites", get(list_favorites).post(add_favorite))
        .route("/users/{id}/favorites/{movieid}", delete(remove_favorite))
        .with_state(service)
}

/// List events, one fixed-size page at a time
#[utoipa::path(
    get,
    path = "/events",
    tag = "Events",
    params(PageQuery),
    responses(
        (status = 200, description = "Page of events", body = Page<Event>),
        (status = 502, response = BadGatewayResponse)
    )
)]
async fn list_events<S: EntityStore>(
    State(service): State<Arc<CatalogService<S>>>,
    Query(query): Query<PageQuery>,
) -> CatalogResult<Json<Page<Event>>> {
    let page = service.list_events(parse_page(query.page.as_deref())).await?;
    Ok(Json(page))
}

/// Create one event or a batch; ids are assigned by the server
#[utoipa::path(
    post,
    path = "/events",
    tag = "Events",
    request_body = NewEvents,
    responses(
        (status = 201, description = "Stored events", body = Vec<Event>),
        (status = 400, response = BadRequestResponse),
        (status = 502, response = BadGatewayResponse)
    )
)]
async fn create_events<S: EntityStore>(
    State(service): State<Arc<CatalogService<S>>>,
    payload: Result<Json<NewEvents>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(batch) = payload?;
    let stored = service.create_events(batch.into_vec()).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// Events by mean rating, highest first
#[utoipa::path(
    get,
    path = "/events/top-rated",
    tag = "Events",
    params(LimitQuery),
    responses(
        (status = 200, description = "Ranked events", body = Vec<RankedEvent>),
        (status = 400, response = BadRequestResponse)
    )
)]
async fn top_rated<S: EntityStore>(
    State(service): State<Arc<CatalogService<S>>>,
    Query(query): Query<LimitQuery>,
) -> CatalogResult<Json<Vec<RankedEvent>>> {
    let limit = parse_limit(query.limit.as_deref(), service.settings().default_top_limit)?;
    Ok(Json(service.top_events_by_mean(limit).await?))
}

/// Events by number of qualifying ratings
#[utoipa::path(
    get,
    path = "/events/most-reviewed",
    tag = "Events",
    params(RankingQuery),
    responses(
        (status = 200, description = "Ranked events", body = Vec<RankedEvent>),
        (status = 400, response = BadRequestResponse)
    )
)]
async fn most_reviewed<S: EntityStore>(
    State(service): State<Arc<CatalogService<S>>>,
    Query(query): Query<RankingQuery>,
) -> CatalogResult<Json<Vec<RankedEvent>>> {
    let order = parse_order(query.order.as_deref())?;
    let limit = parse_limit(query.limit.as_deref(), service.settings().default_top_limit)?;
    Ok(Json(service.top_events_by_review_count(order, limit).await?))
}

/// Events by number of five-star ratings
#[utoipa::path(
    get,
    path = "/events/five-star",
    tag = "Events",
    params(LimitQuery),
    responses(
        (status = 200, description = "Ranked events", body = Vec<RankedEvent>),
        (status = 400, response = BadRequestResponse)
    )
)]
async fn five_star<S: EntityStore>(
    State(service): State<Arc<CatalogService<S>>>,
    Query(query): Query<LimitQuery>,
) -> CatalogResult<Json<Vec<RankedEvent>>> {
    let limit = parse_limit(query.limit.as_deref(), service.settings().default_top_limit)?;
    Ok(Json(service.top_events_by_five_star(limit).await?))
}

/// Compare two events side by side
#[utoipa::path(
    get,
    path = "/events/compare/{a}/{b}",
    tag = "Events",
    params(
        ("a" = String, Path, description = "Event id or store id"),
        ("b" = String, Path, description = "Event id or store id")
    ),
    responses(
        (status = 200, description = "Comparison", body = Comparison),
        (status = 404, response = NotFoundResponse)
    )
)]
async fn compare_events<S: EntityStore>(
    State(service): State<Arc<CatalogService<S>>>,
    Path((a, b)): Path<(String, String)>,
) -> CatalogResult<Json<Comparison>> {
    Ok(Json(service.compare_events(&a, &b).await?))
}

/// Events with at least one rating dated in the given year
#[utoipa::path(
    get,
    path = "/events/year/{year}",
    tag = "Events",
    params(("year" = String, Path, description = "Calendar year, e.g. 2024")),
    responses(
        (status = 200, description = "Events reviewed that year", body = YearReport),
        (status = 400, response = BadRequestResponse)
    )
)]
async fn events_in_year<S: EntityStore>(
    State(service): State<Arc<CatalogService<S>>>,
    Path(year): Path<String>,
) -> CatalogResult<Json<YearReport>> {
    let year = parse_year(&year)?;
    Ok(Json(service.events_reviewed_in_year(year).await?))
}

/// An event with its average rating
#[utoipa::path(
    get,
    path = "/events/{id}",
    tag = "Events",
    params(("id" = String, Path, description = "Event id or store id")),
    responses(
        (status = 200, description = "Event found", body = EventDetail),
        (status = 404, response = NotFoundResponse)
    )
)]
async fn event_detail<S: EntityStore>(
    State(service): State<Arc<CatalogService<S>>>,
    Path(id): Path<String>,
) -> CatalogResult<Json<EventDetail>> {
    Ok(Json(service.event_detail(&id).await?))
}

/// Rating statistics of one event
#[utoipa::path(
    get,
    path = "/events/{id}/stats",
    tag = "Events",
    params(("id" = String, Path, description = "Event id or store id")),
    responses(
        (status = 200, description = "Event statistics", body = EventStatsView),
        (status = 404, response = NotFoundResponse)
    )
)]
async fn event_stats<S: EntityStore>(
    State(service): State<Arc<CatalogService<S>>>,
    Path(id): Path<String>,
) -> CatalogResult<Json<EventStatsView>> {
    Ok(Json(service.compute_event_stats(&id).await?))
}

/// List users, newest id first
#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    params(PageQuery),
    responses(
        (status = 200, description = "Page of users", body = Page<User>),
        (status = 502, response = BadGatewayResponse)
    )
)]
async fn list_users<S: EntityStore>(
    State(service): State<Arc<CatalogService<S>>>,
    Query(query): Query<PageQuery>,
) -> CatalogResult<Json<Page<User>>> {
    let page = service.list_users(parse_page(query.page.as_deref())).await?;
    Ok(Json(page))
}

/// Users with the most qualifying ratings
#[utoipa::path(
    get,
    path = "/users/top-reviewers",
    tag = "Users",
    params(LimitQuery),
    responses(
        (status = 200, description = "Ranked users", body = Vec<TopReviewer>),
        (status = 400, response = BadRequestResponse)
    )
)]
async fn top_reviewers<S: EntityStore>(
    State(service): State<Arc<CatalogService<S>>>,
    Query(query): Query<LimitQuery>,
) -> CatalogResult<Json<Vec<TopReviewer>>> {
    let limit = parse_limit(query.limit.as_deref(), service.settings().default_top_limit)?;
    Ok(Json(service.top_reviewers(limit).await?))
}

/// A user with their three best-rated events
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = i64, Path, description = "Numeric user id")),
    responses(
        (status = 200, description = "User profile", body = UserProfile),
        (status = 400, response = BadRequestResponse),
        (status = 404, response = NotFoundResponse)
    )
)]
async fn user_profile<S: EntityStore>(
    State(service): State<Arc<CatalogService<S>>>,
    Path(id): Path<String>,
) -> CatalogResult<Json<UserProfile>> {
    Ok(Json(service.user_profile(&id).await?))
}

/// Create one user or a batch; `_id`s are assigned by the server
#[utoipa::path(
    post,
    path = "/users",
    tag = "Users",
    request_body = NewUsers,
    responses(
        (status = 201, description = "Stored users", body = Vec<User>),
        (status = 400, response = BadRequestResponse),
        (status = 502, response = BadGatewayResponse)
    )
)]
async fn create_users<S: EntityStore>(
    State(service): State<Arc<CatalogService<S>>>,
    payload: Result<Json<NewUsers>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(batch) = payload?;
    let stored = service.create_users(batch.into_vec()).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// Set fields on a user; `_id` cannot be changed
#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = i64, Path, description = "Numeric user id")),
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Updated user", body = User),
        (status = 400, response = BadRequestResponse),
        (status = 404, response = NotFoundResponse)
    )
)]
async fn update_user<S: EntityStore>(
    State(service): State<Arc<CatalogService<S>>>,
    Path(id): Path<String>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<User>, AppError> {
    let Json(fields) = payload?;
    Ok(Json(service.update_user(&id, fields).await?))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = i64, Path, description = "Numeric user id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, response = BadRequestResponse),
        (status = 404, response = NotFoundResponse)
    )
)]
async fn delete_user<S: EntityStore>(
    State(service): State<Arc<CatalogService<S>>>,
    Path(id): Path<String>,
) -> CatalogResult<StatusCode> {
    service.delete_user(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Add a review to an event's embedded `reviews`, dated today
#[utoipa::path(
    post,
    path = "/users/{id}/review/{event_id}",
    tag = "Users",
    params(
        ("id" = i64, Path, description = "Numeric user id"),
        ("event_id" = String, Path, description = "Event id or store id")
    ),
    request_body = NewReview,
    responses(
        (status = 201, description = "Stored review", body = EventReview),
        (status = 400, response = BadRequestResponse),
        (status = 404, response = NotFoundResponse)
    )
)]
async fn add_event_review<S: EntityStore>(
    State(service): State<Arc<CatalogService<S>>>,
    Path((id, event_id)): Path<(String, String)>,
    payload: Result<Json<NewReview>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(review) = payload?;
    let stored = service.add_event_review(&id, &event_id, review).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

#[utoipa::path(
    get,
    path = "/users/{id}/favorites",
    tag = "Users",
    params(("id" = i64, Path, description = "Numeric user id")),
    responses(
        (status = 200, description = "Favorites", body = FavoritesView),
        (status = 400, response = BadRequestResponse),
        (status = 404, response = NotFoundResponse)
    )
)]
async fn list_favorites<S: EntityStore>(
    State(service): State<Arc<CatalogService<S>>>,
    Path(id): Path<String>,
) -> CatalogResult<Json<FavoritesView>> {
    Ok(Json(service.list_favorites(&id).await?))
}

#[utoipa::path(
    post,
    path = "/users/{id}/favorites",
    tag = "Users",
    params(("id" = i64, Path, description = "Numeric user id")),
    request_body = NewFavorite,
    responses(
        (status = 201, description = "Favorite added", body = Favorite),
        (status = 400, response = BadRequestResponse),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse)
    )
)]
async fn add_favorite<S: EntityStore>(
    State(service): State<Arc<CatalogService<S>>>,
    Path(id): Path<String>,
    payload: Result<Json<NewFavorite>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(favorite) = payload?;
    let stored = service.add_favorite(&id, favorite).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

#[utoipa::path(
    delete,
    path = "/users/{id}/favorites/{movieid}",
    tag = "Users",
    params(
        ("id" = i64, Path, description = "Numeric user id"),
        ("movieid" = String, Path, description = "Favorite event id")
    ),
    responses(
        (status = 204, description = "Favorite removed"),
        (status = 404, response = NotFoundResponse)
    )
)]
async fn remove_favorite<S: EntityStore>(
    State(service): State<Arc<CatalogService<S>>>,
    Path((id, movieid)): Path<(String, String)>,
) -> CatalogResult<StatusCode> {
    service.remove_favorite(&id, &movieid).await?;
    Ok(StatusCode::NO_CONTENT)
}
