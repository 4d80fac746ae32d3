//! OpenAPI documentation configuration

use utoipa::OpenApi;

/// Combined OpenAPI documentation for all APIs
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Catalog API",
        version = "0.1.0",
        description = "Events, users and rating analytics over MongoDB",
        license(name = "MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    paths(crate::api::health::readiness_check),
    nest(
        (path = "/api", api = domain_catalog::ApiDoc)
    ),
    tags(
        (name = "Events", description = "Event listings, ratings and rankings"),
        (name = "Users", description = "Users and their embedded ratings"),
        (name = "Health", description = "Liveness and readiness")
    )
)]
pub struct ApiDoc;
