use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use sqlx::PgPool;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::auth::Platform;
use crate::config::AppConfig;
use crate::database::Repository;
use crate::entity::{EntityDescriptor, EntityRegistry};
use crate::handlers::{entity, system};
use crate::middleware::{authenticate, check_permission, PermissionChecker, PermitAll, PlatformAuth};

/// Shared, read-only application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub permissions: Arc<dyn PermissionChecker>,
    pub entities: EntityRegistry,
}

impl AppState {
    /// Built-in entities, every authenticated call permitted
    pub fn new(pool: PgPool, config: AppConfig) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            permissions: Arc::new(PermitAll),
            entities: EntityRegistry::builtin(),
        }
    }

    pub fn with_permissions(mut self, permissions: impl PermissionChecker + 'static) -> Self {
        self.permissions = Arc::new(permissions);
        self
    }

    pub fn with_entities(mut self, entities: EntityRegistry) -> Self {
        self.entities = entities;
        self
    }
}

pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        // Public
        .route("/", get(system::root))
        .route("/health", get(system::health))
        .with_state(state.clone());

    // Protected: one route group per platform and entity
    for platform in Platform::ALL {
        for descriptor in state.entities.iter() {
            router = router.merge(entity_routes(&state, platform, descriptor.clone()));
        }
    }

    let config = &state.config;
    let mut router = router
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.api.max_request_size_bytes))
        .layer(cors_layer(config));

    if config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    router
}

/// `/{platform}/api/v1/{entity}/...`. Authentication runs before the
/// permission check, which runs before the handler.
fn entity_routes(state: &AppState, platform: Platform, descriptor: Arc<EntityDescriptor>) -> Router {
    let prefix = format!("/{}/api/v1/{}", platform.as_str(), descriptor.route_segment());
    let path = |suffix: &str| format!("{}/{}", prefix, suffix);

    let auth = PlatformAuth {
        platform,
        secret: state.config.jwt_secret_for(platform).to_string(),
    };
    let entity_state = entity::EntityState {
        repository: Repository::new(state.pool.clone(), descriptor, &state.config.database),
        config: state.config.clone(),
    };

    Router::new()
        .route(&path("create"), post(entity::add))
        .route(&path("addBulk"), post(entity::bulk_insert))
        .route(&path("list"), post(entity::find_all))
        .route(&path("count"), post(entity::count))
        .route(&path(":id"), get(entity::get))
        .route(&path("update/:id"), put(entity::update))
        .route(&path("partial-update/:id"), put(entity::partial_update))
        .route(&path("updateBulk"), put(entity::bulk_update))
        .route(&path("softDelete/:id"), put(entity::soft_delete))
        .route(&path("softDeleteMany"), put(entity::soft_delete_many))
        .route(&path("delete/:id"), delete(entity::delete))
        .route(&path("deleteMany"), post(entity::delete_many))
        .route_layer(from_fn_with_state(state.permissions.clone(), check_permission))
        .route_layer(from_fn_with_state(auth, authenticate))
        .with_state(entity_state)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if config.is_development() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
