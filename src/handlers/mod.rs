// Public routes (`/`, `/health`) live in `system`; everything under
// `/{platform}/api/v1/{entity}` is served by the generic `entity` controllers.
pub mod entity;
pub mod system;
