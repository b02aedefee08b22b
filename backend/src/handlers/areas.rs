use axum::{
    extract::{Extension, State},
    Json,
};

use crate::{
    error::AppError,
    middleware::session::RequestContext,
    models::catalog::AreaOverview,
    state::AppState,
};

/// Areas by name, each with its category and slots. An attached user also
/// gets `can_book` per slot and `can_extend` on their own bookings.
pub async fn list_areas(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
) -> Result<Json<Vec<AreaOverview>>, AppError> {
    let viewer = context.user.as_ref().map(|user| user.id);
    let areas = state.bookings.overview(viewer, state.today()).await?;
    Ok(Json(areas))
}
