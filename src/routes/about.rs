use crate::{
    auth::Viewer,
    errors::AppError,
    views::{AboutAuthorTemplate, AboutTechTemplate, Layout, render_template},
};
use axum::response::Html;

/// GET /about/author/
pub async fn author(viewer: Viewer) -> Result<Html<String>, AppError> {
    render_template(AboutAuthorTemplate {
        layout: Layout::new("Об авторе", viewer.username()),
    })
}

/// GET /about/tech/
pub async fn tech(viewer: Viewer) -> Result<Html<String>, AppError> {
    render_template(AboutTechTemplate {
        layout: Layout::new("Технологии", viewer.username()),
    })
}
