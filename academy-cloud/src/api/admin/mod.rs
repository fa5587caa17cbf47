//! Admin API: course editor, uploads, stats
//!
//! Every route sits behind `require_admin`; services check the role again.

mod course;
mod stats;
mod structure;
mod upload;

use axum::Router;
use axum::routing::{get, post, put};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/courses",
            get(course::list_courses).post(course::create_course),
        )
        .route(
            "/api/admin/courses/{course_id}",
            get(course::get_course)
                .put(course::update_course)
                .delete(course::delete_course),
        )
        .route(
            "/api/admin/courses/{course_id}/chapters",
            post(structure::create_chapter),
        )
        .route(
            "/api/admin/courses/{course_id}/chapters/reorder",
            post(structure::reorder_chapters),
        )
        .route(
            "/api/admin/courses/{course_id}/chapters/move",
            post(structure::move_chapter),
        )
        .route(
            "/api/admin/courses/{course_id}/chapters/{chapter_id}",
            put(structure::update_chapter).delete(structure::delete_chapter),
        )
        .route(
            "/api/admin/courses/{course_id}/chapters/{chapter_id}/lessons",
            post(structure::create_lesson),
        )
        .route(
            "/api/admin/courses/{course_id}/chapters/{chapter_id}/lessons/reorder",
            post(structure::reorder_lessons),
        )
        .route(
            "/api/admin/courses/{course_id}/chapters/{chapter_id}/lessons/move",
            post(structure::move_lesson),
        )
        .route(
            "/api/admin/courses/{course_id}/chapters/{chapter_id}/lessons/{lesson_id}",
            put(structure::update_lesson).delete(structure::delete_lesson),
        )
        .route(
            "/api/admin/uploads",
            post(upload::presign).delete(upload::delete_object),
        )
        .route("/api/admin/stats/enrollments", get(stats::enrollments))
}
