// Shared DTOs for API responses. Route-specific request bodies live next to
// their handlers; these are the shapes reused across several route modules.

use serde::{Deserialize, Serialize};
use rust_decimal::Decimal;

use super::{courses, lessons, sections};

pub const DEFAULT_PAGE_SIZE: u64 = 12;
pub const MAX_PAGE_SIZE: u64 = 100;

/// `?page=` / `?page_size=` query parameters.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl PageQuery {
    /// Zero-based page index and clamped page size.
    pub fn normalized(&self) -> (u64, u64) {
        let page = self.page.unwrap_or(1).max(1) - 1;
        let page_size = self
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        (page, page_size)
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub count: u64,
    pub page: u64,
    pub page_size: u64,
    pub results: Vec<T>,
}

/// Course card for list endpoints (catalog, search, instructor, wishlist).
/// Never includes curriculum or lesson content.
#[derive(Debug, Serialize)]
pub struct CourseSummary {
    pub course_id: String,
    pub title: String,
    pub slug: String,
    pub short_description: Option<String>,
    pub thumbnail: Option<String>,
    pub language: String,
    pub level: String,
    pub status: String,
    pub is_featured: bool,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub discount_percentage: i32,
    pub is_free: bool,
    pub average_rating: Decimal,
    pub total_students: i32,
    pub total_reviews: i32,
    pub total_lessons: i32,
    pub total_duration: i32,
}

impl From<&courses::Model> for CourseSummary {
    fn from(course: &courses::Model) -> Self {
        CourseSummary {
            course_id: course.course_id.clone(),
            title: course.title.clone(),
            slug: course.slug.clone(),
            short_description: course.short_description.clone(),
            thumbnail: course.thumbnail.clone(),
            language: course.language.clone(),
            level: course.level.clone(),
            status: course.status.clone(),
            is_featured: course.is_featured,
            price: course.price,
            original_price: course.original_price,
            discount_percentage: course.discount_percentage(),
            is_free: course.is_free,
            average_rating: course.average_rating,
            total_students: course.total_students,
            total_reviews: course.total_reviews,
            total_lessons: course.total_lessons,
            total_duration: course.total_duration,
        }
    }
}

/// One lesson inside a curriculum listing. `video_url` and `content` are
/// stripped unless the requester may access the lesson (enrolled, or the
/// lesson is a free preview).
#[derive(Debug, Serialize)]
pub struct CurriculumLesson {
    pub lesson_id: String,
    pub title: String,
    pub lesson_type: String,
    pub duration: i32,
    pub sort_order: i32,
    pub is_free_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl CurriculumLesson {
    pub fn from_model(lesson: &lessons::Model, can_access_content: bool) -> Self {
        let accessible = can_access_content || lesson.is_free_preview;
        CurriculumLesson {
            lesson_id: lesson.lesson_id.clone(),
            title: lesson.title.clone(),
            lesson_type: lesson.lesson_type.clone(),
            duration: lesson.duration,
            sort_order: lesson.sort_order,
            is_free_preview: lesson.is_free_preview,
            video_url: if accessible { lesson.video_url.clone() } else { None },
            content: if accessible { lesson.content.clone() } else { None },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CurriculumSection {
    pub section_id: String,
    pub title: String,
    pub description: Option<String>,
    pub sort_order: i32,
    pub total_lessons: i32,
    pub total_duration: i32,
    pub lessons: Vec<CurriculumLesson>,
}

impl CurriculumSection {
    pub fn from_model(section: &sections::Model, lessons: Vec<CurriculumLesson>) -> Self {
        CurriculumSection {
            section_id: section.section_id.clone(),
            title: section.title.clone(),
            description: section.description.clone(),
            sort_order: section.sort_order,
            total_lessons: section.total_lessons,
            total_duration: section.total_duration,
            lessons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_defaults() {
        let q = PageQuery { page: None, page_size: None };
        assert_eq!(q.normalized(), (0, DEFAULT_PAGE_SIZE));
    }

    #[test]
    fn test_page_query_clamps() {
        let q = PageQuery { page: Some(0), page_size: Some(10_000) };
        assert_eq!(q.normalized(), (0, MAX_PAGE_SIZE));

        let q = PageQuery { page: Some(3), page_size: Some(20) };
        assert_eq!(q.normalized(), (2, 20));
    }
}
