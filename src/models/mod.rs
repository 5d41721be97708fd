// Data model: one SeaORM entity per PostgreSQL table.
//
// Identity:
//   - users    : email-login accounts (JWT auth, OTP password reset)
//   - profiles : one-to-one profile metadata per user
//
// Catalog:
//   - categories -> courses -> sections -> lessons -> lesson_resources
//
// Commerce:
//   - carts / cart_items : pre-purchase basket (anonymous or user-linked)
//   - coupons            : discount codes with validity window and usage cap
//   - orders / order_items : purchase records, prices snapshotted
//
// Learning:
//   - enrollments     : (student, course) access grant, progress summary
//   - lesson_progress : per-lesson completion and resume position
//
// Engagement:
//   - course_reviews, questions, answers, wishlists, notifications
//
// Public-facing rows carry a 10-char uppercase id (course_id, order_id, ...)
// generated once at insert; serial primary keys stay internal.

pub mod users;
pub mod profiles;
pub mod categories;
pub mod courses;
pub mod sections;
pub mod lessons;
pub mod lesson_resources;
pub mod enrollments;
pub mod lesson_progress;
pub mod carts;
pub mod cart_items;
pub mod coupons;
pub mod orders;
pub mod order_items;
pub mod course_reviews;
pub mod notifications;
pub mod questions;
pub mod answers;
pub mod wishlists;
pub mod dto;
pub mod health;
