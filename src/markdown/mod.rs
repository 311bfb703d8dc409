//! Lesson markdown rendering

mod render;

pub use render::{render_lesson, slugify, Heading, RenderedLesson};
