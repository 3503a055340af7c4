pub mod rating;
pub mod score;
