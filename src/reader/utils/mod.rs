pub mod geometry;
pub mod homography;
