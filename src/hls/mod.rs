pub mod detect;
pub mod rewriter;

pub use detect::{PLAYLIST_CONTENT_TYPE, is_playlist};
pub use rewriter::rewrite_playlist;
