pub mod score_board;

pub use score_board::{Published, ScoreBoard};
