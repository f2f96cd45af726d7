pub mod boxscore;
pub mod game;

pub use boxscore::merge_boxscores;
pub use game::{latest_game_ids, normalize_games, DataIntegrityError, NormalizedBatch};
